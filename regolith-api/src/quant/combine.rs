//! Multi-quantification combiner.
//!
//! Overlays quantifications through a region z-stack: the first stack
//! entry is the topmost layer, so processing runs from the bottom of
//! the list upward with later-processed layers overwriting. The result
//! is either imported as a new quantification or reduced to a
//! per-element summary.

use crate::jobs::artifacts;
use crate::AppState;
use regolith_common::models::job::quant_mode;
use regolith_common::models::roi::REMAINING_POINTS_ROI;
use regolith_common::models::quantdata::{is_combinable_column, WEIGHT_PCT_SUFFIX};
use regolith_common::models::{DatasetIndex, QuantFile, RoiItem, UserInfo};
use regolith_common::{paths, Error, ItemId, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Display name used for the synthetic catch-all region
const REMAINING_POINTS_NAME: &str = "Remaining Points";

#[derive(Debug, Clone, Deserialize)]
pub struct ZStackItem {
    #[serde(rename = "roiID")]
    pub roi_id: String,
    #[serde(rename = "quantID")]
    pub quant_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MultiQuantRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "roiZStack")]
    pub roi_z_stack: Vec<ZStackItem>,
}

/// One z-stack layer with its region and quantification resolved
struct ResolvedLayer {
    roi_id: String,
    roi_name: String,
    pmcs: Vec<i32>,
    quant: Arc<QuantFile>,
}

/// One output point after overlaying
#[derive(Debug)]
struct CombinedRow {
    roi_id: String,
    rtt: i32,
    sclk: i32,
    filename: String,
    livetime: f64,
    columns: BTreeMap<String, f64>,
}

#[derive(Debug)]
struct CombineResult {
    detectors: Vec<String>,
    // (detector index, PMC) -> winning row
    rows: BTreeMap<(usize, i32), CombinedRow>,
}

impl CombineResult {
    fn column_labels(&self) -> BTreeSet<String> {
        let mut labels = BTreeSet::new();
        for row in self.rows.values() {
            labels.extend(row.columns.keys().cloned());
        }
        labels
    }
}

fn validate_stack(stack: &[ZStackItem]) -> Result<()> {
    if stack.len() < 2 {
        return Err(Error::BadRequest(
            "Must reference at least 2 quantifications".into(),
        ));
    }
    let mut seen = HashSet::new();
    for (idx, item) in stack.iter().enumerate() {
        if item.quant_id.is_empty() {
            return Err(Error::BadRequest(format!(
                "Quantification must be specified for ROI: {}",
                item.roi_id
            )));
        }
        if !seen.insert(item.roi_id.as_str()) {
            return Err(Error::BadRequest(format!(
                "Duplicate ROI in z-stack: {}",
                item.roi_id
            )));
        }
        if item.roi_id == REMAINING_POINTS_ROI && idx != stack.len() - 1 {
            return Err(Error::BadRequest(format!(
                "{} ROI must be last in the z-stack",
                REMAINING_POINTS_ROI
            )));
        }
    }
    Ok(())
}

/// Overlay layers bottom-to-top. The bottom layer's quantification
/// defines the output detector list; all others must quantify the same
/// detectors.
fn combine_layers(layers: &[ResolvedLayer]) -> Result<CombineResult> {
    let bottom = layers
        .last()
        .ok_or_else(|| Error::BadRequest("Empty z-stack".into()))?;
    let detectors = bottom.quant.detector_names();
    let detector_set = bottom.quant.detector_set();

    let mut rows: BTreeMap<(usize, i32), CombinedRow> = BTreeMap::new();

    for layer in layers.iter().rev() {
        if layer.quant.detector_set() != detector_set {
            return Err(Error::BadRequest(format!(
                "Detectors don't match other quantifications: {}",
                layer.quant.detector_names().join(",")
            )));
        }

        for (det_idx, det_name) in detectors.iter().enumerate() {
            let Some(det) = layer.quant.detector(det_name) else {
                continue;
            };
            let by_pmc: HashMap<i32, _> = det.points.iter().map(|p| (p.pmc, p)).collect();
            for &pmc in &layer.pmcs {
                let Some(point) = by_pmc.get(&pmc) else {
                    continue;
                };
                let columns = point
                    .columns
                    .iter()
                    .filter(|(label, _)| is_combinable_column(label))
                    .map(|(label, value)| (label.clone(), *value))
                    .collect();
                rows.insert(
                    (det_idx, pmc),
                    CombinedRow {
                        roi_id: layer.roi_id.clone(),
                        rtt: point.rtt,
                        sclk: point.sclk,
                        filename: point.filename.clone(),
                        livetime: point.livetime,
                        columns,
                    },
                );
            }
        }
    }

    Ok(CombineResult { detectors, rows })
}

/// Render the combined table as PIQUANT-shaped CSV. The filename cell
/// carries the winning region so provenance survives re-import.
fn write_csv(result: &CombineResult, quant_ids: &[String]) -> String {
    let labels: Vec<String> = result.column_labels().into_iter().collect();

    let mut out = format!(
        "Combined multi-quantification from {}\n",
        quant_ids.join(", ")
    );
    out.push_str("PMC, RTT, SCLK, filename, livetime");
    for label in &labels {
        out.push_str(", ");
        out.push_str(label);
    }
    out.push('\n');

    for ((_, pmc), row) in &result.rows {
        out.push_str(&format!(
            "{}, {}, {}, {}_{}, {}",
            pmc, row.rtt, row.sclk, row.filename, row.roi_id, row.livetime
        ));
        for label in &labels {
            match row.columns.get(label) {
                Some(value) => out.push_str(&format!(", {}", value)),
                None => out.push_str(", -1"),
            }
        }
        out.push('\n');
    }
    out
}

#[derive(Debug, Serialize)]
pub struct QuantCombineSummaryRow {
    /// One averaged weight percent per detector, in detector order
    pub values: Vec<f64>,
    #[serde(rename = "roiIDs")]
    pub roi_ids: Vec<String>,
    #[serde(rename = "roiNames")]
    pub roi_names: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct QuantCombineSummary {
    pub detectors: Vec<String>,
    #[serde(rename = "weightPercents")]
    pub weight_percents: BTreeMap<String, QuantCombineSummaryRow>,
}

/// Reduce a combined table to per-element dataset-wide averages.
/// Sums divide by the full dataset point count, not the covered count.
fn summarize(
    result: &CombineResult,
    dataset_points: usize,
    roi_names: &HashMap<String, String>,
) -> QuantCombineSummary {
    let divisor = dataset_points.max(1) as f64;
    let mut weight_percents = BTreeMap::new();

    for label in result.column_labels() {
        let Some(element) = label.strip_suffix(WEIGHT_PCT_SUFFIX) else {
            continue;
        };
        let mut values = vec![0.0; result.detectors.len()];
        let mut contributors = BTreeSet::new();

        for ((det_idx, _), row) in &result.rows {
            if let Some(value) = row.columns.get(&label) {
                values[*det_idx] += value;
                contributors.insert(row.roi_id.clone());
            }
        }
        for value in values.iter_mut() {
            *value /= divisor;
        }

        let roi_ids: Vec<String> = contributors.into_iter().collect();
        let names = roi_ids
            .iter()
            .map(|id| roi_names.get(id).cloned().unwrap_or_else(|| id.clone()))
            .collect();

        weight_percents.insert(
            element.to_string(),
            QuantCombineSummaryRow {
                values,
                roi_ids,
                roi_names: names,
            },
        );
    }

    QuantCombineSummary {
        detectors: result.detectors.clone(),
        weight_percents,
    }
}

/// Resolve every stack entry: region point lists from the caller's or
/// shared content, quantification tables fetched once per distinct id.
async fn resolve_layers(
    state: &AppState,
    dataset_id: &str,
    caller: &UserInfo,
    stack: &[ZStackItem],
) -> Result<(DatasetIndex, Vec<ResolvedLayer>)> {
    let mut quants: HashMap<String, Arc<QuantFile>> = HashMap::new();
    let distinct: BTreeSet<&String> = stack.iter().map(|item| &item.quant_id).collect();
    let fetches = distinct.into_iter().map(|wire_id| {
        let id = ItemId::parse(wire_id);
        let key = paths::quant_path(
            id.owner(&caller.user_id),
            dataset_id,
            &paths::quant_data_file_name(&id.id),
        );
        let store = state.users.clone();
        let wire_id = wire_id.clone();
        async move {
            let bytes = match store.read_bytes(&key).await {
                Ok(bytes) => bytes,
                Err(err) if err.is_not_found() => {
                    return Err(Error::NotFound(format!("quantification {}", wire_id)))
                }
                Err(err) => return Err(err),
            };
            Ok((wire_id, Arc::new(super::decode_quant(&bytes)?)))
        }
    });
    let (dataset, fetched) = futures::future::try_join(
        state
            .datasets
            .read_json::<DatasetIndex>(&paths::dataset_index_path(dataset_id)),
        futures::future::try_join_all(fetches),
    )
    .await?;
    for (wire_id, quant) in fetched {
        quants.insert(wire_id, quant);
    }

    // ROI maps read once per owning area
    let mut roi_maps: HashMap<String, BTreeMap<String, RoiItem>> = HashMap::new();
    let mut layers = Vec::with_capacity(stack.len());
    for item in stack {
        let quant = quants
            .get(&item.quant_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("quantification {}", item.quant_id)))?;

        let (roi_name, pmcs) = if item.roi_id == REMAINING_POINTS_ROI {
            (
                REMAINING_POINTS_NAME.to_string(),
                dataset.locations.iter().map(|loc| loc.pmc).collect(),
            )
        } else {
            let id = ItemId::parse(&item.roi_id);
            let owner = id.owner(&caller.user_id).to_string();
            if !roi_maps.contains_key(&owner) {
                let map = state
                    .users
                    .read_json_or_default(&paths::user_content_path(
                        &owner,
                        dataset_id,
                        paths::ROI_FILE_NAME,
                    ))
                    .await?;
                roi_maps.insert(owner.clone(), map);
            }
            let roi = roi_maps
                .get(&owner)
                .and_then(|map| map.get(&id.id))
                .ok_or_else(|| Error::NotFound(format!("ROI {}", item.roi_id)))?;
            (
                roi.name.clone(),
                dataset
                    .resolve_indexes(&roi.location_indexes)
                    .iter()
                    .map(|loc| loc.pmc)
                    .collect(),
            )
        };

        layers.push(ResolvedLayer {
            roi_id: item.roi_id.clone(),
            roi_name,
            pmcs,
            quant,
        });
    }

    Ok((dataset, layers))
}

/// Combine and import as a new quantification; returns the new job id
pub async fn combine(
    state: &AppState,
    dataset_id: &str,
    caller: &UserInfo,
    req: &MultiQuantRequest,
) -> Result<String> {
    validate_stack(&req.roi_z_stack)?;
    if req.name.is_empty() {
        return Err(Error::BadRequest("Name must be specified".into()));
    }
    let names = crate::jobs::existing_quant_names(state, &caller.user_id, dataset_id).await?;
    if names.contains(&req.name) {
        return Err(Error::BadRequest(format!("Name already used: {}", req.name)));
    }

    let (_, layers) = resolve_layers(state, dataset_id, caller, &req.roi_z_stack).await?;
    let result = combine_layers(&layers)?;

    let mut quant_ids: Vec<String> = req
        .roi_z_stack
        .iter()
        .map(|item| item.quant_id.clone())
        .collect();
    quant_ids.sort();
    quant_ids.dedup();

    let csv = write_csv(&result, &quant_ids);
    let mode = if result.detectors.len() == 1 {
        quant_mode::COMBINED_MULTI_QUANT
    } else {
        quant_mode::AB_MULTI_QUANT
    };

    artifacts::import_csv(
        state,
        dataset_id,
        caller,
        &csv,
        "multi-quant",
        "multi",
        &req.name,
        mode,
        &req.description,
    )
    .await
}

/// Combine without importing: per-element averages for UI preview
pub async fn combine_summary(
    state: &AppState,
    dataset_id: &str,
    caller: &UserInfo,
    req: &MultiQuantRequest,
) -> Result<QuantCombineSummary> {
    validate_stack(&req.roi_z_stack)?;

    let (dataset, layers) = resolve_layers(state, dataset_id, caller, &req.roi_z_stack).await?;
    let result = combine_layers(&layers)?;

    let roi_names = layers
        .iter()
        .map(|layer| (layer.roi_id.clone(), layer.roi_name.clone()))
        .collect();
    Ok(summarize(&result, dataset.point_count(), &roi_names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use regolith_common::models::{QuantDetector, QuantPoint};

    fn point(pmc: i32, fe: f64) -> QuantPoint {
        QuantPoint {
            pmc,
            rtt: 10,
            sclk: 20,
            filename: "Normal_A".into(),
            livetime: 9.0,
            columns: BTreeMap::from([
                ("Fe_%".to_string(), fe),
                ("Fe_err".to_string(), fe / 10.0),
                ("Fe_int".to_string(), 999.0),
            ]),
        }
    }

    fn quant(detector: &str, points: Vec<QuantPoint>) -> Arc<QuantFile> {
        Arc::new(QuantFile {
            detectors: vec![QuantDetector {
                detector: detector.into(),
                points,
            }],
        })
    }

    fn layer(roi_id: &str, pmcs: Vec<i32>, quant: Arc<QuantFile>) -> ResolvedLayer {
        ResolvedLayer {
            roi_id: roi_id.into(),
            roi_name: roi_id.into(),
            pmcs,
            quant,
        }
    }

    #[test]
    fn stack_validation() {
        let one = vec![ZStackItem {
            roi_id: "r1".into(),
            quant_id: "q1".into(),
        }];
        assert!(validate_stack(&one).is_err());

        let dup = vec![
            ZStackItem { roi_id: "r1".into(), quant_id: "q1".into() },
            ZStackItem { roi_id: "r1".into(), quant_id: "q2".into() },
        ];
        assert!(validate_stack(&dup).is_err());

        let remaining_first = vec![
            ZStackItem { roi_id: REMAINING_POINTS_ROI.into(), quant_id: "q1".into() },
            ZStackItem { roi_id: "r1".into(), quant_id: "q2".into() },
        ];
        assert!(validate_stack(&remaining_first).is_err());

        let ok = vec![
            ZStackItem { roi_id: "r1".into(), quant_id: "q1".into() },
            ZStackItem { roi_id: REMAINING_POINTS_ROI.into(), quant_id: "q2".into() },
        ];
        assert!(validate_stack(&ok).is_ok());
    }

    #[test]
    fn earlier_layers_win_overlap() {
        // Layer order: "top" first. Both cover PMC 2; top's value must win.
        let top = quant("Combined", vec![point(2, 5.0)]);
        let bottom = quant("Combined", vec![point(1, 1.0), point(2, 2.0), point(3, 3.0)]);
        let layers = vec![
            layer("top", vec![2], top),
            layer("bottom", vec![1, 2, 3], bottom),
        ];

        let result = combine_layers(&layers).unwrap();
        assert_eq!(result.detectors, vec!["Combined"]);
        assert_eq!(result.rows.len(), 3);
        let winner = &result.rows[&(0, 2)];
        assert_eq!(winner.roi_id, "top");
        assert_eq!(winner.columns["Fe_%"], 5.0);
        assert_eq!(result.rows[&(0, 1)].roi_id, "bottom");
        // Non weight/err columns are dropped
        assert!(!winner.columns.contains_key("Fe_int"));
    }

    #[test]
    fn detector_mismatch_rejected() {
        let a = quant("A", vec![point(1, 1.0)]);
        let combined = quant("Combined", vec![point(1, 1.0)]);
        let layers = vec![
            layer("r1", vec![1], a),
            layer("r2", vec![1], combined),
        ];
        let err = combine_layers(&layers).unwrap_err();
        assert!(err.to_string().contains("Detectors don't match"));
    }

    #[test]
    fn csv_shape() {
        let q = quant("Combined", vec![point(1, 1.5), point(2, 2.5)]);
        let layers = vec![
            layer("r1", vec![1], q.clone()),
            layer("r2", vec![2], q),
        ];
        let result = combine_layers(&layers).unwrap();
        let csv = write_csv(&result, &["q1".to_string(), "q2".to_string()]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Combined multi-quantification from q1, q2");
        assert_eq!(lines[1], "PMC, RTT, SCLK, filename, livetime, Fe_%, Fe_err");
        assert_eq!(lines[2], "1, 10, 20, Normal_A_r1, 9, 1.5, 0.15");
        assert_eq!(lines[3], "2, 10, 20, Normal_A_r2, 9, 2.5, 0.25");
    }

    #[test]
    fn summary_divides_by_dataset_points() {
        let q = quant("Combined", vec![point(1, 4.0), point(2, 6.0)]);
        let layers = vec![
            layer("r1", vec![1], q.clone()),
            layer("r2", vec![2], q),
        ];
        let result = combine_layers(&layers).unwrap();
        let names = HashMap::from([
            ("r1".to_string(), "Region One".to_string()),
            ("r2".to_string(), "Region Two".to_string()),
        ]);
        let summary = summarize(&result, 4, &names);
        let fe = &summary.weight_percents["Fe"];
        assert_eq!(fe.values, vec![2.5]);
        assert_eq!(fe.roi_ids, vec!["r1", "r2"]);
        assert_eq!(fe.roi_names, vec!["Region One", "Region Two"]);
    }
}
