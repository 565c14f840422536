//! Workspace view state: per-widget display state, selection and the
//! applied quantification pointer.
//!
//! Widget-state maps are keyed by instance slot. The analysis layout
//! names two top slots and four bottom slots; on save, entries whose
//! (kind, slot) pair is not named by the layout are dropped, except the
//! two privileged context-image slots.

use super::user::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Context-image slots that survive layout filtering regardless of layout
const PRIVILEGED_CONTEXT_SLOTS: [&str; 2] = ["analysis", "map"];

/// Slot names for the four bottom layout positions
const BOTTOM_SLOTS: [&str; 4] = ["undercontext", "underspectrum0", "underspectrum1", "underspectrum2"];

/// Map a layout selector name to the widget kind it instantiates
fn selector_widget_kind(selector: &str) -> Option<&'static str> {
    Some(match selector {
        "chord-view-widget" => "chord",
        "binary-plot-widget" => "binary",
        "ternary-plot-widget" => "ternary",
        "table-widget" => "table",
        "histogram-widget" => "histogram",
        "variogram-widget" => "variogram",
        "spectrum-widget" => "spectrum",
        "context-image" => "contextImage",
        "roi-quant-table-widget" => "roiQuantTable",
        "rgbu-viewer-widget" => "rgbuImages",
        "rgbu-plot-widget" => "rgbuPlot",
        "single-axis-rgbu-widget" => "singleAxisRGBU",
        "parallel-coords-widget" => "parallelogram",
        _ => return None,
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisLayout {
    pub top_widget_selectors: Vec<String>,
    pub bottom_widget_selectors: Vec<String>,
}

/// Region layer shown on a context image
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoiLayerVisibility {
    #[serde(rename = "roiID")]
    pub roi_id: String,
    #[serde(default)]
    pub opacity: f64,
    #[serde(default)]
    pub visible: bool,
}

/// Expression map layer shown on a context image
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapLayerVisibility {
    #[serde(rename = "expressionID")]
    pub expression_id: String,
    #[serde(default)]
    pub opacity: f64,
    #[serde(default)]
    pub visible: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextImageState {
    #[serde(default)]
    pub context_image: String,
    #[serde(default)]
    pub roi_layers: Vec<RoiLayerVisibility>,
    #[serde(default)]
    pub map_layers: Vec<MapLayerVisibility>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramState {
    #[serde(rename = "visibleROIs", default)]
    pub visible_rois: Vec<String>,
    #[serde(rename = "expressionIDs", default)]
    pub expression_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChordState {
    #[serde(rename = "displayROI", default)]
    pub display_roi: String,
    #[serde(rename = "expressionIDs", default)]
    pub expression_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TernaryState {
    #[serde(rename = "visibleROIs", default)]
    pub visible_rois: Vec<String>,
    #[serde(rename = "expressionIDs", default)]
    pub expression_ids: Vec<String>,
}

pub type BinaryState = TernaryState;
pub type VariogramState = TernaryState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableState {
    #[serde(rename = "visibleROIs", default)]
    pub visible_rois: Vec<String>,
    #[serde(default)]
    pub order: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoiQuantTableState {
    #[serde(default)]
    pub roi: String,
    #[serde(rename = "quantIDs", default)]
    pub quant_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectrumLine {
    #[serde(rename = "roiID", default)]
    pub roi_id: String,
    #[serde(default)]
    pub line_expressions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectrumWidgetState {
    #[serde(default)]
    pub spectrum_lines: Vec<SpectrumLine>,
    #[serde(rename = "logScale", default)]
    pub log_scale: bool,
}

/// Applied quantification plus the legacy per-region map carried for fallback
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantificationState {
    #[serde(rename = "appliedQuantID", default)]
    pub applied_quant_id: String,
    #[serde(rename = "quantificationByROI", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub quantification_by_roi: BTreeMap<String, String>,
}

impl QuantificationState {
    /// Promote the legacy per-region map into the applied pointer:
    /// the `AllPoints` entry wins, else the alphabetically smallest
    /// quantification id. The legacy map is cleared afterwards.
    pub fn apply_roi_fallback(&mut self) {
        if self.applied_quant_id.is_empty() && !self.quantification_by_roi.is_empty() {
            if let Some(all_points) = self.quantification_by_roi.get("AllPoints") {
                self.applied_quant_id = all_points.clone();
            } else if let Some(quant_id) = self.quantification_by_roi.values().min() {
                self.applied_quant_id = quant_id.clone();
            }
        }
        self.quantification_by_roi.clear();
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WholeViewState {
    #[serde(default)]
    pub analysis_layout: AnalysisLayout,
    #[serde(default)]
    pub context_images: HashMap<String, ContextImageState>,
    #[serde(default)]
    pub histograms: HashMap<String, HistogramState>,
    #[serde(default)]
    pub chord_diagrams: HashMap<String, ChordState>,
    #[serde(default)]
    pub ternary_plots: HashMap<String, TernaryState>,
    #[serde(default)]
    pub binary_plots: HashMap<String, BinaryState>,
    #[serde(default)]
    pub tables: HashMap<String, TableState>,
    #[serde(default)]
    pub roi_quant_tables: HashMap<String, RoiQuantTableState>,
    #[serde(default)]
    pub variograms: HashMap<String, VariogramState>,
    #[serde(default)]
    pub spectrums: HashMap<String, SpectrumWidgetState>,
    #[serde(default)]
    pub rgbu_plots: HashMap<String, serde_json::Value>,
    #[serde(rename = "singleAxisRGBU", default)]
    pub single_axis_rgbu: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub rgbu_images: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub parallelograms: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub annotations: serde_json::Value,
    #[serde(default)]
    pub rois: serde_json::Value,
    #[serde(default)]
    pub quantification: QuantificationState,
    #[serde(default)]
    pub selection: serde_json::Value,
}

impl WholeViewState {
    /// Drop widget-state entries whose (kind, slot) is not named by the
    /// analysis layout. Only applies when the layout is fully populated
    /// (two top, four bottom selectors); the two privileged
    /// context-image slots always survive.
    pub fn filter_unused_widgets(&mut self) {
        if self.analysis_layout.top_widget_selectors.len() != 2
            || self.analysis_layout.bottom_widget_selectors.len() != 4
        {
            return;
        }

        let mut allowed: HashSet<(String, String)> = PRIVILEGED_CONTEXT_SLOTS
            .iter()
            .map(|slot| ("contextImage".to_string(), slot.to_string()))
            .collect();

        for (i, selector) in self.analysis_layout.top_widget_selectors.iter().enumerate() {
            if let Some(kind) = selector_widget_kind(selector) {
                allowed.insert((kind.to_string(), format!("top{}", i)));
            }
        }
        for (i, selector) in self.analysis_layout.bottom_widget_selectors.iter().enumerate() {
            if let Some(kind) = selector_widget_kind(selector) {
                allowed.insert((kind.to_string(), BOTTOM_SLOTS[i].to_string()));
            }
        }

        fn retain_allowed<T>(kind: &str, map: &mut HashMap<String, T>, allowed: &HashSet<(String, String)>) {
            map.retain(|slot, _| allowed.contains(&(kind.to_string(), slot.clone())));
        }

        retain_allowed("contextImage", &mut self.context_images, &allowed);
        retain_allowed("histogram", &mut self.histograms, &allowed);
        retain_allowed("chord", &mut self.chord_diagrams, &allowed);
        retain_allowed("ternary", &mut self.ternary_plots, &allowed);
        retain_allowed("binary", &mut self.binary_plots, &allowed);
        retain_allowed("table", &mut self.tables, &allowed);
        retain_allowed("roiQuantTable", &mut self.roi_quant_tables, &allowed);
        retain_allowed("variogram", &mut self.variograms, &allowed);
        retain_allowed("spectrum", &mut self.spectrums, &allowed);
        retain_allowed("rgbuPlot", &mut self.rgbu_plots, &allowed);
        retain_allowed("singleAxisRGBU", &mut self.single_axis_rgbu, &allowed);
        retain_allowed("rgbuImages", &mut self.rgbu_images, &allowed);
        retain_allowed("parallelogram", &mut self.parallelograms, &allowed);
    }
}

/// A saved workspace: one view-state snapshot, identified by name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub view_state: WholeViewState,
    /// Set when this workspace doubles as a reviewer access token
    #[serde(rename = "reviewerID", default, skip_serializing_if = "Option::is_none")]
    pub reviewer_id: Option<String>,
    #[serde(flatten)]
    pub meta: ObjectMeta,
}

/// A named list of workspace ids. Shared copies freeze each workspace body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "viewStateIDs")]
    pub view_state_ids: Vec<String>,
    /// Present on shared collections only: snapshot of each member at share time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_states: Option<BTreeMap<String, WholeViewState>>,
    #[serde(flatten)]
    pub meta: ObjectMeta,
}

/// List entry for workspace/collection listings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedItemSummary {
    pub name: String,
    #[serde(rename = "modifiedUnixSec")]
    pub modified_unix_sec: i64,
}
