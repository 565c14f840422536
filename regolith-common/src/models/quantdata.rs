//! In-memory form of a quantification data artifact (`{job}.bin`).
//!
//! Per detector, a table of points: identifiers (PMC/RTT/SCLK), the
//! source filename and livetime, and the weight-percent / error
//! columns. Everything outside the combiner and the CSV importer
//! treats the serialized bytes as opaque.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Column name suffix for weight percent values
pub const WEIGHT_PCT_SUFFIX: &str = "_%";
/// Column name suffix for error values
pub const ERR_SUFFIX: &str = "_err";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantPoint {
    pub pmc: i32,
    #[serde(default)]
    pub rtt: i32,
    #[serde(default)]
    pub sclk: i32,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub livetime: f64,
    /// Weight-percent and error columns, keyed by label (e.g. `Fe_%`)
    pub columns: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantDetector {
    pub detector: String,
    pub points: Vec<QuantPoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuantFile {
    pub detectors: Vec<QuantDetector>,
}

impl QuantFile {
    /// Detector names in file order
    pub fn detector_names(&self) -> Vec<String> {
        self.detectors.iter().map(|d| d.detector.clone()).collect()
    }

    /// Detector names as a set, for comparing participants in a combine
    pub fn detector_set(&self) -> BTreeSet<String> {
        self.detectors.iter().map(|d| d.detector.clone()).collect()
    }

    /// Union of column labels across all detectors
    pub fn column_labels(&self) -> BTreeSet<String> {
        let mut labels = BTreeSet::new();
        for det in &self.detectors {
            for point in &det.points {
                labels.extend(point.columns.keys().cloned());
            }
        }
        labels
    }

    /// Element symbols quantified here, derived from weight-percent columns
    pub fn elements(&self) -> Vec<String> {
        self.column_labels()
            .iter()
            .filter_map(|label| label.strip_suffix(WEIGHT_PCT_SUFFIX))
            .map(|s| s.to_string())
            .collect()
    }

    pub fn detector(&self, name: &str) -> Option<&QuantDetector> {
        self.detectors.iter().find(|d| d.detector == name)
    }
}

/// Keep a column when combining quantifications: the filename/livetime
/// specials plus weight-percent and error columns.
pub fn is_combinable_column(label: &str) -> bool {
    label == "filename"
        || label == "livetime"
        || label.ends_with(WEIGHT_PCT_SUFFIX)
        || label.ends_with(ERR_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(pmc: i32, cols: &[(&str, f64)]) -> QuantPoint {
        QuantPoint {
            pmc,
            rtt: 0,
            sclk: 0,
            filename: "Normal".into(),
            livetime: 9.0,
            columns: cols.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    #[test]
    fn elements_from_labels() {
        let quant = QuantFile {
            detectors: vec![QuantDetector {
                detector: "A".into(),
                points: vec![point(1, &[("Fe_%", 1.0), ("Fe_err", 0.1), ("Ca_%", 2.0)])],
            }],
        };
        assert_eq!(quant.elements(), vec!["Ca".to_string(), "Fe".to_string()]);
    }

    #[test]
    fn column_filter() {
        assert!(is_combinable_column("Fe_%"));
        assert!(is_combinable_column("Fe_err"));
        assert!(is_combinable_column("filename"));
        assert!(is_combinable_column("livetime"));
        assert!(!is_combinable_column("Fe_int"));
        assert!(!is_combinable_column("events"));
    }

    #[test]
    fn detector_sets_compare() {
        let a = QuantFile {
            detectors: vec![
                QuantDetector { detector: "A".into(), points: vec![] },
                QuantDetector { detector: "B".into(), points: vec![] },
            ],
        };
        let b = QuantFile {
            detectors: vec![
                QuantDetector { detector: "B".into(), points: vec![] },
                QuantDetector { detector: "A".into(), points: vec![] },
            ],
        };
        assert_eq!(a.detector_set(), b.detector_set());
    }
}
