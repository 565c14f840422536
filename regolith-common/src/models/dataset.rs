//! Dataset index: the minimal descriptor this service needs per scan

use serde::{Deserialize, Serialize};

/// One measured location in a dataset
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetLocation {
    pub pmc: i32,
    #[serde(default)]
    pub rtt: i32,
    #[serde(default)]
    pub sclk: i32,
}

/// Per-dataset descriptor held in the datasets bucket
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetIndex {
    #[serde(rename = "datasetID")]
    pub dataset_id: String,
    /// Anonymous readers may see this dataset
    #[serde(default)]
    pub public: bool,
    pub locations: Vec<DatasetLocation>,
}

impl DatasetIndex {
    pub fn point_count(&self) -> usize {
        self.locations.len()
    }

    /// Resolve ROI location indices to locations, skipping out-of-range entries
    pub fn resolve_indexes(&self, indexes: &[i32]) -> Vec<DatasetLocation> {
        indexes
            .iter()
            .filter_map(|&idx| self.locations.get(idx as usize).copied())
            .collect()
    }
}
