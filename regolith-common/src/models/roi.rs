//! Regions of interest

use super::user::ObjectMeta;
use serde::{Deserialize, Serialize};

/// Sentinel region name: everything not covered higher in a z-stack
pub const REMAINING_POINTS_ROI: &str = "RemainingPoints";

/// Predefined region names the UI injects; never stored or shared
pub const PREDEFINED_ROIS: [&str; 3] = ["SelectedPoints", "AllPoints", "Remaining Points"];

pub fn is_predefined_roi(id: &str) -> bool {
    PREDEFINED_ROIS.contains(&id)
}

/// A named set of location indices into a dataset.
/// Stored as a map of id to item, one file per (user, dataset).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoiItem {
    pub name: String,
    pub location_indexes: Vec<i32>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_name: String,
    #[serde(flatten)]
    pub meta: ObjectMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predefined_names() {
        assert!(is_predefined_roi("AllPoints"));
        assert!(is_predefined_roi("SelectedPoints"));
        assert!(is_predefined_roi("Remaining Points"));
        assert!(!is_predefined_roi("RemainingPoints"));
        assert!(!is_predefined_roi("roi-123"));
    }
}
