//! Public-visibility set: the single document listing artifact ids
//! anonymous readers may access, partitioned by kind.

use crate::ident::ItemId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicObjects {
    #[serde(default)]
    pub datasets: Vec<String>,
    #[serde(rename = "ROIs", default)]
    pub rois: Vec<String>,
    #[serde(default)]
    pub expressions: Vec<String>,
    #[serde(default)]
    pub modules: Vec<String>,
    #[serde(rename = "RGBMixes", default)]
    pub rgb_mixes: Vec<String>,
    #[serde(default)]
    pub quantifications: Vec<String>,
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default)]
    pub workspaces: Vec<String>,
}

/// Membership is prefix-insensitive: `shared-x` and `x` refer to the
/// same underlying object.
fn contains_id(list: &[String], id: &str) -> bool {
    let bare = ItemId::parse(id).id;
    list.iter().any(|entry| ItemId::parse(entry).id == bare)
}

fn add_id(list: &mut Vec<String>, id: &str) {
    if !contains_id(list, id) {
        list.push(id.to_string());
    }
}

impl PublicObjects {
    pub fn is_dataset_public(&self, id: &str) -> bool {
        contains_id(&self.datasets, id)
    }

    pub fn is_workspace_public(&self, id: &str) -> bool {
        contains_id(&self.workspaces, id)
    }

    pub fn is_collection_public(&self, id: &str) -> bool {
        contains_id(&self.collections, id)
    }

    pub fn is_quantification_public(&self, id: &str) -> bool {
        contains_id(&self.quantifications, id)
    }

    pub fn add_dataset(&mut self, id: &str) {
        add_id(&mut self.datasets, id);
    }

    pub fn add_roi(&mut self, id: &str) {
        add_id(&mut self.rois, id);
    }

    pub fn add_expression(&mut self, id: &str) {
        add_id(&mut self.expressions, id);
    }

    pub fn add_module(&mut self, id: &str) {
        add_id(&mut self.modules, id);
    }

    pub fn add_rgb_mix(&mut self, id: &str) {
        add_id(&mut self.rgb_mixes, id);
    }

    pub fn add_quantification(&mut self, id: &str) {
        add_id(&mut self.quantifications, id);
    }

    pub fn add_collection(&mut self, id: &str) {
        add_id(&mut self.collections, id);
    }

    pub fn add_workspace(&mut self, id: &str) {
        add_id(&mut self.workspaces, id);
    }
}
