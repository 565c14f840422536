//! Public visibility: opening a shared collection, and everything it
//! transitively references, to anonymous readers.

use super::references::collect_references;
use crate::AppState;
use regolith_common::ident::SHARE_USER_ID;
use regolith_common::models::{Collection, DatasetIndex, ExpressionItem, PublicObjects};
use regolith_common::{paths, Error, ItemId, Result};
use std::collections::BTreeMap;

pub async fn load_public_objects(state: &AppState) -> Result<PublicObjects> {
    state
        .users
        .read_json_or_default(paths::PUBLIC_OBJECTS_FILE)
        .await
}

async fn save_public_objects(state: &AppState, objects: &PublicObjects) -> Result<()> {
    state
        .users
        .write_json(paths::PUBLIC_OBJECTS_FILE, objects)
        .await
}

/// Make a shared collection public. The collection's dataset must
/// already be marked public; every workspace snapshot in the collection
/// contributes its referenced regions, expressions (and their modules),
/// RGB mixes and quantifications to the public set.
pub async fn make_collection_public(
    state: &AppState,
    dataset_id: &str,
    wire_collection_id: &str,
) -> Result<()> {
    let id = ItemId::parse(wire_collection_id);
    if !id.is_shared() {
        return Err(Error::BadRequest(format!(
            "Only shared collections can be made public: {}",
            wire_collection_id
        )));
    }

    let dataset: DatasetIndex = state
        .datasets
        .read_json(&paths::dataset_index_path(dataset_id))
        .await?;
    if !dataset.public {
        return Err(Error::BadRequest(format!(
            "Dataset is not public: {}",
            dataset_id
        )));
    }

    let collection: Collection = match state
        .users
        .read_json(&paths::collection_path(SHARE_USER_ID, dataset_id, &id.id))
        .await
    {
        Ok(collection) => collection,
        Err(err) if err.is_not_found() => {
            return Err(Error::NotFound(format!(
                "collection {}",
                wire_collection_id
            )))
        }
        Err(err) => return Err(err),
    };
    let Some(view_states) = &collection.view_states else {
        return Err(Error::BadRequest(format!(
            "Collection has no view state snapshots: {}",
            wire_collection_id
        )));
    };

    let shared_expressions: BTreeMap<String, ExpressionItem> = state
        .users
        .read_json_or_default(&paths::user_file_path(
            SHARE_USER_ID,
            paths::EXPRESSION_FILE_NAME,
        ))
        .await?;

    let mut objects = load_public_objects(state).await?;
    objects.add_dataset(dataset_id);
    objects.add_collection(&id.id);

    for (workspace_id, view_state) in view_states {
        objects.add_workspace(workspace_id);

        let refs = collect_references(view_state);
        for roi in &refs.rois {
            objects.add_roi(roi);
        }
        for quant in &refs.quants {
            objects.add_quantification(quant);
        }
        for mix in &refs.rgb_mixes {
            objects.add_rgb_mix(mix);
        }
        for expr in &refs.expressions {
            objects.add_expression(expr);
            // A public expression pulls its module pins along
            if let Some(item) = shared_expressions.get(&ItemId::parse(expr).id) {
                for module_ref in &item.module_references {
                    objects.add_module(&module_ref.module_id);
                }
            }
        }
    }

    save_public_objects(state, &objects).await
}
