//! Workspace collections: named lists of workspace ids.
//!
//! Private collections resolve their members live on read. Shared
//! collections carry a frozen snapshot of every member's view state,
//! taken at share time, so later edits to the workspaces never change
//! what was shared.

use crate::AppState;
use regolith_common::ident::{SHARED_ID_PREFIX, SHARE_USER_ID};
use regolith_common::models::user::ObjectMeta;
use regolith_common::models::viewstate::SavedItemSummary;
use regolith_common::models::{Collection, UserInfo, Workspace};
use regolith_common::time::now_unix_sec;
use regolith_common::{paths, Error, ItemId, Result};
use std::collections::BTreeMap;

/// Collections visible to a user on a dataset. Listing as the shared
/// user (the anonymous path) covers the shared area only, so nothing
/// appears twice.
pub async fn list_collections(
    state: &AppState,
    dataset_id: &str,
    user_id: &str,
) -> Result<Vec<SavedItemSummary>> {
    let own_listing = async {
        if user_id == SHARE_USER_ID {
            return Ok(Vec::new());
        }
        state
            .users
            .list_objects(&paths::collection_prefix(user_id, dataset_id))
            .await
    };
    let (own, shared) = futures::future::try_join(
        own_listing,
        state
            .users
            .list_objects(&paths::collection_prefix(SHARE_USER_ID, dataset_id)),
    )
    .await?;

    let mut entries: Vec<SavedItemSummary> = own
        .iter()
        .map(|obj| SavedItemSummary {
            name: paths::file_stem_of_key(&obj.key),
            modified_unix_sec: obj.modified_unix_sec,
        })
        .chain(shared.iter().map(|obj| SavedItemSummary {
            name: format!("{}{}", SHARED_ID_PREFIX, paths::file_stem_of_key(&obj.key)),
            modified_unix_sec: obj.modified_unix_sec,
        }))
        .collect();

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Read a collection. Private collections get their member view states
/// resolved live; a missing member is logged and skipped.
pub async fn get_collection(
    state: &AppState,
    dataset_id: &str,
    user_id: &str,
    wire_id: &str,
) -> Result<Collection> {
    let id = ItemId::parse(wire_id);
    let key = paths::collection_path(id.owner(user_id), dataset_id, &id.id);
    let mut collection: Collection = match state.users.read_json(&key).await {
        Ok(collection) => collection,
        Err(err) if err.is_not_found() => {
            return Err(Error::NotFound(format!("collection {}", wire_id)))
        }
        Err(err) => return Err(err),
    };

    if collection.view_states.is_none() {
        let mut view_states = BTreeMap::new();
        for member in &collection.view_state_ids {
            match super::workspace::get_workspace(state, dataset_id, user_id, member).await {
                Ok(workspace) => {
                    view_states.insert(member.clone(), workspace.view_state);
                }
                Err(err) if err.is_not_found() => {
                    tracing::warn!(
                        "Collection {} references missing workspace {}",
                        wire_id,
                        member
                    );
                }
                Err(err) => return Err(err),
            }
        }
        collection.view_states = Some(view_states);
    }

    Ok(collection)
}

pub async fn save_collection(
    state: &AppState,
    dataset_id: &str,
    caller: &UserInfo,
    mut collection: Collection,
    force: bool,
) -> Result<String> {
    if collection.name.is_empty() {
        return Err(Error::BadRequest("Name must be specified".into()));
    }
    if collection.view_state_ids.is_empty() {
        return Err(Error::BadRequest("Collection has no workspaces".into()));
    }
    let id = paths::make_valid_object_name(&collection.name);
    if ItemId::parse(&id).is_shared() {
        return Err(Error::BadRequest(format!(
            "Cannot overwrite shared collection: {}",
            id
        )));
    }

    let key = paths::collection_path(&caller.user_id, dataset_id, &id);
    if !force && state.users.exists(&key).await? {
        return Err(Error::Conflict(format!(
            "Collection already exists: {}",
            id
        )));
    }

    // Snapshots belong to shared copies only
    collection.view_states = None;
    collection.meta = ObjectMeta::private(caller.clone(), now_unix_sec());

    state.users.write_json(&key, &collection).await?;
    Ok(id)
}

pub async fn delete_collection(
    state: &AppState,
    dataset_id: &str,
    caller: &UserInfo,
    wire_id: &str,
) -> Result<()> {
    let id = ItemId::parse(wire_id);
    let key = paths::collection_path(id.owner(&caller.user_id), dataset_id, &id.id);

    let collection: Collection = match state.users.read_json(&key).await {
        Ok(collection) => collection,
        Err(err) if err.is_not_found() => {
            return Err(Error::NotFound(format!("collection {}", wire_id)))
        }
        Err(err) => return Err(err),
    };
    if id.is_shared() && collection.meta.creator.user_id != caller.user_id {
        return Err(Error::Unauthorized(format!(
            "{} not owned by {}",
            wire_id, caller.user_id
        )));
    }

    state.users.delete(&key).await
}

/// Share a collection, snapshotting every member workspace's view state
/// as it stands now. Members living in the shared area are snapshotted
/// from there.
pub async fn share_collection(
    state: &AppState,
    dataset_id: &str,
    caller: &UserInfo,
    wire_id: &str,
) -> Result<String> {
    let id = ItemId::parse(wire_id);
    if id.is_shared() {
        return Err(Error::BadRequest(format!(
            "Collection is already shared: {}",
            wire_id
        )));
    }

    let key = paths::collection_path(&caller.user_id, dataset_id, &id.id);
    let mut collection: Collection = match state.users.read_json(&key).await {
        Ok(collection) => collection,
        Err(err) if err.is_not_found() => {
            return Err(Error::NotFound(format!("collection {}", wire_id)))
        }
        Err(err) => return Err(err),
    };

    let shared_key = paths::collection_path(SHARE_USER_ID, dataset_id, &id.id);
    if state.users.exists(&shared_key).await? {
        return Err(Error::Conflict(format!(
            "Shared collection already exists: {}",
            id.id
        )));
    }

    let mut view_states = BTreeMap::new();
    for member in &collection.view_state_ids {
        let workspace: Workspace =
            super::workspace::get_workspace(state, dataset_id, &caller.user_id, member).await?;
        view_states.insert(member.clone(), workspace.view_state);
    }
    collection.view_states = Some(view_states);
    collection.meta = ObjectMeta::shared(caller.clone(), now_unix_sec());

    state.users.write_json(&shared_key, &collection).await?;
    Ok(ItemId::shared(&id.id).wire())
}
