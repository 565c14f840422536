//! Saved workspaces: named view-state snapshots with sharing.
//!
//! Workspace ids are derived from their names. Sharing a workspace
//! auto-shares every private artifact its view state references and
//! rewrites those references to the shared copies, so the shared
//! workspace is self-contained.

use super::references::{collect_references, replace_references, ReferencedIds};
use super::simple;
use crate::jobs::artifacts;
use crate::AppState;
use regolith_common::ident::{SHARED_ID_PREFIX, SHARE_USER_ID};
use regolith_common::models::expression::RGB_MIX_ID_PREFIX;
use regolith_common::models::user::ObjectMeta;
use regolith_common::models::viewstate::SavedItemSummary;
use regolith_common::models::{Collection, UserInfo, Workspace};
use regolith_common::time::now_unix_sec;
use regolith_common::{paths, Error, ItemId, Result};
use serde::Serialize;
use std::collections::HashMap;

/// Workspaces visible to a user on a dataset: their own plus shared
/// ones, the latter listed under prefixed names. Listing as the shared
/// user (the anonymous path) covers the shared area only, so nothing
/// appears twice.
pub async fn list_workspaces(
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
            .list_objects(&paths::workspace_prefix(user_id, dataset_id))
            .await
    };
    let (own, shared) = futures::future::try_join(
        own_listing,
        state
            .users
            .list_objects(&paths::workspace_prefix(SHARE_USER_ID, dataset_id)),
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

pub async fn get_workspace(
    state: &AppState,
    dataset_id: &str,
    user_id: &str,
    wire_id: &str,
) -> Result<Workspace> {
    let id = ItemId::parse(wire_id);
    let key = paths::workspace_path(id.owner(user_id), dataset_id, &id.id);
    let mut workspace: Workspace = match state.users.read_json(&key).await {
        Ok(workspace) => workspace,
        Err(err) if err.is_not_found() => {
            return Err(Error::NotFound(format!("workspace {}", wire_id)))
        }
        Err(err) => return Err(err),
    };
    workspace.view_state.quantification.apply_roi_fallback();
    Ok(workspace)
}

/// Save a workspace under an id derived from its name. Overwriting an
/// existing workspace requires the force flag; shared workspaces are
/// immutable.
pub async fn save_workspace(
    state: &AppState,
    dataset_id: &str,
    caller: &UserInfo,
    mut workspace: Workspace,
    force: bool,
) -> Result<String> {
    if workspace.name.is_empty() {
        return Err(Error::BadRequest("Name must be specified".into()));
    }
    let id = paths::make_valid_object_name(&workspace.name);
    if ItemId::parse(&id).is_shared() {
        return Err(Error::BadRequest(format!(
            "Cannot overwrite shared workspace: {}",
            id
        )));
    }

    let key = paths::workspace_path(&caller.user_id, dataset_id, &id);
    if !force && state.users.exists(&key).await? {
        return Err(Error::Conflict(format!("Workspace already exists: {}", id)));
    }

    workspace.view_state.filter_unused_widgets();
    workspace.view_state.quantification.apply_roi_fallback();
    workspace.meta = ObjectMeta::private(caller.clone(), now_unix_sec());

    state.users.write_json(&key, &workspace).await?;
    Ok(id)
}

/// Delete a workspace. Shared ones can only be deleted by their
/// creator, and never while a collection still lists them.
pub async fn delete_workspace(
    state: &AppState,
    dataset_id: &str,
    caller: &UserInfo,
    wire_id: &str,
) -> Result<()> {
    let id = ItemId::parse(wire_id);
    let owner = id.owner(&caller.user_id);
    let key = paths::workspace_path(owner, dataset_id, &id.id);

    let workspace: Workspace = match state.users.read_json(&key).await {
        Ok(workspace) => workspace,
        Err(err) if err.is_not_found() => {
            return Err(Error::NotFound(format!("workspace {}", wire_id)))
        }
        Err(err) => return Err(err),
    };
    if id.is_shared() && workspace.meta.creator.user_id != caller.user_id {
        return Err(Error::Unauthorized(format!(
            "{} not owned by {}",
            wire_id, caller.user_id
        )));
    }

    if let Some(collection) = containing_collection(state, dataset_id, owner, wire_id).await? {
        return Err(Error::Conflict(format!(
            "Workspace {} is referenced by collection {}",
            wire_id, collection
        )));
    }

    state.users.delete(&key).await
}

/// Name of a collection in the same area that still lists this workspace
async fn containing_collection(
    state: &AppState,
    dataset_id: &str,
    owner: &str,
    wire_id: &str,
) -> Result<Option<String>> {
    let keys = state
        .users
        .list_keys(&paths::collection_prefix(owner, dataset_id))
        .await?;
    for key in keys {
        let collection: Collection = match state.users.read_json(&key).await {
            Ok(collection) => collection,
            Err(err) => {
                tracing::warn!("Failed to read collection {}: {}", key, err);
                continue;
            }
        };
        if collection
            .view_state_ids
            .iter()
            .any(|member| member == wire_id)
        {
            return Ok(Some(collection.name));
        }
    }
    Ok(None)
}

#[derive(Debug, Serialize)]
pub struct WorkspaceReferences {
    #[serde(rename = "ROIs")]
    pub rois: Vec<String>,
    pub expressions: Vec<String>,
    #[serde(rename = "RGBMixes")]
    pub rgb_mixes: Vec<String>,
    pub quantifications: Vec<String>,
    #[serde(rename = "nonSharedCount")]
    pub non_shared_count: usize,
}

/// What sharing this workspace would touch
pub async fn workspace_references(
    state: &AppState,
    dataset_id: &str,
    user_id: &str,
    wire_id: &str,
) -> Result<WorkspaceReferences> {
    let workspace = get_workspace(state, dataset_id, user_id, wire_id).await?;
    let refs = collect_references(&workspace.view_state);
    let non_shared_count = refs.non_shared().len();
    Ok(WorkspaceReferences {
        rois: refs.rois.into_iter().collect(),
        expressions: refs.expressions.into_iter().collect(),
        rgb_mixes: refs.rgb_mixes.into_iter().collect(),
        quantifications: refs.quants.into_iter().collect(),
        non_shared_count,
    })
}

/// Share a workspace. Non-shared references are rejected unless the
/// caller opted into auto-sharing, which shares each one and rewrites
/// the workspace to point at the shared copies. A workspace whose
/// references are all shared may be re-shared; that overwrites the
/// shared snapshot without changing any ids. Returns the shared
/// workspace's wire id.
pub async fn share_workspace(
    state: &AppState,
    dataset_id: &str,
    caller: &UserInfo,
    wire_id: &str,
    auto_share: bool,
) -> Result<String> {
    let id = ItemId::parse(wire_id);
    if id.is_shared() {
        return Err(Error::BadRequest(format!(
            "Workspace is already shared: {}",
            wire_id
        )));
    }

    let mut workspace = get_workspace(state, dataset_id, &caller.user_id, wire_id).await?;
    let shared_key = paths::workspace_path(SHARE_USER_ID, dataset_id, &id.id);

    let refs = collect_references(&workspace.view_state);
    let non_shared = refs.non_shared();
    if !non_shared.is_empty() && !auto_share {
        return Err(Error::BadRequest(format!(
            "Workspace references {} non-shared items; enable auto-share to share them",
            non_shared.len()
        )));
    }
    let replacements = share_referenced(state, dataset_id, caller, &refs).await?;
    replace_references(&mut workspace.view_state, &replacements);

    workspace.meta = ObjectMeta::shared(caller.clone(), now_unix_sec());
    state.users.write_json(&shared_key, &workspace).await?;

    Ok(ItemId::shared(&id.id).wire())
}

/// Share every private referenced artifact, building the old-to-new id
/// replacement map. Quantifications keep their id when shared; the
/// map-file kinds get fresh ids.
async fn share_referenced(
    state: &AppState,
    dataset_id: &str,
    caller: &UserInfo,
    refs: &ReferencedIds,
) -> Result<HashMap<String, String>> {
    let mut replacements = HashMap::new();

    for roi_id in &refs.rois {
        if ItemId::parse(roi_id).is_shared() {
            continue;
        }
        let new_id = simple::share_roi(state, dataset_id, &caller.user_id, roi_id).await?;
        replacements.insert(roi_id.clone(), ItemId::shared(&new_id).wire());
    }
    for expr_id in &refs.expressions {
        if ItemId::parse(expr_id).is_shared() {
            continue;
        }
        let new_id = simple::share_expression(state, &caller.user_id, expr_id).await?;
        replacements.insert(expr_id.clone(), ItemId::shared(&new_id).wire());
    }
    for mix_id in &refs.rgb_mixes {
        if ItemId::parse(mix_id).is_shared() {
            continue;
        }
        let new_id = simple::share_rgb_mix(state, &caller.user_id, mix_id).await?;
        replacements.insert(
            mix_id.clone(),
            ItemId::shared(format!("{}{}", RGB_MIX_ID_PREFIX, new_id)).wire(),
        );
    }
    for quant_id in &refs.quants {
        if ItemId::parse(quant_id).is_shared() {
            continue;
        }
        artifacts::share_quant(state, dataset_id, quant_id, caller).await?;
        replacements.insert(quant_id.clone(), ItemId::shared(quant_id).wire());
    }

    Ok(replacements)
}

/// The auto-saved per-user view state, outside any named workspace
pub async fn get_last_view_state(
    state: &AppState,
    dataset_id: &str,
    user_id: &str,
) -> Result<regolith_common::models::WholeViewState> {
    let mut view_state: regolith_common::models::WholeViewState = state
        .users
        .read_json_or_default(&paths::last_view_state_path(user_id, dataset_id))
        .await?;
    view_state.quantification.apply_roi_fallback();
    Ok(view_state)
}

pub async fn save_last_view_state(
    state: &AppState,
    dataset_id: &str,
    user_id: &str,
    mut view_state: regolith_common::models::WholeViewState,
) -> Result<()> {
    view_state.filter_unused_widgets();
    view_state.quantification.apply_roi_fallback();
    state
        .users
        .write_json(&paths::last_view_state_path(user_id, dataset_id), &view_state)
        .await
}
