//! View state endpoints: the auto-saved per-user state, named
//! workspaces, collections and public visibility.

use super::Caller;
use crate::sharing::visibility;
use crate::sharing::workspace::{self, WorkspaceReferences};
use crate::sharing::collection;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use regolith_common::ident::SHARE_USER_ID;
use regolith_common::models::viewstate::SavedItemSummary;
use regolith_common::models::{Collection, DatasetIndex, WholeViewState, Workspace};
use regolith_common::{paths, Error, ItemId, Result};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct SaveQuery {
    #[serde(default)]
    pub force: bool,
}

/// GET /view-state/:dataset_id — the auto-saved view state
pub async fn get_last(
    State(state): State<AppState>,
    caller: Caller,
    Path(dataset_id): Path<String>,
) -> Result<Json<WholeViewState>> {
    let user = caller.require()?;
    Ok(Json(
        workspace::get_last_view_state(&state, &dataset_id, &user.user_id).await?,
    ))
}

/// PUT /view-state/:dataset_id
pub async fn save_last(
    State(state): State<AppState>,
    caller: Caller,
    Path(dataset_id): Path<String>,
    Json(view_state): Json<WholeViewState>,
) -> Result<Json<Value>> {
    let user = caller.require()?;
    workspace::save_last_view_state(&state, &dataset_id, &user.user_id, view_state).await?;
    Ok(Json(json!({})))
}

/// GET /view-state/saved/:dataset_id
pub async fn list_workspaces(
    State(state): State<AppState>,
    caller: Caller,
    Path(dataset_id): Path<String>,
) -> Result<Json<Vec<SavedItemSummary>>> {
    if caller.is_anonymous() {
        check_dataset_public(&state, &dataset_id).await?;
        let objects = visibility::load_public_objects(&state).await?;
        let entries = workspace::list_workspaces(&state, &dataset_id, SHARE_USER_ID)
            .await?
            .into_iter()
            .filter(|entry| objects.is_workspace_public(&entry.name))
            .collect();
        return Ok(Json(entries));
    }

    let user = caller.require()?;
    Ok(Json(
        workspace::list_workspaces(&state, &dataset_id, &user.user_id).await?,
    ))
}

/// GET /view-state/saved/:dataset_id/:id
pub async fn get_workspace(
    State(state): State<AppState>,
    caller: Caller,
    Path((dataset_id, id)): Path<(String, String)>,
) -> Result<Json<Workspace>> {
    if caller.is_anonymous() {
        let objects = visibility::load_public_objects(&state).await?;
        if !objects.is_workspace_public(&id) {
            return Err(Error::Unauthorized("Login required".into()));
        }
    }
    Ok(Json(
        workspace::get_workspace(&state, &dataset_id, &caller.0.user_id, &id).await?,
    ))
}

/// PUT /view-state/saved/:dataset_id/:id — the path id is the name
pub async fn save_workspace(
    State(state): State<AppState>,
    caller: Caller,
    Path((dataset_id, id)): Path<(String, String)>,
    Query(query): Query<SaveQuery>,
    Json(mut workspace): Json<Workspace>,
) -> Result<Json<Value>> {
    let user = caller.require()?;
    workspace.name = id;
    let saved_id =
        workspace::save_workspace(&state, &dataset_id, user, workspace, query.force).await?;
    Ok(Json(json!({ "id": saved_id })))
}

/// DELETE /view-state/saved/:dataset_id/:id
pub async fn delete_workspace(
    State(state): State<AppState>,
    caller: Caller,
    Path((dataset_id, id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let user = caller.require()?;
    workspace::delete_workspace(&state, &dataset_id, user, &id).await?;
    Ok(Json(json!({ "id": id })))
}

/// GET /view-state/references/:dataset_id/:id
pub async fn workspace_references(
    State(state): State<AppState>,
    caller: Caller,
    Path((dataset_id, id)): Path<(String, String)>,
) -> Result<Json<WorkspaceReferences>> {
    let user = caller.require()?;
    Ok(Json(
        workspace::workspace_references(&state, &dataset_id, &user.user_id, &id).await?,
    ))
}

/// GET /view-state/collections/:dataset_id
pub async fn list_collections(
    State(state): State<AppState>,
    caller: Caller,
    Path(dataset_id): Path<String>,
) -> Result<Json<Vec<SavedItemSummary>>> {
    if caller.is_anonymous() {
        check_dataset_public(&state, &dataset_id).await?;
        let objects = visibility::load_public_objects(&state).await?;
        let entries = collection::list_collections(&state, &dataset_id, SHARE_USER_ID)
            .await?
            .into_iter()
            .filter(|entry| objects.is_collection_public(&entry.name))
            .collect();
        return Ok(Json(entries));
    }

    let user = caller.require()?;
    Ok(Json(
        collection::list_collections(&state, &dataset_id, &user.user_id).await?,
    ))
}

/// GET /view-state/collections/:dataset_id/:id
pub async fn get_collection(
    State(state): State<AppState>,
    caller: Caller,
    Path((dataset_id, id)): Path<(String, String)>,
) -> Result<Json<Collection>> {
    if caller.is_anonymous() {
        let objects = visibility::load_public_objects(&state).await?;
        if !objects.is_collection_public(&id) {
            return Err(Error::Unauthorized("Login required".into()));
        }
    }
    Ok(Json(
        collection::get_collection(&state, &dataset_id, &caller.0.user_id, &id).await?,
    ))
}

/// PUT /view-state/collections/:dataset_id/:id
pub async fn save_collection(
    State(state): State<AppState>,
    caller: Caller,
    Path((dataset_id, id)): Path<(String, String)>,
    Query(query): Query<SaveQuery>,
    Json(mut collection): Json<Collection>,
) -> Result<Json<Value>> {
    let user = caller.require()?;
    collection.name = id;
    let saved_id =
        collection::save_collection(&state, &dataset_id, user, collection, query.force).await?;
    Ok(Json(json!({ "id": saved_id })))
}

/// DELETE /view-state/collections/:dataset_id/:id
pub async fn delete_collection(
    State(state): State<AppState>,
    caller: Caller,
    Path((dataset_id, id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let user = caller.require()?;
    collection::delete_collection(&state, &dataset_id, user, &id).await?;
    Ok(Json(json!({ "id": id })))
}

/// POST /public/collection/:dataset_id/:id
pub async fn make_collection_public(
    State(state): State<AppState>,
    caller: Caller,
    Path((dataset_id, id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    caller.require()?;
    visibility::make_collection_public(&state, &dataset_id, &id).await?;
    Ok(Json(json!({ "id": ItemId::parse(&id).wire() })))
}

async fn check_dataset_public(state: &AppState, dataset_id: &str) -> Result<()> {
    let dataset: DatasetIndex = state
        .datasets
        .read_json(&paths::dataset_index_path(dataset_id))
        .await?;
    if dataset.public {
        Ok(())
    } else {
        Err(Error::Unauthorized("Login required".into()))
    }
}
