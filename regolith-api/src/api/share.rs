//! Sharing endpoints and reviewer magic links

use super::Caller;
use crate::jobs::artifacts;
use crate::sharing::magic_link::{self, MagicLinkRequest, MagicLinkResponse};
use crate::sharing::{collection, simple, workspace};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use regolith_common::{ItemId, Result};
use serde::Deserialize;
use serde_json::{json, Value};

/// POST /share/roi/:dataset_id/:id
pub async fn share_roi(
    State(state): State<AppState>,
    caller: Caller,
    Path((dataset_id, id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let user = caller.require()?;
    let new_id = simple::share_roi(&state, &dataset_id, &user.user_id, &id).await?;
    Ok(Json(json!({ "id": ItemId::shared(&new_id).wire() })))
}

/// POST /share/expression/:id
pub async fn share_expression(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let user = caller.require()?;
    let new_id = simple::share_expression(&state, &user.user_id, &id).await?;
    Ok(Json(json!({ "id": ItemId::shared(&new_id).wire() })))
}

/// POST /share/rgb-mix/:id
pub async fn share_rgb_mix(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let user = caller.require()?;
    let new_id = simple::share_rgb_mix(&state, &user.user_id, &id).await?;
    Ok(Json(json!({ "id": ItemId::shared(&new_id).wire() })))
}

/// POST /share/element-set/:id
pub async fn share_element_set(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let user = caller.require()?;
    let new_id = simple::share_element_set(&state, &user.user_id, &id).await?;
    Ok(Json(json!({ "id": ItemId::shared(&new_id).wire() })))
}

/// POST /share/quantification/:dataset_id/:id — shared copies keep their id
pub async fn share_quantification(
    State(state): State<AppState>,
    caller: Caller,
    Path((dataset_id, id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let user = caller.require()?;
    let job_id = artifacts::share_quant(&state, &dataset_id, &id, user).await?;
    Ok(Json(json!({ "id": ItemId::shared(&job_id).wire() })))
}

#[derive(Debug, Deserialize)]
pub struct ShareWorkspaceQuery {
    #[serde(rename = "auto-share", default)]
    pub auto_share: bool,
}

/// POST /share/view-state/:dataset_id/:id?auto-share=true
pub async fn share_workspace(
    State(state): State<AppState>,
    caller: Caller,
    Path((dataset_id, id)): Path<(String, String)>,
    Query(query): Query<ShareWorkspaceQuery>,
) -> Result<Json<Value>> {
    let user = caller.require()?;
    let wire_id =
        workspace::share_workspace(&state, &dataset_id, user, &id, query.auto_share).await?;
    Ok(Json(json!({ "id": wire_id })))
}

/// POST /share/view-state-collection/:dataset_id/:id
pub async fn share_collection(
    State(state): State<AppState>,
    caller: Caller,
    Path((dataset_id, id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let user = caller.require()?;
    let wire_id = collection::share_collection(&state, &dataset_id, user, &id).await?;
    Ok(Json(json!({ "id": wire_id })))
}

/// POST /magiclink — anonymous by design; the link is the credential
pub async fn redeem_magic_link(
    State(state): State<AppState>,
    Json(req): Json<MagicLinkRequest>,
) -> Result<Json<MagicLinkResponse>> {
    Ok(Json(magic_link::redeem_magic_link(&state, &req).await?))
}
