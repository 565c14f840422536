//! Quantification endpoints: job dispatch, listings, artifact streaming,
//! CSV upload, multi-quant combine and blessing.

use super::Caller;
use crate::jobs::dispatch::{self, CreateJobRequest, DispatchOutcome};
use crate::jobs::track::{self, QuantGetResponse, QuantListing, StreamKind};
use crate::jobs::artifacts;
use crate::quant::combine::{self, MultiQuantRequest, QuantCombineSummary};
use crate::quant::csv::parse_quant_csv;
use crate::sharing::{bless, visibility};
use crate::store::ContentStore;
use crate::AppState;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;
use regolith_common::models::job::quant_mode;
use regolith_common::models::JobSummary;
use regolith_common::{Error, Result};
use serde::Deserialize;
use serde_json::{json, Value};

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// POST /quantification/:dataset_id
pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Path(dataset_id): Path<String>,
    Json(req): Json<CreateJobRequest>,
) -> Result<Json<Value>> {
    let user = caller.require()?;
    match dispatch::create_job(&state, &dataset_id, user, req).await? {
        DispatchOutcome::JobId(job_id) => Ok(Json(json!({ "jobID": job_id }))),
        DispatchOutcome::CommandOutput(output) => Ok(Json(json!({ "output": output }))),
    }
}

/// GET /quantification/:dataset_id
pub async fn list(
    State(state): State<AppState>,
    caller: Caller,
    Path(dataset_id): Path<String>,
) -> Result<Json<QuantListing>> {
    let user = caller.require()?;
    Ok(Json(
        track::list_for_dataset(&state, &dataset_id, &user.user_id).await?,
    ))
}

/// GET /quantification — all jobs across all datasets
pub async fn admin_list(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<JobSummary>>> {
    caller.require()?;
    Ok(Json(track::admin_list(&state).await?))
}

/// GET /quantification/:dataset_id/:job_id
pub async fn get_one(
    State(state): State<AppState>,
    caller: Caller,
    Path((dataset_id, job_id)): Path<(String, String)>,
) -> Result<Json<QuantGetResponse>> {
    check_quant_access(&state, &caller, &job_id).await?;
    Ok(Json(
        track::get_quant(&state, &dataset_id, &caller.0.user_id, &job_id).await?,
    ))
}

/// DELETE /quantification/:dataset_id/:job_id
pub async fn delete(
    State(state): State<AppState>,
    caller: Caller,
    Path((dataset_id, job_id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let user = caller.require()?;
    artifacts::delete_quant(&state, &dataset_id, &job_id, user).await?;
    Ok(Json(json!({ "id": job_id })))
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub name: String,
    #[serde(default)]
    pub comments: String,
    #[serde(rename = "csvData")]
    pub csv_data: String,
}

/// POST /quantification/upload/:dataset_id — import a hand-made CSV
pub async fn upload(
    State(state): State<AppState>,
    caller: Caller,
    Path(dataset_id): Path<String>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<Value>> {
    let user = caller.require()?;
    if req.name.is_empty() {
        return Err(Error::BadRequest("Name must be specified".into()));
    }

    let quant = parse_quant_csv(&req.csv_data)?;
    let mode = if quant.detectors.len() == 1 {
        quant_mode::COMBINED_MANUAL
    } else {
        quant_mode::AB_MANUAL
    };

    let job_id = artifacts::import_csv(
        &state,
        &dataset_id,
        user,
        &req.csv_data,
        "uploaded",
        "upload",
        &req.name,
        mode,
        &req.comments,
    )
    .await?;
    Ok(Json(json!({ "jobID": job_id })))
}

/// POST /quantification/combine/:dataset_id
pub async fn combine_quants(
    State(state): State<AppState>,
    caller: Caller,
    Path(dataset_id): Path<String>,
    Json(req): Json<MultiQuantRequest>,
) -> Result<Json<Value>> {
    let user = caller.require()?;
    let job_id = combine::combine(&state, &dataset_id, user, &req).await?;
    Ok(Json(json!({ "jobID": job_id })))
}

/// POST /quantification/combine-list/:dataset_id — summary preview
pub async fn combine_list(
    State(state): State<AppState>,
    caller: Caller,
    Path(dataset_id): Path<String>,
    Json(req): Json<MultiQuantRequest>,
) -> Result<Json<QuantCombineSummary>> {
    let user = caller.require()?;
    Ok(Json(
        combine::combine_summary(&state, &dataset_id, user, &req).await?,
    ))
}

/// POST /quantification/bless/:dataset_id/:job_id
pub async fn bless_quant(
    State(state): State<AppState>,
    caller: Caller,
    Path((dataset_id, job_id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let user = caller.require()?;
    bless::bless_quant(&state, &dataset_id, &job_id, user).await?;
    Ok(Json(json!({ "jobID": job_id })))
}

/// GET /quantification/download/:dataset_id/:job_id — binary artifact
pub async fn download_data(
    State(state): State<AppState>,
    caller: Caller,
    Path((dataset_id, job_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response> {
    check_quant_access(&state, &caller, &job_id).await?;
    let key = track::stream_key(&dataset_id, &caller.0.user_id, &job_id, StreamKind::Binary);
    stream_object(&state.users, &key, &headers, "application/octet-stream").await
}

/// GET /quantification/download/:dataset_id/:job_id/csv
pub async fn download_csv(
    State(state): State<AppState>,
    caller: Caller,
    Path((dataset_id, job_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response> {
    check_quant_access(&state, &caller, &job_id).await?;
    let key = track::stream_key(&dataset_id, &caller.0.user_id, &job_id, StreamKind::Csv);
    stream_object(&state.users, &key, &headers, "text/csv").await
}

/// GET /quantification/log/:dataset_id/:job_id/:log_name
pub async fn download_log(
    State(state): State<AppState>,
    caller: Caller,
    Path((dataset_id, job_id, log_name)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response> {
    caller.require()?;
    let key = track::stream_key(
        &dataset_id,
        &caller.0.user_id,
        &job_id,
        StreamKind::Log(log_name),
    );
    stream_object(&state.users, &key, &headers, "text/plain").await
}

/// GET /quantification/last/:dataset_id/:command/:kind — latest
/// diagnostic command output or log (`kind` is `output` or `log`)
pub async fn download_last_run(
    State(state): State<AppState>,
    caller: Caller,
    Path((dataset_id, command, kind)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response> {
    caller.require()?;
    if kind != "output" && kind != "log" {
        return Err(Error::BadRequest(format!("Invalid file kind: {}", kind)));
    }
    let key = regolith_common::paths::job_last_run_path(&dataset_id, &command, &kind);
    stream_object(&state.jobs, &key, &headers, "text/plain").await
}

/// Anonymous callers may only reach quantifications in the public set
async fn check_quant_access(state: &AppState, caller: &Caller, job_id: &str) -> Result<()> {
    if !caller.is_anonymous() {
        return Ok(());
    }
    let objects = visibility::load_public_objects(state).await?;
    if objects.is_quantification_public(job_id) {
        Ok(())
    } else {
        Err(Error::Unauthorized("Login required".into()))
    }
}

/// Serve an object with ETag / Last-Modified conditional handling
async fn stream_object(
    store: &ContentStore,
    key: &str,
    headers: &HeaderMap,
    content_type: &str,
) -> Result<Response> {
    let meta = match store.head(key).await {
        Ok(meta) => meta,
        Err(err) if err.is_not_found() => {
            return Err(Error::NotFound(format!("file {}", key)))
        }
        Err(err) => return Err(err),
    };
    let last_modified = meta.last_modified.format(HTTP_DATE_FORMAT).to_string();

    let etag_matches = match (&meta.e_tag, headers.get(header::IF_NONE_MATCH)) {
        (Some(etag), Some(value)) => value
            .to_str()
            .map(|v| v.contains(etag.as_str()))
            .unwrap_or(false),
        _ => false,
    };
    let date_matches = headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == last_modified)
        .unwrap_or(false);

    if etag_matches || date_matches {
        return build_response(StatusCode::NOT_MODIFIED, &meta.e_tag, &last_modified, content_type, Body::empty());
    }

    let bytes = store.read_bytes(key).await?;
    build_response(
        StatusCode::OK,
        &meta.e_tag,
        &last_modified,
        content_type,
        Body::from(bytes),
    )
}

fn build_response(
    status: StatusCode,
    e_tag: &Option<String>,
    last_modified: &str,
    content_type: &str,
    body: Body,
) -> Result<Response> {
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::LAST_MODIFIED, last_modified);
    if let Some(etag) = e_tag {
        builder = builder.header(header::ETAG, etag);
    }
    builder
        .body(body)
        .map_err(|e| Error::Internal(format!("Failed to build response: {}", e)))
}
