//! Artifact lifecycle for the four-object quantification set:
//! delete, share-copy, and the CSV import path.

use crate::quant::csv::parse_quant_csv;
use crate::quant::encode_quant;
use crate::AppState;
use bytes::Bytes;
use regolith_common::ident::{gen_object_id, SHARE_USER_ID};
use regolith_common::models::job::{JobParamsWithCount, JobStartingParameters};
use regolith_common::models::{JobState, JobStatus, JobSummary, UserInfo};
use regolith_common::time::now_unix_sec;
use regolith_common::{paths, Error, ItemId, Result};
use tokio::task::JoinSet;

/// Delete a quantification and its siblings.
///
/// The summary goes first so a listing racing this delete already
/// excludes the job; binary is fatal, status/CSV/logs are best-effort.
/// Status-record removal is what triggers the external updater to
/// rebuild the per-dataset summary file.
pub async fn delete_quant(
    state: &AppState,
    dataset_id: &str,
    wire_job_id: &str,
    caller: &UserInfo,
) -> Result<()> {
    let id = ItemId::parse(wire_job_id);
    let owner = id.owner(&caller.user_id);
    let job_id = id.id.as_str();

    let summary_path = paths::quant_path(owner, dataset_id, &paths::quant_summary_file_name(job_id));
    let summary: JobSummary = match state.users.read_json(&summary_path).await {
        Ok(summary) => summary,
        Err(err) if err.is_not_found() => {
            return Err(Error::NotFound(format!("quantification {}", wire_job_id)))
        }
        Err(err) => return Err(err),
    };

    if id.is_shared() && summary.params.params.creator.user_id != caller.user_id {
        return Err(Error::Unauthorized(format!(
            "{} not owned by {}",
            wire_job_id, caller.user_id
        )));
    }

    state.users.delete(&summary_path).await?;
    state
        .users
        .delete(&paths::quant_path(owner, dataset_id, &paths::quant_data_file_name(job_id)))
        .await?;

    // Absence of the status record is normal for old jobs
    if let Err(err) = state
        .jobs
        .delete(&paths::job_status_path(dataset_id, job_id))
        .await
    {
        if !err.is_not_found() {
            tracing::warn!("Failed to delete job status for {}: {}", job_id, err);
        }
    }

    if let Err(err) = state
        .users
        .delete(&paths::quant_path(owner, dataset_id, &paths::quant_csv_file_name(job_id)))
        .await
    {
        if !err.is_not_found() {
            tracing::warn!("Failed to delete quant CSV for {}: {}", job_id, err);
        }
    }

    delete_log_directory(state, owner, dataset_id, job_id).await;
    Ok(())
}

/// One concurrent delete per log object; failures are aggregated and
/// logged, never returned.
async fn delete_log_directory(state: &AppState, owner: &str, dataset_id: &str, job_id: &str) {
    let log_prefix = paths::quant_path(owner, dataset_id, &paths::quant_log_dir_name(job_id));
    let log_keys = match state.users.list_keys(&format!("{}/", log_prefix)).await {
        Ok(keys) => keys,
        Err(err) => {
            tracing::warn!("Failed to list logs for {}: {}", job_id, err);
            return;
        }
    };

    let mut tasks = JoinSet::new();
    for key in log_keys {
        let store = state.users.clone();
        tasks.spawn(async move { store.delete(&key).await });
    }

    let mut failures = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            _ => failures += 1,
        }
    }
    if failures > 0 {
        tracing::warn!("Failed to delete {} log objects for {}", failures, job_id);
    }
}

/// Share a quantification: copy summary, binary and CSV into the shared
/// area under the same job id. Logs are not copied; they remain
/// reachable through the owner recorded on the summary. An
/// already-shared id cannot be shared again.
pub async fn share_quant(
    state: &AppState,
    dataset_id: &str,
    wire_job_id: &str,
    caller: &UserInfo,
) -> Result<String> {
    let id = ItemId::parse(wire_job_id);
    if id.is_shared() {
        return Err(Error::BadRequest(format!(
            "Quantification is already shared: {}",
            wire_job_id
        )));
    }
    let job_id = id.id.as_str();

    let summary_path = paths::quant_path(
        &caller.user_id,
        dataset_id,
        &paths::quant_summary_file_name(job_id),
    );
    let mut summary: JobSummary = match state.users.read_json(&summary_path).await {
        Ok(summary) => summary,
        Err(err) if err.is_not_found() => {
            return Err(Error::NotFound(format!("quantification {}", job_id)))
        }
        Err(err) => return Err(err),
    };

    state
        .users
        .copy(
            &paths::quant_path(&caller.user_id, dataset_id, &paths::quant_data_file_name(job_id)),
            &paths::quant_path(SHARE_USER_ID, dataset_id, &paths::quant_data_file_name(job_id)),
        )
        .await?;

    summary.shared = true;
    state
        .users
        .write_json(
            &paths::quant_path(SHARE_USER_ID, dataset_id, &paths::quant_summary_file_name(job_id)),
            &summary,
        )
        .await?;

    if let Err(err) = state
        .users
        .copy(
            &paths::quant_path(&caller.user_id, dataset_id, &paths::quant_csv_file_name(job_id)),
            &paths::quant_path(SHARE_USER_ID, dataset_id, &paths::quant_csv_file_name(job_id)),
        )
        .await
    {
        tracing::warn!("Failed to copy quant CSV while sharing {}: {}", job_id, err);
    }

    Ok(job_id.to_string())
}

/// Import a quantification from CSV text, producing a complete artifact
/// set under the caller's content area. Used by uploads and by the
/// multi-quant combiner.
pub async fn import_csv(
    state: &AppState,
    dataset_id: &str,
    caller: &UserInfo,
    csv_body: &str,
    csv_origin: &str,
    id_prefix: &str,
    quant_name: &str,
    quant_mode: &str,
    comments: &str,
) -> Result<String> {
    let job_id = format!("{}_{}", id_prefix, gen_object_id());

    let quant = parse_quant_csv(csv_body).map_err(|err| match err {
        Error::BadRequest(msg) => Error::BadRequest(msg),
        other => Error::BadRequest(other.to_string()),
    })?;
    let elements = quant.elements();

    let bin_path = paths::quant_path(&caller.user_id, dataset_id, &paths::quant_data_file_name(&job_id));
    let csv_path = paths::quant_path(&caller.user_id, dataset_id, &paths::quant_csv_file_name(&job_id));
    let summary_path = paths::quant_path(
        &caller.user_id,
        dataset_id,
        &paths::quant_summary_file_name(&job_id),
    );

    state
        .users
        .write_bytes(&bin_path, encode_quant(&quant)?)
        .await
        .map_err(|_| Error::Internal(format!("Failed to upload {} quantification", csv_origin)))?;

    // From here failures only mean missing side files
    if let Err(err) = state
        .users
        .write_bytes(&csv_path, Bytes::from(csv_body.to_string()))
        .await
    {
        tracing::error!("Failed to upload source CSV for {} quantification {}: {}", csv_origin, job_id, err);
    }

    let now = now_unix_sec();
    let summary = JobSummary {
        shared: false,
        params: JobParamsWithCount {
            pmcs_count: 0,
            params: JobStartingParameters {
                name: quant_name.to_string(),
                dataset_id: dataset_id.to_string(),
                detector_config: String::new(),
                elements: elements.clone(),
                parameters: String::new(),
                run_time_sec: 0,
                cores_per_node: 0,
                start_unix_time: now,
                creator: caller.clone(),
                roi_ids: vec![],
                quant_mode: quant_mode.to_string(),
                comments: comments.to_string(),
                command: String::new(),
            },
        },
        elements,
        status: JobStatus {
            job_id: job_id.clone(),
            status: JobState::Complete,
            message: format!("{} quantification processed", csv_origin),
            end_unix_time: now,
            output_file_path: paths::quant_path(&caller.user_id, dataset_id, ""),
            piquant_log_list: vec![],
        },
    };

    if let Err(err) = state.users.write_json(&summary_path, &summary).await {
        tracing::error!(
            "Failed to upload job summary for {} quantification {}: {}",
            csv_origin,
            job_id,
            err
        );
    }

    Ok(job_id)
}
