//! Job dispatcher: validate a job request, persist its starting
//! parameters and initial status, and publish the start message.
//!
//! The external runner consumes the topic and writes status/output
//! objects back; the dispatcher never retries — the bus is the
//! durability boundary.

use crate::services::JobTriggerMessage;
use crate::AppState;
use regolith_common::ident::gen_object_id;
use regolith_common::models::job::{JobParamsWithCount, JobStartingParameters};
use regolith_common::models::{DatasetIndex, JobState, JobStatus, RoiItem, UserInfo};
use regolith_common::time::now_unix_sec;
use regolith_common::{paths, Error, ItemId, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

/// The one command that produces a persistent quantification
pub const COMMAND_MAP: &str = "map";
/// Reprocess jobs carry a recognizable id prefix
pub const REPROCESS_JOB_ID_PREFIX: &str = "dataimport-";

const OUTPUT_FILE: &str = "output/output.csv";
const LOG_FILE: &str = "output/run.log";
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default)]
    pub elements: Vec<String>,
    pub detector_config: String,
    #[serde(default)]
    pub parameters: String,
    pub run_time_sec: i32,
    #[serde(rename = "roiIDs", default)]
    pub roi_ids: Vec<String>,
    #[serde(default)]
    pub quant_mode: String,
    #[serde(default)]
    pub comments: String,
}

fn default_command() -> String {
    COMMAND_MAP.to_string()
}

/// What a dispatch produced: a tracked job, or a diagnostic command's raw output
pub enum DispatchOutcome {
    JobId(String),
    CommandOutput(String),
}

pub async fn create_job(
    state: &AppState,
    dataset_id: &str,
    caller: &UserInfo,
    req: CreateJobRequest,
) -> Result<DispatchOutcome> {
    let is_map = req.command == COMMAND_MAP;

    if req.command.is_empty() {
        return Err(Error::BadRequest("Command must be specified".into()));
    }
    if req.run_time_sec < 1 {
        return Err(Error::BadRequest(format!(
            "Invalid run time: {}",
            req.run_time_sec
        )));
    }
    let config_path = detector_config_to_path(&req.detector_config)?;

    if is_map {
        if req.name.is_empty() {
            return Err(Error::BadRequest("Name must be specified".into()));
        }
        if req.elements.is_empty() {
            return Err(Error::BadRequest("Elements must be specified".into()));
        }
        let names = super::existing_quant_names(state, &caller.user_id, dataset_id).await?;
        if names.contains(&req.name) {
            return Err(Error::BadRequest(format!(
                "Name already used: {}",
                req.name
            )));
        }
    }

    let job_id = if req.command == "reprocess" {
        format!("{}{}", REPROCESS_JOB_ID_PREFIX, gen_object_id())
    } else {
        gen_object_id()
    };

    let pmcs_count = count_selected_points(state, dataset_id, &caller.user_id, &req.roi_ids).await?;

    let params = JobParamsWithCount {
        pmcs_count,
        params: JobStartingParameters {
            name: req.name.clone(),
            dataset_id: dataset_id.to_string(),
            detector_config: config_path,
            elements: req.elements.clone(),
            parameters: req.parameters.clone(),
            run_time_sec: req.run_time_sec,
            cores_per_node: 0,
            start_unix_time: now_unix_sec(),
            creator: caller.clone(),
            roi_ids: req.roi_ids.clone(),
            quant_mode: req.quant_mode.clone(),
            comments: req.comments.clone(),
            command: req.command.clone(),
        },
    };

    state
        .jobs
        .write_json(&paths::job_data_path(dataset_id, &job_id, "params.json"), &params)
        .await?;
    state
        .jobs
        .write_json(
            &paths::job_status_path(dataset_id, &job_id),
            &JobStatus {
                job_id: job_id.clone(),
                status: JobState::Submitted,
                message: "Job submitted".into(),
                end_unix_time: 0,
                output_file_path: String::new(),
                piquant_log_list: vec![],
            },
        )
        .await?;

    state
        .bus
        .publish(&JobTriggerMessage {
            dataset_id: dataset_id.to_string(),
            job_id: job_id.clone(),
        })
        .await?;

    if is_map || req.command == "reprocess" {
        return Ok(DispatchOutcome::JobId(job_id));
    }

    // Diagnostic command: wait for the runner to produce output. No
    // timeout; the wait ends when output appears, the job fails, or the
    // caller disconnects.
    wait_for_command_output(state, dataset_id, &job_id, &req.command).await
}

async fn wait_for_command_output(
    state: &AppState,
    dataset_id: &str,
    job_id: &str,
    command: &str,
) -> Result<DispatchOutcome> {
    let output_key = paths::job_data_path(dataset_id, job_id, OUTPUT_FILE);
    let log_key = paths::job_data_path(dataset_id, job_id, LOG_FILE);
    let status_key = paths::job_status_path(dataset_id, job_id);

    loop {
        match state.jobs.read_bytes(&output_key).await {
            Ok(bytes) => {
                // Keep a last-run copy for the diagnostic download endpoint
                for (src, kind) in [(&output_key, "output"), (&log_key, "log")] {
                    let dst = paths::job_last_run_path(dataset_id, command, kind);
                    if let Err(err) = state.jobs.copy(src, &dst).await {
                        if !err.is_not_found() {
                            tracing::warn!("Failed to keep last {} for {}: {}", kind, command, err);
                        }
                    }
                }
                let text = String::from_utf8_lossy(&bytes).to_string();
                return Ok(DispatchOutcome::CommandOutput(text));
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        if let Ok(status) = state.jobs.read_json::<JobStatus>(&status_key).await {
            if status.status == JobState::Failed {
                return Err(Error::Internal(format!(
                    "{} command did not produce output",
                    command
                )));
            }
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Translate a `name/version` detector reference into its configuration path
fn detector_config_to_path(reference: &str) -> Result<String> {
    let parts: Vec<&str> = reference.split('/').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(Error::BadRequest(format!(
            "Invalid detector config: {}",
            reference
        )));
    }
    Ok(paths::detector_config_path(parts[0], parts[1]))
}

/// Points the job will cover: the union of its regions, or the whole
/// dataset when no regions are given.
async fn count_selected_points(
    state: &AppState,
    dataset_id: &str,
    user_id: &str,
    roi_ids: &[String],
) -> Result<i32> {
    let dataset: DatasetIndex = state
        .datasets
        .read_json(&paths::dataset_index_path(dataset_id))
        .await?;

    if roi_ids.is_empty() {
        return Ok(dataset.point_count() as i32);
    }

    let mut selected: HashSet<i32> = HashSet::new();
    for wire_id in roi_ids {
        let id = ItemId::parse(wire_id);
        let roi_file: BTreeMap<String, RoiItem> = state
            .users
            .read_json_or_default(&paths::user_content_path(
                id.owner(user_id),
                dataset_id,
                paths::ROI_FILE_NAME,
            ))
            .await?;
        let roi = roi_file
            .get(&id.id)
            .ok_or_else(|| Error::NotFound(format!("ROI {}", wire_id)))?;
        for loc in dataset.resolve_indexes(&roi.location_indexes) {
            selected.insert(loc.pmc);
        }
    }
    Ok(selected.len() as i32)
}
