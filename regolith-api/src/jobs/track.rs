//! Job tracker: listings and individual reads over completed and
//! in-progress quantification jobs.

use crate::AppState;
use regolith_common::ident::SHARE_USER_ID;
use regolith_common::models::{BlessFile, BlessItem, JobSummary, JobSummaryMap};
use regolith_common::{paths, Error, ItemId, Result};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Serialize)]
pub struct QuantListing {
    pub summaries: Vec<JobSummary>,
    #[serde(rename = "blessedQuant")]
    pub blessed_quant: Option<BlessItem>,
}

/// Refresh a summary's creator name/email from the user database.
/// Lookup failure is logged and leaves the persisted values in place.
async fn refresh_creator(state: &AppState, summary: &mut JobSummary, context: &str) {
    let creator = &summary.params.params.creator;
    match crate::db::creator_details(&state.db, &creator.user_id).await {
        Ok(updated) => summary.params.params.creator = updated,
        Err(err) => {
            tracing::error!(
                "Failed to lookup user details for {} ({}): {}",
                creator.user_id,
                context,
                err
            );
        }
    }
}

/// Every job across every dataset, sorted by job id.
/// A missing or malformed per-dataset file is logged and skipped.
pub async fn admin_list(state: &AppState) -> Result<Vec<JobSummary>> {
    let keys = state
        .jobs
        .list_keys(&format!("{}/", paths::ROOT_JOB_SUMMARIES))
        .await?;

    let mut summaries = Vec::new();
    for key in keys {
        if !key.ends_with(paths::JOB_SUMMARY_SUFFIX) || key.split('/').count() != 2 {
            continue;
        }
        match state.jobs.read_json::<JobSummaryMap>(&key).await {
            Ok(map) => {
                summaries.extend(map.into_values().map(JobSummary::set_missing_fields));
            }
            Err(err) => {
                tracing::error!(
                    "Failed to get job list {}; jobs for this dataset not included in admin list: {}",
                    key,
                    err
                );
            }
        }
    }

    for summary in summaries.iter_mut() {
        refresh_creator(state, summary, "quant admin listing").await;
    }
    summaries.sort_by(|a, b| a.status.job_id.cmp(&b.status.job_id));
    Ok(summaries)
}

/// Jobs for one dataset as visible to one user: completed quants from
/// the user's own and the shared area (fetched concurrently), merged
/// with this user's in-progress jobs, plus the blessed pointer.
pub async fn list_for_dataset(
    state: &AppState,
    dataset_id: &str,
    user_id: &str,
) -> Result<QuantListing> {
    let (own, shared) = futures::future::try_join(
        super::fetch_area_summaries(state, user_id, dataset_id, false),
        super::fetch_area_summaries(state, SHARE_USER_ID, dataset_id, true),
    )
    .await?;

    let mut summaries: Vec<JobSummary> = own.into_iter().chain(shared).collect();
    let known_ids: HashSet<String> = summaries
        .iter()
        .map(|s| s.status.job_id.clone())
        .collect();

    // In-progress jobs from the externally maintained per-dataset file;
    // absence just means nothing has run yet.
    let in_progress: JobSummaryMap = state
        .jobs
        .read_json_or_default(&paths::job_summaries_path(dataset_id))
        .await?;
    for (_, summary) in in_progress {
        if summary.params.params.creator.user_id == user_id
            && !known_ids.contains(&summary.status.job_id)
        {
            summaries.push(summary.set_missing_fields());
        }
    }

    for summary in summaries.iter_mut() {
        refresh_creator(state, summary, "quant user listing").await;
    }
    summaries.sort_by(|a, b| a.status.job_id.cmp(&b.status.job_id));

    // Only shared quants can be blessed, so the pointer surfaces shared-prefixed
    let bless: BlessFile = state
        .users
        .read_json_or_default(&paths::bless_file_path(dataset_id))
        .await?;
    let blessed_quant = bless.latest().cloned().map(|mut item| {
        item.job_id = ItemId::shared(&item.job_id).wire();
        item
    });

    Ok(QuantListing {
        summaries,
        blessed_quant,
    })
}

#[derive(Debug, Serialize)]
pub struct QuantGetResponse {
    pub summary: JobSummary,
    pub url: String,
}

/// One quantification's summary plus a cacheable URL for its binary stream
pub async fn get_quant(
    state: &AppState,
    dataset_id: &str,
    user_id: &str,
    wire_job_id: &str,
) -> Result<QuantGetResponse> {
    let id = ItemId::parse(wire_job_id);
    let summary_path = paths::quant_path(
        id.owner(user_id),
        dataset_id,
        &paths::quant_summary_file_name(&id.id),
    );

    let mut summary: JobSummary = match state.users.read_json(&summary_path).await {
        Ok(summary) => summary,
        Err(err) if err.is_not_found() => {
            return Err(Error::NotFound(format!("quantification {}", wire_job_id)))
        }
        Err(err) => return Err(err),
    };

    summary = summary.set_missing_fields();
    refresh_creator(state, &mut summary, "quant get").await;

    Ok(QuantGetResponse {
        summary,
        url: format!("/quantification/download/{}/{}", dataset_id, wire_job_id),
    })
}

/// Resolve the storage key for one of a job's streamable artifacts
pub fn stream_key(dataset_id: &str, user_id: &str, wire_job_id: &str, file_kind: StreamKind) -> String {
    let id = ItemId::parse(wire_job_id);
    let owner = id.owner(user_id);
    match file_kind {
        StreamKind::Binary => {
            paths::quant_path(owner, dataset_id, &paths::quant_data_file_name(&id.id))
        }
        StreamKind::Csv => {
            paths::quant_path(owner, dataset_id, &paths::quant_csv_file_name(&id.id))
        }
        StreamKind::Log(log_name) => paths::quant_path(
            owner,
            dataset_id,
            &format!("{}/{}", paths::quant_log_dir_name(&id.id), log_name),
        ),
    }
}

pub enum StreamKind {
    Binary,
    Csv,
    Log(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_keys_follow_prefix() {
        assert_eq!(
            stream_key("ds1", "u1", "j1", StreamKind::Binary),
            "UserContent/u1/ds1/Quantification/j1.bin"
        );
        assert_eq!(
            stream_key("ds1", "u1", "shared-j1", StreamKind::Csv),
            "UserContent/shared/ds1/Quantification/j1.csv"
        );
        assert_eq!(
            stream_key("ds1", "u1", "j1", StreamKind::Log("node1.log".to_string())),
            "UserContent/u1/ds1/Quantification/j1-logs/node1.log"
        );
    }
}
