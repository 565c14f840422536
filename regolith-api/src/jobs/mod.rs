//! Quantification job lifecycle: dispatch, tracking and artifact management

pub mod artifacts;
pub mod dispatch;
pub mod track;

use crate::AppState;
use regolith_common::models::JobSummary;
use regolith_common::paths;
use regolith_common::Result;
use std::collections::HashSet;
use tokio::task::JoinSet;

/// Fetch every completed-quant summary for one (user, dataset) area.
///
/// One concurrent read per summary object. Per-object read failures are
/// logged and skipped so one bad file cannot empty the listing.
pub(crate) async fn fetch_area_summaries(
    state: &AppState,
    user_id: &str,
    dataset_id: &str,
    shared: bool,
) -> Result<Vec<JobSummary>> {
    let prefix = paths::quant_path(user_id, dataset_id, "");
    let keys: Vec<String> = state
        .users
        .list_keys(&prefix)
        .await?
        .into_iter()
        .filter(|key| {
            key.rsplit('/')
                .next()
                .map(|name| name.starts_with(paths::QUANT_SUMMARY_PREFIX) && name.ends_with(".json"))
                .unwrap_or(false)
        })
        .collect();

    let mut tasks = JoinSet::new();
    for key in keys {
        let store = state.users.clone();
        tasks.spawn(async move {
            let result = store.read_json::<JobSummary>(&key).await;
            (key, result)
        });
    }

    let mut summaries = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let Ok((key, result)) = joined else { continue };
        match result {
            Ok(mut summary) => {
                summary.shared = shared;
                if shared {
                    summary.status.job_id =
                        regolith_common::ItemId::shared(&summary.status.job_id).wire();
                }
                summaries.push(summary.set_missing_fields());
            }
            Err(err) => {
                tracing::error!("Failed to read quant summary {}: {}", key, err);
            }
        }
    }

    Ok(summaries)
}

/// Names already used by quantifications visible to this user on a dataset
pub(crate) async fn existing_quant_names(
    state: &AppState,
    user_id: &str,
    dataset_id: &str,
) -> Result<HashSet<String>> {
    let (own, shared) = futures::future::try_join(
        fetch_area_summaries(state, user_id, dataset_id, false),
        fetch_area_summaries(state, regolith_common::ident::SHARE_USER_ID, dataset_id, true),
    )
    .await?;

    Ok(own
        .into_iter()
        .chain(shared)
        .map(|s| s.params.params.name)
        .collect())
}
