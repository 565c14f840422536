//! Blessing: marking one quantification as the endorsed default for a
//! dataset. Only shared quantifications can be blessed; blessing a
//! private one shares it first.

use crate::jobs::artifacts;
use crate::AppState;
use regolith_common::models::{BlessFile, UserInfo};
use regolith_common::time::now_unix_sec;
use regolith_common::{paths, ItemId, Result};

pub async fn bless_quant(
    state: &AppState,
    dataset_id: &str,
    wire_job_id: &str,
    caller: &UserInfo,
) -> Result<()> {
    let id = ItemId::parse(wire_job_id);
    if !id.is_shared() {
        artifacts::share_quant(state, dataset_id, &id.id, caller).await?;
    }

    let bless_path = paths::bless_file_path(dataset_id);
    let mut bless: BlessFile = state.users.read_json_or_default(&bless_path).await?;
    bless.append(now_unix_sec(), caller, &id.id);
    state.users.write_json(&bless_path, &bless).await?;

    if let Err(err) = crate::db::insert_notification(
        &state.db,
        &caller.user_id,
        "Quantification blessed",
        &format!("Quantification {} is now blessed for dataset {}", id.id, dataset_id),
        now_unix_sec(),
    )
    .await
    {
        tracing::warn!("Failed to record bless notification for {}: {}", id.id, err);
    }

    Ok(())
}
