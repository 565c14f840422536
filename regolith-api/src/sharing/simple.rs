//! Sharing for map-file artifacts: regions, expressions, RGB mixes and
//! element sets all live as id-to-item maps, so one copy routine covers
//! them. Sharing copies the item into the shared area under a fresh id;
//! the private original is left untouched.

use crate::store::ContentStore;
use crate::AppState;
use regolith_common::ident::{gen_object_id, SHARE_USER_ID};
use regolith_common::models::expression::{RGB_MIX_ID_PREFIX, BUILTIN_EXPR_PREFIX};
use regolith_common::models::user::ObjectMeta;
use regolith_common::models::{ElementSetItem, ExpressionItem, RgbMixItem, RoiItem};
use regolith_common::time::now_unix_sec;
use regolith_common::{paths, Error, ItemId, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

/// Anything stored in a per-user map file with ownership metadata
pub trait Shareable {
    fn meta_mut(&mut self) -> &mut ObjectMeta;
}

impl Shareable for RoiItem {
    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

impl Shareable for ExpressionItem {
    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

impl Shareable for RgbMixItem {
    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

impl Shareable for ElementSetItem {
    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

/// Copy one item from a private map file into the shared one.
/// Returns the bare id of the new shared copy.
async fn share_from_map<T>(
    store: &ContentStore,
    src_file: &str,
    dst_file: &str,
    wire_id: &str,
) -> Result<String>
where
    T: Shareable + Clone + Serialize + DeserializeOwned,
{
    let id = ItemId::parse(wire_id);
    if id.is_shared() {
        return Err(Error::BadRequest(format!(
            "Item is already shared: {}",
            wire_id
        )));
    }

    let src_map: BTreeMap<String, T> = store.read_json_or_default(src_file).await?;
    let mut item = src_map
        .get(&id.id)
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("item {}", wire_id)))?;

    let new_id = gen_object_id();
    let meta = item.meta_mut();
    meta.shared = true;
    meta.created_unix_time_sec = now_unix_sec();

    let mut dst_map: BTreeMap<String, T> = store.read_json_or_default(dst_file).await?;
    dst_map.insert(new_id.clone(), item);
    store.write_json(dst_file, &dst_map).await?;

    Ok(new_id)
}

pub async fn share_roi(
    state: &AppState,
    dataset_id: &str,
    user_id: &str,
    wire_id: &str,
) -> Result<String> {
    share_from_map::<RoiItem>(
        &state.users,
        &paths::user_content_path(user_id, dataset_id, paths::ROI_FILE_NAME),
        &paths::user_content_path(SHARE_USER_ID, dataset_id, paths::ROI_FILE_NAME),
        wire_id,
    )
    .await
}

pub async fn share_expression(state: &AppState, user_id: &str, wire_id: &str) -> Result<String> {
    if wire_id.starts_with(BUILTIN_EXPR_PREFIX) {
        return Err(Error::BadRequest(format!(
            "Cannot share built-in expression: {}",
            wire_id
        )));
    }
    share_from_map::<ExpressionItem>(
        &state.users,
        &paths::user_file_path(user_id, paths::EXPRESSION_FILE_NAME),
        &paths::user_file_path(SHARE_USER_ID, paths::EXPRESSION_FILE_NAME),
        wire_id,
    )
    .await
}

/// RGB mix ids circulate with their kind prefix; it is stripped for
/// storage and restored by callers building wire ids.
pub async fn share_rgb_mix(state: &AppState, user_id: &str, wire_id: &str) -> Result<String> {
    let bare = wire_id.strip_prefix(RGB_MIX_ID_PREFIX).unwrap_or(wire_id);
    share_from_map::<RgbMixItem>(
        &state.users,
        &paths::user_file_path(user_id, paths::RGB_MIX_FILE_NAME),
        &paths::user_file_path(SHARE_USER_ID, paths::RGB_MIX_FILE_NAME),
        bare,
    )
    .await
}

pub async fn share_element_set(state: &AppState, user_id: &str, wire_id: &str) -> Result<String> {
    share_from_map::<ElementSetItem>(
        &state.users,
        &paths::user_file_path(user_id, paths::ELEMENT_SET_FILE_NAME),
        &paths::user_file_path(SHARE_USER_ID, paths::ELEMENT_SET_FILE_NAME),
        wire_id,
    )
    .await
}
