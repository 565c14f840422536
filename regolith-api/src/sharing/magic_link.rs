//! Reviewer magic links: a link names a shared workspace that carries a
//! reviewer account id. Redeeming the link logs that account in through
//! the identity provider and hands back its credentials.

use crate::AppState;
use regolith_common::ident::SHARE_USER_ID;
use regolith_common::models::Workspace;
use regolith_common::time::now_unix_sec;
use regolith_common::{paths, Error, ItemId, Result};
use serde::{Deserialize, Serialize};

const REVIEWER_ROLE: &str = "Reviewer";
const LOGIN_SCOPE: &str = "openid profile email";

#[derive(Debug, Deserialize)]
pub struct MagicLinkRequest {
    #[serde(rename = "magicLink")]
    pub magic_link: String,
}

#[derive(Debug, Serialize)]
pub struct MagicLinkResponse {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub email: String,
    #[serde(rename = "nonSecretPassword")]
    pub non_secret_password: String,
    pub token: String,
}

/// Link format: `{dataset}:{workspace wire id}`
fn parse_link(link: &str) -> Result<(&str, &str)> {
    link.split_once(':')
        .filter(|(dataset, workspace)| !dataset.is_empty() && !workspace.is_empty())
        .ok_or_else(|| Error::BadRequest(format!("Invalid magic link: {}", link)))
}

pub async fn redeem_magic_link(
    state: &AppState,
    req: &MagicLinkRequest,
) -> Result<MagicLinkResponse> {
    let (dataset_id, workspace_wire) = parse_link(&req.magic_link)?;

    // Reviewer workspaces always live in the shared area
    let workspace_id = ItemId::parse(workspace_wire).id;
    let key = paths::workspace_path(SHARE_USER_ID, dataset_id, &workspace_id);
    let workspace: Workspace = match state.users.read_json(&key).await {
        Ok(workspace) => workspace,
        Err(err) if err.is_not_found() => {
            return Err(Error::NotFound(format!("workspace {}", workspace_wire)))
        }
        Err(err) => return Err(err),
    };

    let reviewer_id = workspace
        .reviewer_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            Error::BadRequest(format!(
                "Workspace has no reviewer access: {}",
                workspace_wire
            ))
        })?;

    let user = crate::db::get_user(&state.db, reviewer_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("user {}", reviewer_id)))?;
    if user.expiration_unix_sec != 0 && user.expiration_unix_sec < now_unix_sec() {
        return Err(Error::Unauthorized(format!(
            "Reviewer access expired for {}",
            reviewer_id
        )));
    }

    let roles = state.identity.user_roles(reviewer_id).await?;
    if !roles.iter().any(|role| role == REVIEWER_ROLE) {
        return Err(Error::Unauthorized(format!(
            "{} is not a reviewer",
            reviewer_id
        )));
    }

    let token = state
        .identity
        .login(&user.email, &user.non_secret_password, LOGIN_SCOPE)
        .await?;

    Ok(MagicLinkResponse {
        user_id: user.user_id,
        email: user.email,
        non_secret_password: user.non_secret_password,
        token,
    })
}
