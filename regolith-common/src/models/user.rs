//! User identity and shared object metadata

use serde::{Deserialize, Serialize};

/// Creator identity carried on persisted artifacts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(rename = "user_id")]
    pub user_id: String,
    pub name: String,
    pub email: String,
}

impl UserInfo {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        UserInfo {
            user_id: user_id.into(),
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Ownership metadata embedded in every shareable artifact
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectMeta {
    pub shared: bool,
    pub creator: UserInfo,
    #[serde(rename = "create_unix_time_sec", default)]
    pub created_unix_time_sec: i64,
}

impl ObjectMeta {
    pub fn private(creator: UserInfo, now: i64) -> Self {
        ObjectMeta {
            shared: false,
            creator,
            created_unix_time_sec: now,
        }
    }

    pub fn shared(creator: UserInfo, now: i64) -> Self {
        ObjectMeta {
            shared: true,
            creator,
            created_unix_time_sec: now,
        }
    }
}
