//! Service configuration: TOML file with command-line/env overrides

use regolith_common::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub domain: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub audience: String,
    /// Token-bucket limit for calls against the identity provider
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

fn default_requests_per_second() -> u32 {
    2
}

impl Default for IdentityConfig {
    fn default() -> Self {
        IdentityConfig {
            domain: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            audience: String::new(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    /// Root directory for the user content store
    pub users_root: PathBuf,
    /// Root directory for the jobs store
    pub jobs_root: PathBuf,
    /// Root directory for the datasets store
    pub datasets_root: PathBuf,
    /// SQLite database holding users, notifications and activity records
    pub database_path: PathBuf,
    /// HTTP endpoint the job-start topic is published to
    #[serde(default)]
    pub job_topic_url: String,
    #[serde(default)]
    pub identity: IdentityConfig,
}

fn default_listen_address() -> String {
    "127.0.0.1:8080".to_string()
}

impl ApiConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&text).map_err(|e| Error::Config(format!("Bad config {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let cfg: ApiConfig = toml::from_str(
            r#"
            users_root = "/tmp/regolith/users"
            jobs_root = "/tmp/regolith/jobs"
            datasets_root = "/tmp/regolith/datasets"
            database_path = "/tmp/regolith/regolith.db"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.listen_address, "127.0.0.1:8080");
        assert_eq!(cfg.identity.requests_per_second, 2);
        assert!(cfg.job_topic_url.is_empty());
    }
}
