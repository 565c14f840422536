//! Identity provider client.
//!
//! Calls against the provider are rate limited with a token bucket
//! scoped to the configured domain, so role lookups and token
//! exchanges back off instead of hammering the management API.

use crate::config::IdentityConfig;
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use regolith_common::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Mutex;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange credentials for a bearer token (password grant)
    async fn login(&self, username: &str, password: &str, scope: &str) -> Result<String>;

    /// Role names assigned to a user
    async fn user_roles(&self, user_id: &str) -> Result<Vec<String>>;
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub struct Auth0Provider {
    client: reqwest::Client,
    config: IdentityConfig,
    limiter: DirectLimiter,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct RoleEntry {
    name: String,
}

impl Auth0Provider {
    pub fn new(config: IdentityConfig) -> Self {
        let per_second =
            NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        Auth0Provider {
            client: reqwest::Client::new(),
            config,
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
        }
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<String> {
        self.limiter.until_ready().await;
        let url = format!("https://{}/oauth/token", self.config.domain);
        let resp = self.client.post(&url).form(form).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Unauthorized(format!(
                "Identity provider login failed: {}",
                resp.status()
            )));
        }
        let body: TokenResponse = resp.json().await?;
        Ok(body.access_token)
    }

    async fn management_token(&self) -> Result<String> {
        let audience = format!("https://{}/api/v2/", self.config.domain);
        self.token_request(&[
            ("grant_type", "client_credentials"),
            ("client_id", &self.config.client_id),
            ("client_secret", &self.config.client_secret),
            ("audience", &audience),
        ])
        .await
    }
}

#[async_trait]
impl IdentityProvider for Auth0Provider {
    async fn login(&self, username: &str, password: &str, scope: &str) -> Result<String> {
        self.token_request(&[
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
            ("audience", &self.config.audience),
            ("scope", scope),
            ("client_id", &self.config.client_id),
            ("client_secret", &self.config.client_secret),
        ])
        .await
    }

    async fn user_roles(&self, user_id: &str) -> Result<Vec<String>> {
        let token = self.management_token().await?;
        self.limiter.until_ready().await;

        let url = format!(
            "https://{}/api/v2/users/{}/roles",
            self.config.domain, user_id
        );
        let resp = self.client.get(&url).bearer_auth(token).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Internal(format!(
                "Role lookup failed for {}: {}",
                user_id,
                resp.status()
            )));
        }
        let roles: Vec<RoleEntry> = resp.json().await?;
        Ok(roles.into_iter().map(|r| r.name).collect())
    }
}

/// Fixed role/token tables; used by tests and local runs without a provider
#[derive(Default)]
pub struct StaticIdentityProvider {
    roles: Mutex<HashMap<String, Vec<String>>>,
    token: String,
}

impl StaticIdentityProvider {
    pub fn new(token: impl Into<String>) -> Self {
        StaticIdentityProvider {
            roles: Mutex::new(HashMap::new()),
            token: token.into(),
        }
    }

    pub fn set_roles(&self, user_id: &str, roles: Vec<String>) {
        if let Ok(mut map) = self.roles.lock() {
            map.insert(user_id.to_string(), roles);
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn login(&self, _username: &str, _password: &str, _scope: &str) -> Result<String> {
        Ok(self.token.clone())
    }

    async fn user_roles(&self, user_id: &str) -> Result<Vec<String>> {
        Ok(self
            .roles
            .lock()
            .ok()
            .and_then(|map| map.get(user_id).cloned())
            .unwrap_or_default())
    }
}
