//! Caller identity extraction and request activity recording.
//!
//! The gateway in front of this service validates bearer tokens and
//! forwards the caller's identity in headers; requests without them are
//! treated as anonymous and only reach public content.

use crate::services::ActivityRecord;
use crate::AppState;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use regolith_common::models::UserInfo;
use regolith_common::time::now_unix_sec;
use regolith_common::{Error, Result};

const USER_ID_HEADER: &str = "x-user-id";
const USER_NAME_HEADER: &str = "x-user-name";
const USER_EMAIL_HEADER: &str = "x-user-email";

/// The identity a request arrived with; may be anonymous
#[derive(Debug, Clone)]
pub struct Caller(pub UserInfo);

impl Caller {
    pub fn is_anonymous(&self) -> bool {
        self.0.user_id.is_empty()
    }

    /// The caller's identity, or 401 for anonymous requests
    pub fn require(&self) -> Result<&UserInfo> {
        if self.is_anonymous() {
            Err(Error::Unauthorized("Login required".into()))
        } else {
            Ok(&self.0)
        }
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string()
        };
        Ok(Caller(UserInfo::new(
            header(USER_ID_HEADER),
            header(USER_NAME_HEADER),
            header(USER_EMAIL_HEADER),
        )))
    }
}

/// Record method/path/status for authenticated requests.
/// Recording is fire-and-forget; it never affects the response.
pub async fn activity_middleware(
    State(state): State<AppState>,
    caller: Caller,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    if !caller.is_anonymous() {
        state.activity.record(ActivityRecord {
            user_id: caller.0.user_id,
            method,
            path,
            status: response.status().as_u16(),
            recorded_unix_sec: now_unix_sec(),
        });
    }
    response
}
