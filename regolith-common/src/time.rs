//! Time helpers

use chrono::Utc;

/// Current wall-clock time as unix seconds
pub fn now_unix_sec() -> i64 {
    Utc::now().timestamp()
}
