//! Wall-clock helpers.
//!
//! Session and token timestamps are whole seconds since the Unix epoch, which
//! keeps expiration arithmetic integer-only and matches the wire format used
//! by the clustered session caches.

use chrono::Utc;

/// Returns the current time in seconds since the Unix epoch.
#[must_use]
pub fn current_time() -> i64 {
    Utc::now().timestamp()
}

/// Returns the current time in milliseconds since the Unix epoch.
#[must_use]
pub fn current_time_millis() -> i64 {
    Utc::now().timestamp_millis()
}
