//! Live realm model.

use crate::RealmId;
use serde::{Deserialize, Serialize};

/// Default SSO session idle timeout (30 minutes).
pub const DEFAULT_SSO_SESSION_IDLE_TIMEOUT: i64 = 1800;

/// Default SSO session max lifespan (10 hours).
pub const DEFAULT_SSO_SESSION_MAX_LIFESPAN: i64 = 36_000;

/// Default offline session idle timeout (30 days).
pub const DEFAULT_OFFLINE_SESSION_IDLE_TIMEOUT: i64 = 2_592_000;

/// Session expiration limits for a realm, all in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLimits {
    /// Idle timeout for online sessions.
    pub sso_session_idle_timeout: i64,
    /// Maximum lifespan of online sessions.
    pub sso_session_max_lifespan: i64,
    /// Idle timeout for offline sessions.
    pub offline_session_idle_timeout: i64,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            sso_session_idle_timeout: DEFAULT_SSO_SESSION_IDLE_TIMEOUT,
            sso_session_max_lifespan: DEFAULT_SSO_SESSION_MAX_LIFESPAN,
            offline_session_idle_timeout: DEFAULT_OFFLINE_SESSION_IDLE_TIMEOUT,
        }
    }
}

/// Mutable realm record as owned by the underlying realm store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmModel {
    /// Realm identifier.
    pub id: RealmId,
    /// Unique realm name.
    pub name: String,
    /// Human-readable display name.
    pub display_name: Option<String>,
    /// Whether the realm is enabled.
    pub enabled: bool,
    /// Session expiration limits.
    pub session_limits: SessionLimits,
}

impl RealmModel {
    /// Creates an enabled realm with default session limits.
    #[must_use]
    pub fn new(id: RealmId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            display_name: None,
            enabled: true,
            session_limits: SessionLimits::default(),
        }
    }
}
