//! Application configuration structures.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tessera_core::SessionLimits;

/// Default replication mode for the session caches.
pub const DEFAULT_SESSIONS_MODE: &str = "distributed";

/// Default number of owners per session entry in distributed mode.
pub const DEFAULT_SESSIONS_OWNERS: i64 = 2;

/// Default number of hash segments in distributed mode.
pub const DEFAULT_SESSIONS_SEGMENTS: i64 = 60;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Application name and metadata.
    #[serde(default)]
    pub app: AppMetadata,

    /// Cache container configuration.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Session store configuration.
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Application metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppMetadata {
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
    /// Environment (development, staging, production).
    pub environment: String,
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: "tessera".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Cache container configuration.
///
/// `sessions_mode` stays a free-form string here; it is parsed when the cache
/// topologies are built so that an invalid value aborts startup there.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lookup name of a container-managed cache container.
    pub cache_container: Option<String>,
    /// Run the embedded container in clustered mode.
    pub clustered: bool,
    /// Use asynchronous replication when clustered.
    #[serde(rename = "async")]
    pub async_replication: bool,
    /// Allow duplicate management domains (passed through to the container).
    pub allow_duplicate_jmx_domains: bool,
    /// Replication mode of the session caches (`replicated` or `distributed`).
    pub sessions_mode: String,
    /// Owners per session entry in distributed mode.
    pub sessions_owners: i64,
    /// Hash segments in distributed mode.
    pub sessions_segments: i64,
    /// Name of this node in the cluster.
    pub node_name: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_container: None,
            clustered: false,
            async_replication: true,
            allow_duplicate_jmx_domains: true,
            sessions_mode: DEFAULT_SESSIONS_MODE.to_string(),
            sessions_owners: DEFAULT_SESSIONS_OWNERS,
            sessions_segments: DEFAULT_SESSIONS_SEGMENTS,
            node_name: None,
        }
    }
}

impl CacheConfig {
    /// Returns true if the cache container is provisioned by the host environment.
    #[must_use]
    pub fn is_container_managed(&self) -> bool {
        self.cache_container.is_some()
    }
}

/// Session store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Interval between expiration sweeps in seconds.
    pub sweep_interval_secs: u64,
    /// Idle timeout for online sessions in seconds.
    pub sso_session_idle_timeout_secs: i64,
    /// Maximum lifespan of online sessions in seconds.
    pub sso_session_max_lifespan_secs: i64,
    /// Idle timeout for offline sessions in seconds.
    pub offline_session_idle_timeout_secs: i64,
    /// Realms swept from startup.
    pub realms: Vec<String>,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        let limits = SessionLimits::default();
        Self {
            sweep_interval_secs: 900, // 15 minutes
            sso_session_idle_timeout_secs: limits.sso_session_idle_timeout,
            sso_session_max_lifespan_secs: limits.sso_session_max_lifespan,
            offline_session_idle_timeout_secs: limits.offline_session_idle_timeout,
            realms: vec!["master".to_string()],
        }
    }
}

impl SessionsConfig {
    /// Returns the sweep interval as a Duration.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Returns the default session limits applied by the sweep.
    #[must_use]
    pub const fn limits(&self) -> SessionLimits {
        SessionLimits {
            sso_session_idle_timeout: self.sso_session_idle_timeout_secs,
            sso_session_max_lifespan: self.sso_session_max_lifespan_secs,
            offline_session_idle_timeout: self.offline_session_idle_timeout_secs,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Log format (json, pretty).
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}
