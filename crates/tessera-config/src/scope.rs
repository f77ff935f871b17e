//! Scope-style configuration lookups.
//!
//! The cache subsystem reads its settings through a flat key/value scope with
//! per-lookup defaults rather than through the typed `AppConfig` tree. This
//! keeps it usable from hosts that supply configuration in other shapes.

use crate::CacheConfig;
use std::collections::HashMap;
use tessera_core::{TesseraError, TesseraResult};

/// Scope keys understood by the cache subsystem.
pub mod keys {
    /// Lookup name of a container-managed cache container.
    pub const CACHE_CONTAINER: &str = "cacheContainer";
    /// Clustered mode flag.
    pub const CLUSTERED: &str = "clustered";
    /// Asynchronous replication flag.
    pub const ASYNC: &str = "async";
    /// Duplicate management domains flag.
    pub const ALLOW_DUPLICATE_JMX_DOMAINS: &str = "allowDuplicateJMXDomains";
    /// Session cache replication mode.
    pub const SESSIONS_MODE: &str = "sessionsMode";
    /// Owners per session entry.
    pub const SESSIONS_OWNERS: &str = "sessionsOwners";
    /// Hash segments for session caches.
    pub const SESSIONS_SEGMENTS: &str = "sessionsSegments";
    /// Name of this node.
    pub const NODE_NAME: &str = "nodeName";
}

/// A configuration scope exposing string, boolean, and integer lookups.
pub trait ConfigScope: Send + Sync {
    /// Returns the raw value for a key, if set.
    fn get(&self, key: &str) -> Option<String>;

    /// Returns the value for a key or the given default.
    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Returns a boolean value, failing if the stored value is not a boolean.
    fn get_bool(&self, key: &str, default: bool) -> TesseraResult<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().to_ascii_lowercase().parse::<bool>().map_err(|_| {
                TesseraError::configuration(format!("Invalid boolean for '{}': {}", key, raw))
            }),
        }
    }

    /// Returns an integer value, failing if the stored value is not an integer.
    fn get_int(&self, key: &str, default: i64) -> TesseraResult<i64> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                TesseraError::configuration(format!("Invalid integer for '{}': {}", key, raw))
            }),
        }
    }
}

/// In-memory scope backed by a string map.
#[derive(Debug, Clone, Default)]
pub struct MapScope {
    values: HashMap<String, String>,
}

impl MapScope {
    /// Creates an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a value, returning the scope for chaining.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.values.insert(key.into(), value.to_string());
        self
    }

    /// Sets a value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.values.insert(key.into(), value.to_string());
    }
}

impl ConfigScope for MapScope {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

impl From<&CacheConfig> for MapScope {
    fn from(config: &CacheConfig) -> Self {
        let mut scope = MapScope::new()
            .with(keys::CLUSTERED, config.clustered)
            .with(keys::ASYNC, config.async_replication)
            .with(keys::ALLOW_DUPLICATE_JMX_DOMAINS, config.allow_duplicate_jmx_domains)
            .with(keys::SESSIONS_MODE, &config.sessions_mode)
            .with(keys::SESSIONS_OWNERS, config.sessions_owners)
            .with(keys::SESSIONS_SEGMENTS, config.sessions_segments);
        if let Some(container) = &config.cache_container {
            scope.set(keys::CACHE_CONTAINER, container);
        }
        if let Some(node) = &config.node_name {
            scope.set(keys::NODE_NAME, node);
        }
        scope
    }
}

impl CacheConfig {
    /// Returns this configuration as a flat lookup scope.
    #[must_use]
    pub fn scope(&self) -> MapScope {
        MapScope::from(self)
    }
}
