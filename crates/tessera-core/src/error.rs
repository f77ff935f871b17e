//! Unified error types for the cache and session layers.

use std::fmt::Debug;
use thiserror::Error;

/// Unified error type for Tessera.
///
/// Not-found conditions on reads are never represented here: lookups return
/// `Option` so call sites stay uniform between the in-memory and clustered
/// implementations.
#[derive(Error, Debug)]
pub enum TesseraError {
    // ============ Domain Errors ============
    /// Resource not found (only used by write paths that require an existing entity)
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// Conflict error (e.g., duplicate entry)
    #[error("Conflict: {0}")]
    Conflict(String),

    // ============ Startup Errors ============
    /// Configuration error, fatal at startup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Container-managed cache container could not be resolved
    #[error("Failed to retrieve cache container '{lookup}': {message}")]
    ContainerLookup { lookup: String, message: String },

    // ============ Cache Errors ============
    /// Requested cache name is not defined on the container
    #[error("Undefined cache: {0}")]
    UndefinedCache(String),

    /// Cache container has been stopped
    #[error("Cache container '{0}' is not running")]
    ContainerStopped(String),

    /// Generic cache error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Underlying store error
    #[error("Store error: {0}")]
    Store(String),

    // ============ Internal Errors ============
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TesseraError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::ContainerLookup { .. } => "CONTAINER_LOOKUP_ERROR",
            Self::UndefinedCache(_) => "UNDEFINED_CACHE",
            Self::ContainerStopped(_) => "CONTAINER_STOPPED",
            Self::Cache(_) => "CACHE_ERROR",
            Self::Store(_) => "STORE_ERROR",
            Self::Internal(_) | Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Creates a not found error for a resource.
    #[must_use]
    pub fn not_found<T: ToString>(resource_type: &'static str, id: T) -> Self {
        Self::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict<T: Into<String>>(message: T) -> Self {
        Self::Conflict(message.into())
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration<T: Into<String>>(message: T) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a container lookup error.
    #[must_use]
    pub fn container_lookup(lookup: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ContainerLookup {
            lookup: lookup.into(),
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// Checks if this error aborts startup.
    ///
    /// Configuration and lookup failures leave the subsystem without a backing
    /// store, so the process must not continue.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::ContainerLookup { .. })
    }

    /// Checks if this error is retriable.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Cache(_))
    }
}

impl From<serde_json::Error> for TesseraError {
    fn from(err: serde_json::Error) -> Self {
        Self::Cache(format!("Snapshot serialization error: {}", err))
    }
}
