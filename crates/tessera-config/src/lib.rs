//! # Tessera Config
//!
//! Configuration management for the Tessera cache layer.
//! Supports layered configuration from files and environment variables,
//! runtime refresh, and scope-style key lookups for the cache subsystem.

mod app_config;
mod loader;
mod scope;
mod validation;

pub use app_config::*;
pub use loader::*;
pub use scope::*;
pub use validation::*;
