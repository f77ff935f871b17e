//! # Tessera Core
//!
//! Core types, live domain models, and error definitions shared by the
//! cache, session, and server crates.

pub mod domain;
pub mod error;
pub mod id;
pub mod result;
pub mod time;

pub use domain::*;
pub use error::*;
pub use id::*;
pub use result::*;
pub use time::*;

// Re-export shaku for dependency injection
pub use shaku::Interface;
