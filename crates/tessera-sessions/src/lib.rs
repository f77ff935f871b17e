//! # Tessera Sessions
//!
//! Session entities, the [`UserSessionStore`] contract, and
//! [`InMemorySessionStore`], the single-node implementation used when the
//! session caches are not clustered.

pub mod entities;
pub mod memory;
pub mod store;
mod table;

pub use entities::*;
pub use memory::{InMemorySessionStore, IDLE_TIMEOUT_WINDOW_SECONDS};
pub use store::{DecrementOutcome, ExpiredSessions, Paging, UserSessionStore};
