//! Live domain models.
//!
//! These are the mutable records owned by the underlying stores. The cache
//! layer never stores them directly; see the snapshot types in `tessera-cache`.

pub mod realm;
pub mod user;

pub use realm::*;
pub use user::*;
