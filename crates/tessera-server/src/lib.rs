//! # Tessera Server Library
//!
//! Wires the cache manager, the session store, and the expiration sweeper
//! into one process with an explicit start and shutdown.

pub mod app;
pub mod di;
pub mod startup;
pub mod sweeper;
