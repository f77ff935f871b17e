//! # Tessera Cache
//!
//! Cache container lifecycle, named caches, immutable entity snapshots, and
//! cluster-wide invalidation.
//!
//! Reads go through a [`SnapshotCache`] that falls back to the underlying
//! store on a miss. Writes go to the store first and then invalidate the
//! snapshot locally and, in clustered mode, on every peer.

pub mod builder;
pub mod cache;
pub mod container;
pub mod invalidation;
pub mod manager;
pub mod provider;
pub mod snapshot;
pub mod store;
pub mod topology;
pub mod transport;

pub use builder::{CacheConfigBuilder, SessionsMode};
pub use cache::{CacheStats, LoadTicket, NamedCache};
pub use container::CacheContainer;
pub use invalidation::SnapshotCache;
pub use manager::{
    ensure_offline_session_definition, CacheConnection, CacheManager, CacheManagerBuilder,
    ContainerRegistry, ExternalCacheResolver, EMBEDDED_CONTAINER_NAME,
};
pub use provider::{remove_realm, CachedRealmProvider, CachedUserProvider};
pub use snapshot::{CachedEntity, CachedRealm, CachedUser};
pub use store::{RealmStore, UserStore};
pub use topology::{
    CacheName, CacheTopologies, CacheTopology, GlobalSettings, ReplicationMode, Synchronicity,
};
pub use transport::{
    BusTransport, ClusterBus, InvalidationKind, InvalidationListener, InvalidationMessage,
    InvalidationTransport,
};
