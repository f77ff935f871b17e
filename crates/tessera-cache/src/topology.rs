//! Cache names and replication topologies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::str::FromStr;
use tessera_core::TesseraError;

/// The fixed set of caches owned by the cache manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheName {
    /// Realm snapshots.
    Realm,
    /// User snapshots.
    User,
    /// Online user and client sessions.
    Session,
    /// Offline user and client sessions.
    OfflineSession,
    /// Login failure records.
    LoginFailure,
}

impl CacheName {
    /// All cache names, in definition order.
    pub const ALL: [CacheName; 5] = [
        Self::Realm,
        Self::User,
        Self::Session,
        Self::OfflineSession,
        Self::LoginFailure,
    ];

    /// Returns the canonical cache name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Realm => "realm",
            Self::User => "user",
            Self::Session => "session",
            Self::OfflineSession => "offline-session",
            Self::LoginFailure => "login-failure",
        }
    }
}

impl Display for CacheName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheName {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "realm" | "realms" => Ok(Self::Realm),
            "user" | "users" => Ok(Self::User),
            "session" | "sessions" => Ok(Self::Session),
            "offline-session" | "offlineSessions" => Ok(Self::OfflineSession),
            "login-failure" | "loginFailures" => Ok(Self::LoginFailure),
            other => Err(TesseraError::UndefinedCache(other.to_string())),
        }
    }
}

/// How a cache propagates changes across the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplicationMode {
    /// Local only.
    None,
    /// Peers discard stale entries instead of receiving copies.
    Invalidation,
    /// Every node holds a full copy.
    Replicated,
    /// Entries are partitioned across `owners` nodes.
    Distributed,
}

impl ReplicationMode {
    /// Returns true if the mode involves other nodes.
    #[must_use]
    pub const fn is_clustered(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl Display for ReplicationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "NONE",
            Self::Invalidation => "INVALIDATION",
            Self::Replicated => "REPLICATED",
            Self::Distributed => "DISTRIBUTED",
        };
        f.write_str(s)
    }
}

/// Whether writers wait for peers to acknowledge replication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Synchronicity {
    /// Writers wait for acknowledgement.
    Sync,
    /// Writers return immediately.
    Async,
}

impl Synchronicity {
    /// Maps the `async` configuration flag.
    #[must_use]
    pub const fn from_async_flag(is_async: bool) -> Self {
        if is_async {
            Self::Async
        } else {
            Self::Sync
        }
    }
}

impl Display for Synchronicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync => f.write_str("SYNC"),
            Self::Async => f.write_str("ASYNC"),
        }
    }
}

/// Replication and partitioning definition of one named cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTopology {
    /// Cache this definition applies to.
    pub name: CacheName,
    /// Replication mode.
    pub mode: ReplicationMode,
    /// Replication synchronicity.
    pub synchronicity: Synchronicity,
    /// Owners per entry, only meaningful for distributed caches.
    pub owners: u32,
    /// Hash segments, only meaningful for distributed caches.
    pub segments: u32,
}

impl CacheTopology {
    /// A local, non-replicated topology.
    #[must_use]
    pub const fn local(name: CacheName) -> Self {
        Self {
            name,
            mode: ReplicationMode::None,
            synchronicity: Synchronicity::Sync,
            owners: 1,
            segments: 1,
        }
    }

    /// Copies this definition for another cache.
    #[must_use]
    pub fn for_cache(&self, name: CacheName) -> Self {
        Self { name, ..self.clone() }
    }

    /// Returns true if the two topologies replicate the same way.
    #[must_use]
    pub fn same_replication(&self, other: &Self) -> bool {
        self.mode == other.mode
            && self.synchronicity == other.synchronicity
            && self.owners == other.owners
            && self.segments == other.segments
    }
}

impl Display for CacheTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            ReplicationMode::None => write!(f, "{}: LOCAL", self.name),
            ReplicationMode::Distributed => write!(
                f,
                "{}: DISTRIBUTED_{} (owners={}, segments={})",
                self.name, self.synchronicity, self.owners, self.segments
            ),
            mode => write!(f, "{}: {}_{}", self.name, mode, self.synchronicity),
        }
    }
}

/// Container-wide settings carried alongside the cache definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// Whether the container joins a cluster.
    pub clustered: bool,
    /// Management pass-through flag.
    pub allow_duplicate_jmx_domains: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            clustered: false,
            allow_duplicate_jmx_domains: true,
        }
    }
}

/// The full set of cache definitions for one container.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheTopologies {
    /// Container-wide settings.
    pub global: GlobalSettings,
    definitions: BTreeMap<CacheName, CacheTopology>,
}

impl CacheTopologies {
    /// Creates an empty set with the given settings.
    #[must_use]
    pub fn new(global: GlobalSettings) -> Self {
        Self {
            global,
            definitions: BTreeMap::new(),
        }
    }

    /// Adds or replaces a definition.
    pub fn define(&mut self, topology: CacheTopology) {
        self.definitions.insert(topology.name, topology);
    }

    /// Returns the definition of a cache.
    #[must_use]
    pub fn get(&self, name: CacheName) -> Option<&CacheTopology> {
        self.definitions.get(&name)
    }

    /// Iterates over all definitions in name order.
    pub fn iter(&self) -> impl Iterator<Item = &CacheTopology> {
        self.definitions.values()
    }

    /// Returns the number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns true if nothing is defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
