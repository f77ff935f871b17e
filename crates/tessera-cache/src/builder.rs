//! Translates scope configuration into cache topologies.

use crate::topology::{
    CacheName, CacheTopologies, CacheTopology, GlobalSettings, ReplicationMode, Synchronicity,
};
use std::str::FromStr;
use tessera_config::{
    keys, ConfigScope, DEFAULT_SESSIONS_MODE, DEFAULT_SESSIONS_OWNERS, DEFAULT_SESSIONS_SEGMENTS,
};
use tessera_core::{TesseraError, TesseraResult};
use tracing::debug;

/// Replication mode requested for the session caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionsMode {
    /// Full copy on every node.
    Replicated,
    /// Partitioned across owners.
    Distributed,
}

impl FromStr for SessionsMode {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("replicated") {
            Ok(Self::Replicated)
        } else if s.eq_ignore_ascii_case("distributed") {
            Ok(Self::Distributed)
        } else {
            Err(TesseraError::configuration(format!(
                "Invalid value for sessionsMode: {}",
                s
            )))
        }
    }
}

impl From<SessionsMode> for ReplicationMode {
    fn from(mode: SessionsMode) -> Self {
        match mode {
            SessionsMode::Replicated => Self::Replicated,
            SessionsMode::Distributed => Self::Distributed,
        }
    }
}

/// Parsed cache settings, ready to be turned into topologies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfigBuilder {
    clustered: bool,
    synchronicity: Synchronicity,
    allow_duplicate_jmx_domains: bool,
    sessions_mode: SessionsMode,
    owners: u32,
    segments: u32,
}

impl CacheConfigBuilder {
    /// Reads and validates all cache keys from a scope.
    pub fn from_scope(scope: &dyn ConfigScope) -> TesseraResult<Self> {
        let clustered = scope.get_bool(keys::CLUSTERED, false)?;
        let is_async = scope.get_bool(keys::ASYNC, true)?;
        let allow_duplicate_jmx_domains = scope.get_bool(keys::ALLOW_DUPLICATE_JMX_DOMAINS, true)?;
        let owners = scope.get_int(keys::SESSIONS_OWNERS, DEFAULT_SESSIONS_OWNERS)?;
        let segments = scope.get_int(keys::SESSIONS_SEGMENTS, DEFAULT_SESSIONS_SEGMENTS)?;

        // Session settings are only read in a cluster; counts must still parse.
        let (sessions_mode, owners, segments) = if clustered {
            (
                scope
                    .get_or(keys::SESSIONS_MODE, DEFAULT_SESSIONS_MODE)
                    .trim()
                    .parse::<SessionsMode>()?,
                positive(keys::SESSIONS_OWNERS, owners)?,
                positive(keys::SESSIONS_SEGMENTS, segments)?,
            )
        } else {
            (SessionsMode::Distributed, 1, 1)
        };

        Ok(Self {
            clustered,
            synchronicity: Synchronicity::from_async_flag(is_async),
            allow_duplicate_jmx_domains,
            sessions_mode,
            owners,
            segments,
        })
    }

    /// Returns true if clustered mode was requested.
    #[must_use]
    pub const fn is_clustered(&self) -> bool {
        self.clustered
    }

    /// Builds the topology of the realm or user cache.
    #[must_use]
    pub fn invalidation_topology(&self, name: CacheName) -> CacheTopology {
        if !self.clustered {
            return CacheTopology::local(name);
        }
        CacheTopology {
            name,
            mode: ReplicationMode::Invalidation,
            synchronicity: self.synchronicity,
            owners: 1,
            segments: 1,
        }
    }

    /// Builds the topology shared by the session-like caches.
    #[must_use]
    pub fn session_topology(&self, name: CacheName) -> CacheTopology {
        if !self.clustered {
            return CacheTopology::local(name);
        }
        let mode = ReplicationMode::from(self.sessions_mode);
        let (owners, segments) = match mode {
            ReplicationMode::Distributed => (self.owners, self.segments),
            _ => (1, 1),
        };
        CacheTopology {
            name,
            mode,
            synchronicity: self.synchronicity,
            owners,
            segments,
        }
    }

    /// Builds the definitions of all five caches.
    #[must_use]
    pub fn build(&self) -> CacheTopologies {
        let mut topologies = CacheTopologies::new(GlobalSettings {
            clustered: self.clustered,
            allow_duplicate_jmx_domains: self.allow_duplicate_jmx_domains,
        });

        topologies.define(self.invalidation_topology(CacheName::Realm));
        topologies.define(self.invalidation_topology(CacheName::User));

        let session = self.session_topology(CacheName::Session);
        topologies.define(session.for_cache(CacheName::OfflineSession));
        topologies.define(session.for_cache(CacheName::LoginFailure));
        topologies.define(session);

        for topology in topologies.iter() {
            debug!(topology = %topology, "Cache topology defined");
        }
        topologies
    }
}

fn positive(key: &str, value: i64) -> TesseraResult<u32> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| {
            TesseraError::configuration(format!("'{}' must be a positive integer, got {}", key, value))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_config::MapScope;

    fn build(scope: &MapScope) -> CacheTopologies {
        CacheConfigBuilder::from_scope(scope).unwrap().build()
    }

    #[test]
    fn test_defaults_are_local() {
        let topologies = build(&MapScope::new());

        assert_eq!(topologies.len(), 5);
        assert!(!topologies.global.clustered);
        assert!(topologies.global.allow_duplicate_jmx_domains);
        for topology in topologies.iter() {
            assert_eq!(topology.mode, ReplicationMode::None);
        }
    }

    #[test]
    fn test_not_clustered_ignores_sessions_mode() {
        let scope = MapScope::new()
            .with(keys::SESSIONS_MODE, "replicated")
            .with(keys::SESSIONS_OWNERS, 0);
        let topologies = build(&scope);

        assert_eq!(topologies.get(CacheName::Realm).unwrap().mode, ReplicationMode::None);
        assert_eq!(topologies.get(CacheName::Session).unwrap().mode, ReplicationMode::None);
    }

    #[test]
    fn test_clustered_replicated_sync() {
        let scope = MapScope::new()
            .with(keys::CLUSTERED, true)
            .with(keys::ASYNC, false)
            .with(keys::SESSIONS_MODE, "Replicated");
        let topologies = build(&scope);

        for name in [CacheName::Session, CacheName::OfflineSession, CacheName::LoginFailure] {
            let topology = topologies.get(name).unwrap();
            assert_eq!(topology.mode, ReplicationMode::Replicated);
            assert_eq!(topology.synchronicity, Synchronicity::Sync);
        }
        let user = topologies.get(CacheName::User).unwrap();
        assert_eq!(user.mode, ReplicationMode::Invalidation);
        assert_eq!(user.synchronicity, Synchronicity::Sync);
    }

    #[test]
    fn test_clustered_distributed_counts() {
        let scope = MapScope::new()
            .with(keys::CLUSTERED, true)
            .with(keys::SESSIONS_OWNERS, 3)
            .with(keys::SESSIONS_SEGMENTS, 120);
        let topologies = build(&scope);

        let session = topologies.get(CacheName::Session).unwrap();
        assert_eq!(session.mode, ReplicationMode::Distributed);
        assert_eq!(session.synchronicity, Synchronicity::Async);
        assert_eq!((session.owners, session.segments), (3, 120));
        assert!(topologies
            .get(CacheName::OfflineSession)
            .unwrap()
            .same_replication(session));
    }

    #[test]
    fn test_invalid_sessions_mode_is_fatal_when_clustered() {
        let scope = MapScope::new()
            .with(keys::CLUSTERED, true)
            .with(keys::SESSIONS_MODE, "scattered");
        let err = CacheConfigBuilder::from_scope(&scope).unwrap_err();

        assert!(err.is_fatal());
        assert!(err.to_string().contains("Invalid value for sessionsMode"));
    }

    #[test]
    fn test_invalid_sessions_mode_ignored_when_local() {
        let scope = MapScope::new().with(keys::SESSIONS_MODE, "bogus");
        let topologies = build(&scope);

        for name in [CacheName::Realm, CacheName::Session, CacheName::OfflineSession] {
            assert_eq!(topologies.get(name).unwrap().mode, ReplicationMode::None);
        }
    }

    #[test]
    fn test_non_positive_owners_when_clustered() {
        let scope = MapScope::new()
            .with(keys::CLUSTERED, true)
            .with(keys::SESSIONS_OWNERS, -1);
        assert!(CacheConfigBuilder::from_scope(&scope).unwrap_err().is_fatal());
    }

    #[test]
    fn test_unparsable_flag_is_fatal() {
        let scope = MapScope::new().with(keys::CLUSTERED, "yes");
        assert!(CacheConfigBuilder::from_scope(&scope).unwrap_err().is_fatal());
    }
}
