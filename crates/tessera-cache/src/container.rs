//! Cache container: cache definitions, live caches and cluster membership.

use crate::cache::NamedCache;
use crate::topology::{CacheName, CacheTopologies, CacheTopology, GlobalSettings};
use crate::transport::{
    InvalidationKind, InvalidationListener, InvalidationMessage, InvalidationTransport,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tessera_core::{TesseraError, TesseraResult};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Last message seen from one peer incarnation.
#[derive(Debug, Clone, Copy)]
struct InboundCursor {
    epoch: Uuid,
    sequence: u64,
}

/// Holds cache definitions and the caches created from them.
///
/// A container is either started by the cache manager (embedded) or
/// provisioned by the host and resolved by name (container-managed).
pub struct CacheContainer {
    name: String,
    node_name: String,
    settings: GlobalSettings,
    definitions: RwLock<HashMap<CacheName, CacheTopology>>,
    caches: RwLock<HashMap<CacheName, Arc<NamedCache>>>,
    running: AtomicBool,
    transport: Option<Arc<dyn InvalidationTransport>>,
    epoch: Uuid,
    outbound_sequence: Mutex<u64>,
    inbound: Mutex<HashMap<String, InboundCursor>>,
}

impl std::fmt::Debug for CacheContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheContainer")
            .field("name", &self.name)
            .field("node_name", &self.node_name)
            .field("settings", &self.settings)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl CacheContainer {
    /// Creates an empty running container.
    ///
    /// A clustered container needs a transport; the transport's node name
    /// takes precedence over `node_name`.
    pub fn new(
        name: impl Into<String>,
        node_name: impl Into<String>,
        settings: GlobalSettings,
        transport: Option<Arc<dyn InvalidationTransport>>,
    ) -> TesseraResult<Arc<Self>> {
        let name = name.into();
        if settings.clustered && transport.is_none() {
            return Err(TesseraError::configuration(format!(
                "Cache container '{}' is clustered but no transport is configured",
                name
            )));
        }

        let mut node_name = node_name.into();
        if let Some(transport) = &transport {
            if transport.node_name() != node_name {
                warn!(
                    configured = %node_name,
                    transport = %transport.node_name(),
                    "Node name differs from transport, using transport name"
                );
                node_name = transport.node_name().to_string();
            }
        }

        let container = Arc::new(Self {
            name,
            node_name,
            settings,
            definitions: RwLock::new(HashMap::new()),
            caches: RwLock::new(HashMap::new()),
            running: AtomicBool::new(true),
            transport,
            epoch: Uuid::new_v4(),
            outbound_sequence: Mutex::new(0),
            inbound: Mutex::new(HashMap::new()),
        });

        if let Some(transport) = &container.transport {
            let listener: Arc<dyn InvalidationListener> = container.clone();
            transport.register(Arc::downgrade(&listener));
        }

        info!(
            container = %container.name,
            node = %container.node_name,
            clustered = container.settings.clustered,
            allow_duplicate_jmx_domains = container.settings.allow_duplicate_jmx_domains,
            "Cache container started"
        );
        Ok(container)
    }

    /// Creates a container with every topology of the set defined.
    pub fn embedded(
        name: impl Into<String>,
        node_name: impl Into<String>,
        topologies: &CacheTopologies,
        transport: Option<Arc<dyn InvalidationTransport>>,
    ) -> TesseraResult<Arc<Self>> {
        let container = Self::new(name, node_name, topologies.global.clone(), transport)?;
        for topology in topologies.iter() {
            container.define_configuration(topology.clone());
        }
        Ok(container)
    }

    /// Container name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the local node.
    #[must_use]
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Container-wide settings.
    #[must_use]
    pub fn settings(&self) -> &GlobalSettings {
        &self.settings
    }

    /// Defines a cache unless a definition already exists.
    ///
    /// Returns false, leaving the existing definition untouched, if the name
    /// was already defined.
    pub fn define_configuration(&self, topology: CacheTopology) -> bool {
        let mut definitions = self.definitions.write();
        if definitions.contains_key(&topology.name) {
            debug!(cache = %topology.name, "Cache already defined, keeping existing definition");
            return false;
        }
        debug!(topology = %topology, "Defining cache");
        definitions.insert(topology.name, topology);
        true
    }

    /// Returns the definition of a cache.
    #[must_use]
    pub fn cache_configuration(&self, name: CacheName) -> Option<CacheTopology> {
        self.definitions.read().get(&name).cloned()
    }

    /// Names of all defined caches.
    #[must_use]
    pub fn defined_caches(&self) -> Vec<CacheName> {
        let mut names: Vec<_> = self.definitions.read().keys().copied().collect();
        names.sort();
        names
    }

    /// Returns the cache with the given name, creating it on first use.
    pub fn get_cache(&self, name: CacheName) -> TesseraResult<Arc<NamedCache>> {
        if !self.is_running() {
            return Err(TesseraError::ContainerStopped(self.name.clone()));
        }
        if let Some(cache) = self.caches.read().get(&name) {
            return Ok(Arc::clone(cache));
        }

        let topology = self
            .cache_configuration(name)
            .ok_or_else(|| TesseraError::UndefinedCache(name.to_string()))?;
        let mut caches = self.caches.write();
        let cache = caches
            .entry(name)
            .or_insert_with(|| Arc::new(NamedCache::new(topology)));
        Ok(Arc::clone(cache))
    }

    /// Sends an invalidation to peers if the cache is clustered.
    pub fn propagate(&self, cache: CacheName, kind: InvalidationKind) {
        let Some(transport) = &self.transport else {
            return;
        };
        let Some(topology) = self.cache_configuration(cache) else {
            return;
        };
        if !topology.mode.is_clustered() {
            return;
        }

        // Held across the broadcast so sequence order equals send order.
        let mut sequence = self.outbound_sequence.lock();
        *sequence += 1;
        let message = InvalidationMessage {
            cache,
            origin: self.node_name.clone(),
            epoch: self.epoch,
            sequence: *sequence,
            synchronicity: topology.synchronicity,
            kind,
        };
        transport.broadcast(&message);
    }

    /// Members of the cluster, or just this node when not clustered.
    #[must_use]
    pub fn members(&self) -> Vec<String> {
        match &self.transport {
            Some(transport) => transport.members(),
            None => vec![self.node_name.clone()],
        }
    }

    /// Returns true until [`stop`](Self::stop) is called.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stops the container and drops all cached data.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        let caches: Vec<_> = self.caches.write().drain().map(|(_, cache)| cache).collect();
        for cache in caches {
            cache.clear();
        }
        info!(container = %self.name, node = %self.node_name, "Cache container stopped");
    }
}

impl InvalidationListener for CacheContainer {
    fn on_invalidation(&self, message: &InvalidationMessage) {
        if message.origin == self.node_name || !self.is_running() {
            return;
        }

        if !self.accept(message) {
            return;
        }

        let Some(cache) = self.caches.read().get(&message.cache).cloned() else {
            return;
        };
        match &message.kind {
            InvalidationKind::Entity { id } => {
                cache.remove(id);
            }
            InvalidationKind::Realm { realm_id } => {
                cache.invalidate_realm(realm_id);
            }
            InvalidationKind::Clear => cache.clear(),
        }
        debug!(
            cache = %message.cache,
            origin = %message.origin,
            sequence = message.sequence,
            "Applied remote invalidation"
        );
    }

    fn on_member_left(&self, node_name: &str) {
        if self.inbound.lock().remove(node_name).is_some() {
            debug!(node = %node_name, "Forgot sequence of departed member");
        }
    }
}

impl CacheContainer {
    /// Records the message and returns false if it was already seen.
    ///
    /// A new epoch from a known origin restarts its sequence. Messages from
    /// a superseded epoch are applied too, since extra invalidation only
    /// costs a reload.
    fn accept(&self, message: &InvalidationMessage) -> bool {
        let mut inbound = self.inbound.lock();
        let cursor = inbound
            .entry(message.origin.clone())
            .or_insert(InboundCursor {
                epoch: message.epoch,
                sequence: 0,
            });
        if cursor.epoch != message.epoch {
            debug!(
                origin = %message.origin,
                epoch = %message.epoch,
                "Peer restarted, resetting sequence"
            );
            *cursor = InboundCursor {
                epoch: message.epoch,
                sequence: 0,
            };
        }
        if message.sequence <= cursor.sequence {
            debug!(
                origin = %message.origin,
                sequence = message.sequence,
                last = cursor.sequence,
                "Dropping duplicate invalidation"
            );
            return false;
        }
        cursor.sequence = message.sequence;
        true
    }

    /// Number of peers with a recorded sequence.
    #[must_use]
    pub fn tracked_origins(&self) -> usize {
        self.inbound.lock().len()
    }
}
