//! Cache manager lifecycle.
//!
//! The manager owns one cache container for the life of the process. The
//! container is either resolved from the host (when `cacheContainer` is set)
//! or started embedded from the scope configuration. Initialization happens on
//! the first [`CacheManager::create`] call and runs exactly once, however
//! many threads race on it.

use crate::builder::CacheConfigBuilder;
use crate::cache::NamedCache;
use crate::container::CacheContainer;
use crate::topology::{CacheName, CacheTopology};
use crate::transport::InvalidationTransport;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tessera_config::{keys, ConfigScope, MapScope};
use tessera_core::{TesseraError, TesseraResult};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Name given to containers started by the manager.
pub const EMBEDDED_CONTAINER_NAME: &str = "tessera";

/// Resolves a host-provisioned cache container by lookup name.
pub trait ExternalCacheResolver: Send + Sync {
    /// Returns the container bound under `lookup`.
    fn resolve(&self, lookup: &str) -> TesseraResult<Arc<CacheContainer>>;
}

/// Name-to-container registry for hosts that provision containers themselves.
#[derive(Default)]
pub struct ContainerRegistry {
    containers: RwLock<HashMap<String, Arc<CacheContainer>>>,
}

impl ContainerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a container under a lookup name, replacing any previous binding.
    pub fn bind(&self, lookup: impl Into<String>, container: Arc<CacheContainer>) {
        self.containers.write().insert(lookup.into(), container);
    }
}

impl ExternalCacheResolver for ContainerRegistry {
    fn resolve(&self, lookup: &str) -> TesseraResult<Arc<CacheContainer>> {
        self.containers
            .read()
            .get(lookup)
            .cloned()
            .ok_or_else(|| TesseraError::container_lookup(lookup, "no container bound under this name"))
    }
}

struct ConnectionState {
    container: Arc<CacheContainer>,
    container_managed: bool,
    caches: HashMap<CacheName, Arc<NamedCache>>,
}

/// Handle on an initialized cache container.
///
/// Cheap to clone. Cache lookups read an immutable map and take no lock.
#[derive(Clone)]
pub struct CacheConnection {
    state: Arc<ConnectionState>,
}

impl CacheConnection {
    /// Returns the named cache.
    pub fn get_cache(&self, name: CacheName) -> TesseraResult<Arc<NamedCache>> {
        if !self.state.container.is_running() {
            return Err(TesseraError::ContainerStopped(
                self.state.container.name().to_string(),
            ));
        }
        self.state
            .caches
            .get(&name)
            .cloned()
            .ok_or_else(|| TesseraError::UndefinedCache(name.to_string()))
    }

    /// The underlying container.
    #[must_use]
    pub fn container(&self) -> &Arc<CacheContainer> {
        &self.state.container
    }

    /// Returns true if the container was provisioned by the host.
    #[must_use]
    pub fn is_container_managed(&self) -> bool {
        self.state.container_managed
    }

    /// Name of the local node.
    #[must_use]
    pub fn node_name(&self) -> &str {
        self.state.container.node_name()
    }
}

/// Builder for [`CacheManager`].
#[derive(Default)]
pub struct CacheManagerBuilder {
    scope: Option<Arc<dyn ConfigScope>>,
    resolver: Option<Arc<dyn ExternalCacheResolver>>,
    transport: Option<Arc<dyn InvalidationTransport>>,
}

impl CacheManagerBuilder {
    /// Sets the configuration scope. Defaults to an empty scope.
    #[must_use]
    pub fn scope(mut self, scope: impl ConfigScope + 'static) -> Self {
        self.scope = Some(Arc::new(scope));
        self
    }

    /// Sets the resolver used in container-managed mode.
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn ExternalCacheResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Sets the cluster transport used in clustered embedded mode.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn InvalidationTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the manager. No container is created until the first `create`.
    #[must_use]
    pub fn build(self) -> CacheManager {
        CacheManager {
            scope: self.scope.unwrap_or_else(|| Arc::new(MapScope::new())),
            resolver: self.resolver,
            transport: self.transport,
            connection: OnceCell::new(),
            initializations: AtomicUsize::new(0),
        }
    }
}

/// Owns the process-wide cache container.
pub struct CacheManager {
    scope: Arc<dyn ConfigScope>,
    resolver: Option<Arc<dyn ExternalCacheResolver>>,
    transport: Option<Arc<dyn InvalidationTransport>>,
    connection: OnceCell<CacheConnection>,
    initializations: AtomicUsize,
}

impl CacheManager {
    /// Starts building a manager.
    #[must_use]
    pub fn builder() -> CacheManagerBuilder {
        CacheManagerBuilder::default()
    }

    /// Returns the shared connection, initializing the container on first use.
    ///
    /// A failed initialization is not cached; the next call retries.
    pub fn create(&self) -> TesseraResult<CacheConnection> {
        self.connection
            .get_or_try_init(|| self.initialize())
            .cloned()
    }

    /// Returns true if the container is provisioned by the host.
    #[must_use]
    pub fn is_container_managed(&self) -> bool {
        self.scope.get(keys::CACHE_CONTAINER).is_some()
    }

    /// Definition of a cache, once initialized.
    #[must_use]
    pub fn topology(&self, name: CacheName) -> Option<CacheTopology> {
        self.connection
            .get()
            .and_then(|connection| connection.container().cache_configuration(name))
    }

    /// The container, once initialized.
    #[must_use]
    pub fn container(&self) -> Option<Arc<CacheContainer>> {
        self.connection
            .get()
            .map(|connection| Arc::clone(connection.container()))
    }

    /// Number of times the container has been initialized.
    #[must_use]
    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::Acquire)
    }

    /// Stops an embedded container. Host-provisioned containers are left running.
    pub fn close(&self) {
        let Some(connection) = self.connection.get() else {
            return;
        };
        if connection.is_container_managed() {
            info!(
                container = %connection.container().name(),
                "Leaving container managed cache container running"
            );
        } else {
            connection.container().stop();
        }
    }

    fn initialize(&self) -> TesseraResult<CacheConnection> {
        let (container, container_managed) = match self.scope.get(keys::CACHE_CONTAINER) {
            Some(lookup) => (self.resolve_container(&lookup)?, true),
            None => (self.start_embedded()?, false),
        };

        ensure_offline_session_definition(&container);

        let mut caches = HashMap::new();
        for name in CacheName::ALL {
            if container.cache_configuration(name).is_some() {
                caches.insert(name, container.get_cache(name)?);
            } else {
                warn!(cache = %name, "Cache is not defined on the container");
            }
        }

        self.initializations.fetch_add(1, Ordering::AcqRel);
        info!(
            container = %container.name(),
            node = %container.node_name(),
            container_managed,
            caches = caches.len(),
            "Cache manager initialized"
        );

        Ok(CacheConnection {
            state: Arc::new(ConnectionState {
                container,
                container_managed,
                caches,
            }),
        })
    }

    fn resolve_container(&self, lookup: &str) -> TesseraResult<Arc<CacheContainer>> {
        let resolver = self.resolver.as_ref().ok_or_else(|| {
            TesseraError::container_lookup(lookup, "no external cache resolver configured")
        })?;
        let container = resolver.resolve(lookup).map_err(|err| match err {
            err @ TesseraError::ContainerLookup { .. } => err,
            other => TesseraError::container_lookup(lookup, other.to_string()),
        })?;
        info!(lookup = %lookup, "Using container managed cache container");
        Ok(container)
    }

    fn start_embedded(&self) -> TesseraResult<Arc<CacheContainer>> {
        let builder = CacheConfigBuilder::from_scope(self.scope.as_ref())?;
        if builder.is_clustered() && self.transport.is_none() {
            return Err(TesseraError::configuration(
                "Clustered cache requested but no cluster transport is configured",
            ));
        }

        let node_name = self.node_name();
        let topologies = builder.build();
        let transport = if builder.is_clustered() {
            self.transport.clone()
        } else {
            None
        };
        CacheContainer::embedded(EMBEDDED_CONTAINER_NAME, node_name, &topologies, transport)
    }

    fn node_name(&self) -> String {
        if let Some(name) = self.scope.get(keys::NODE_NAME) {
            return name;
        }
        if let Some(transport) = &self.transport {
            return transport.node_name().to_string();
        }
        let generated: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        format!("node-{}", generated)
    }
}

/// Defines the offline session cache from the session definition if the
/// container lacks it. Returns true if a definition was added.
pub fn ensure_offline_session_definition(container: &CacheContainer) -> bool {
    if container.cache_configuration(CacheName::OfflineSession).is_some() {
        return false;
    }
    let Some(session) = container.cache_configuration(CacheName::Session) else {
        return false;
    };
    let defined = container.define_configuration(session.for_cache(CacheName::OfflineSession));
    if defined {
        info!(
            container = %container.name(),
            "Defined offline session cache from session cache definition"
        );
    } else {
        debug!("Offline session cache was defined concurrently");
    }
    defined
}
