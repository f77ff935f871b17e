//! Application assembly and lifecycle.

use crate::di::{build_session_module, session_store};
use crate::sweeper::SessionSweeper;
use std::future::Future;
use std::sync::Arc;
use tessera_cache::{CacheConnection, CacheManager, ExternalCacheResolver, InvalidationTransport};
use tessera_config::{AppConfig, ConfigValidator};
use tessera_core::{RealmId, TesseraError, TesseraResult};
use tessera_sessions::UserSessionStore;
use tracing::info;

/// Application builder for constructing the server.
pub struct AppBuilder {
    config: Option<AppConfig>,
    resolver: Option<Arc<dyn ExternalCacheResolver>>,
    transport: Option<Arc<dyn InvalidationTransport>>,
}

impl AppBuilder {
    /// Creates a new application builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: None,
            resolver: None,
            transport: None,
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the resolver for a container-managed cache container.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn ExternalCacheResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Sets the cluster transport. Required when the cache is clustered.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn InvalidationTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Starts the cache manager and assembles the application.
    ///
    /// Invalid configuration, a clustered cache without a transport and
    /// container lookup failures abort here.
    pub fn build(self) -> TesseraResult<App> {
        let config = self.config.unwrap_or_default();
        ConfigValidator::ensure_valid(&config)?;

        let mut manager = CacheManager::builder().scope(config.cache.scope());
        if let Some(resolver) = self.resolver {
            manager = manager.resolver(resolver);
        }
        if let Some(transport) = self.transport {
            manager = manager.transport(transport);
        }
        let cache_manager = manager.build();
        let connection = cache_manager.create()?;

        let module = build_session_module();
        let sessions = session_store(&module);

        let sweeper = Arc::new(SessionSweeper::new(
            Arc::clone(&sessions),
            config.sessions.sweep_interval(),
        ));
        for realm in &config.sessions.realms {
            sweeper.watch_realm(RealmId::new(realm.as_str()), config.sessions.limits());
        }

        info!(
            node = %connection.node_name(),
            container_managed = connection.is_container_managed(),
            clustered = connection.container().settings().clustered,
            "Application assembled"
        );

        Ok(App {
            config,
            cache_manager,
            connection,
            sessions,
            sweeper,
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running node: cache manager, session store, and sweeper.
pub struct App {
    config: AppConfig,
    cache_manager: CacheManager,
    connection: CacheConnection,
    sessions: Arc<dyn UserSessionStore>,
    sweeper: Arc<SessionSweeper>,
}

impl App {
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn cache_manager(&self) -> &CacheManager {
        &self.cache_manager
    }

    #[must_use]
    pub fn connection(&self) -> &CacheConnection {
        &self.connection
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<dyn UserSessionStore> {
        &self.sessions
    }

    #[must_use]
    pub fn sweeper(&self) -> &Arc<SessionSweeper> {
        &self.sweeper
    }

    /// Runs the sweeper until `shutdown` completes, then shuts down.
    pub async fn run_until<F>(&self, shutdown: F) -> TesseraResult<()>
    where
        F: Future<Output = ()>,
    {
        let sweeper = Arc::clone(&self.sweeper);
        let handle = tokio::spawn(async move { sweeper.run().await });

        shutdown.await;
        self.sweeper.stop();
        let swept = handle
            .await
            .map_err(|e| TesseraError::internal(format!("Session sweeper task failed: {e}")));

        self.shutdown();
        swept?
    }

    /// Closes the session store and the cache manager. Safe to call twice.
    pub fn shutdown(&self) {
        info!("Shutting down");
        self.sessions.close();
        self.cache_manager.close();
    }
}
