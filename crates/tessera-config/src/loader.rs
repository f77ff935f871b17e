//! Configuration loader with layered sources.

use crate::{AppConfig, ConfigValidator};
use config::{Config, ConfigError, Environment, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_core::TesseraError;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Prefix of environment overrides, e.g. `TESSERA__CACHE__CLUSTERED=true`.
pub const ENV_PREFIX: &str = "TESSERA";

/// Environment variable selecting the per-environment file.
pub const ENVIRONMENT_VAR: &str = "TESSERA_ENVIRONMENT";

/// Configuration loader with runtime refresh support.
///
/// Sources, later ones winning:
/// 1. `{dir}/default.toml`
/// 2. `{dir}/{environment}.toml`, environment from `TESSERA_ENVIRONMENT`
///    (default `development`)
/// 3. `{dir}/local.toml`, for uncommitted overrides
/// 4. `TESSERA__SECTION__KEY` environment variables
///
/// Missing files are skipped. The merged result is validated before it is
/// accepted, on first load and on every reload.
#[derive(Clone)]
pub struct ConfigLoader {
    config: Arc<RwLock<AppConfig>>,
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// Loads and validates configuration from `config_dir`.
    pub fn new(config_dir: impl AsRef<Path>) -> Result<Self, TesseraError> {
        let config_dir = config_dir.as_ref().to_path_buf();
        let config = Self::load_config(&config_dir)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_dir,
        })
    }

    /// Loads configuration from `./config`.
    pub fn from_default_location() -> Result<Self, TesseraError> {
        Self::new("./config")
    }

    /// Returns the current configuration.
    pub async fn get(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    /// Directory the files are read from.
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Reloads the configuration from disk. On error the previous
    /// configuration stays in place.
    ///
    /// Cache topologies are fixed once the cache manager has started; a reload
    /// only affects settings read afterwards (sweep interval, logging).
    pub async fn reload(&self) -> Result<(), TesseraError> {
        let fresh = Self::load_config(&self.config_dir)?;
        *self.config.write().await = fresh;
        info!(dir = %self.config_dir.display(), "Configuration reloaded");
        Ok(())
    }

    fn load_config(config_dir: &Path) -> Result<AppConfig, TesseraError> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file loaded: {}", e);
        }

        let environment =
            std::env::var(ENVIRONMENT_VAR).unwrap_or_else(|_| "development".to_string());
        info!(environment = %environment, dir = %config_dir.display(), "Loading configuration");

        let mut builder = Config::builder();
        for layer in ["default", environment.as_str(), "local"] {
            let path = config_dir.join(format!("{layer}.toml"));
            if path.exists() {
                debug!(path = %path.display(), "Adding configuration file");
                builder = builder.add_source(File::from(path).required(false));
            }
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let app_config: AppConfig = builder
            .build()
            .and_then(Config::try_deserialize)
            .map_err(config_error_to_tessera_error)?;

        ConfigValidator::ensure_valid(&app_config)?;

        Ok(app_config)
    }

    /// Gets a specific configuration value by key path.
    pub async fn get_value<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let config = self.config.read().await;
        let json = serde_json::to_value(&*config).ok()?;

        let mut current = &json;
        for part in key.split('.') {
            current = current.get(part)?;
        }

        serde_json::from_value(current.clone()).ok()
    }
}

fn config_error_to_tessera_error(err: ConfigError) -> TesseraError {
    TesseraError::Configuration(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_loads_defaults_from_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path()).unwrap();
        let config = loader.get().await;

        assert!(!config.cache.clustered);
        assert_eq!(config.cache.sessions_mode, "distributed");
    }

    #[tokio::test]
    async fn test_loads_cache_section_from_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            r#"
[cache]
clustered = true
async = false
sessions_mode = "replicated"
sessions_owners = 3
node_name = "node-a"
"#,
        )
        .unwrap();

        let loader = ConfigLoader::new(dir.path()).unwrap();
        let config = loader.get().await;

        assert!(config.cache.clustered);
        assert!(!config.cache.async_replication);
        assert_eq!(config.cache.sessions_mode, "replicated");
        assert_eq!(config.cache.sessions_owners, 3);
        assert_eq!(config.cache.sessions_segments, 60);
        assert_eq!(config.cache.node_name.as_deref(), Some("node-a"));

        let mode: Option<String> = loader.get_value("cache.sessions_mode").await;
        assert_eq!(mode.as_deref(), Some("replicated"));
    }

    #[tokio::test]
    async fn test_invalid_sessions_mode_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            "[cache]\nclustered = true\nsessions_mode = \"sharded\"\n",
        )
        .unwrap();

        let err = ConfigLoader::new(dir.path()).err().unwrap();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("sessionsMode"));
    }

    #[tokio::test]
    async fn test_reload_picks_up_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.toml");
        fs::write(&path, "[sessions]\nsweep_interval_secs = 60\n").unwrap();

        let loader = ConfigLoader::new(dir.path()).unwrap();
        assert_eq!(loader.get().await.sessions.sweep_interval_secs, 60);

        fs::write(&path, "[sessions]\nsweep_interval_secs = 120\n").unwrap();
        loader.reload().await.unwrap();
        assert_eq!(loader.get().await.sessions.sweep_interval_secs, 120);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.toml");
        fs::write(&path, "[cache]\nclustered = true\nsessions_mode = \"replicated\"\n").unwrap();
        let loader = ConfigLoader::new(dir.path()).unwrap();

        fs::write(&path, "[cache]\nclustered = true\nsessions_mode = \"scattered\"\n").unwrap();
        assert!(loader.reload().await.is_err());
        assert_eq!(loader.get().await.cache.sessions_mode, "replicated");
        assert_eq!(loader.config_dir(), dir.path());
    }
}
