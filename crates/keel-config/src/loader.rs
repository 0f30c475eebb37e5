//! Configuration loader with layered sources.

use crate::AppConfig;
use config::{Config, ConfigError, Environment, File};
use keel_core::KeelError;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable selecting the `config/{environment}.toml` layer.
pub const ENVIRONMENT_VAR: &str = "KEEL_ENVIRONMENT";

/// Loads [`AppConfig`] from layered sources.
///
/// Sources are applied in order, later ones overriding earlier ones:
/// 1. `{dir}/default.toml`
/// 2. `{dir}/{environment}.toml`
/// 3. `{dir}/local.toml` (not committed to version control)
/// 4. Environment variables such as `KEEL__DATABASE__URL`
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_dir: PathBuf,
    environment: String,
}

impl ConfigLoader {
    /// Creates a loader reading from `config_dir`.
    ///
    /// The environment name comes from `KEEL_ENVIRONMENT`, defaulting to
    /// `development`.
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        let environment =
            std::env::var(ENVIRONMENT_VAR).unwrap_or_else(|_| "development".to_string());
        Self {
            config_dir: config_dir.into(),
            environment,
        }
    }

    /// Creates a loader reading from `./config`.
    #[must_use]
    pub fn from_default_location() -> Self {
        Self::new("./config")
    }

    /// Overrides the environment name.
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Loads `.env`, merges every source and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`KeelError::Configuration`] if a source fails to parse or
    /// the merged configuration is invalid.
    pub fn load(&self) -> Result<AppConfig, KeelError> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file loaded: {}", e);
        }

        info!(environment = %self.environment, "Loading configuration");

        let mut builder = Config::builder();
        for layer in ["default", self.environment.as_str(), "local"] {
            let path = self.config_dir.join(format!("{layer}.toml"));
            if path.exists() {
                debug!(path = %path.display(), "Loading config layer");
                builder = builder.add_source(File::from(path.as_path()).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("KEEL")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut app_config: AppConfig = builder
            .build()
            .and_then(Config::try_deserialize)
            .map_err(config_error_to_keel_error)?;

        app_config.app.environment.clone_from(&self.environment);
        validate_config(&app_config)?;

        Ok(app_config)
    }

    /// Returns the directory this loader reads from.
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

/// Validates a merged configuration.
///
/// # Errors
///
/// Returns [`KeelError::Configuration`] naming the first invalid setting.
pub fn validate_config(config: &AppConfig) -> Result<(), KeelError> {
    if config.database.url.trim().is_empty() {
        return Err(KeelError::Configuration("database.url is required".to_string()));
    }

    let max = config.database.max_connections;
    if max == 0 || max > crate::DatabaseConfig::MAX_POOL_SIZE {
        return Err(KeelError::Configuration(format!(
            "database.max_connections must be between 1 and {}, got {max}",
            crate::DatabaseConfig::MAX_POOL_SIZE
        )));
    }
    if config.database.min_connections > max {
        return Err(KeelError::Configuration(format!(
            "database.min_connections ({}) exceeds max_connections ({max})",
            config.database.min_connections
        )));
    }

    if config.cache.user_ttl_secs == 0 {
        return Err(KeelError::Configuration(
            "cache.user_ttl_secs must be positive".to_string(),
        ));
    }

    if config.redis.enabled {
        if config.redis.url.trim().is_empty() {
            return Err(KeelError::Configuration(
                "redis.url is required when redis is enabled".to_string(),
            ));
        }
        if config.redis.pool_size == 0 {
            return Err(KeelError::Configuration(
                "redis.pool_size must be positive".to_string(),
            ));
        }
    }

    if config.observability.parsed_log_format().is_none() {
        return Err(KeelError::Configuration(format!(
            "observability.log_format must be 'pretty' or 'json', got '{}'",
            config.observability.log_format
        )));
    }

    if config.server.request_timeout_secs == 0 {
        warn!("server.request_timeout_secs is 0, only caller deadlines will apply");
    }

    Ok(())
}

fn config_error_to_keel_error(err: ConfigError) -> KeelError {
    KeelError::Configuration(err.to_string())
}
