//! Configuration Loader
//!
//! Layers built-in defaults, an optional configuration file with an optional
//! per-environment overlay, and `WORKCELL_`-prefixed environment variables.

use super::error::{ConfigResult, ConfigurationError};
use super::WorkcellConfig;
use crate::constants::system::CONFIG_ENV_PREFIX;
use crate::logging::get_environment;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Environment variable naming a configuration file for [`ConfigManager::load`]
pub const CONFIG_PATH_ENV: &str = "WORKCELL_CONFIG_PATH";

/// Loaded, validated configuration plus the environment it was resolved for
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: WorkcellConfig,
    environment: String,
    source_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection.
    ///
    /// Reads the file named by `WORKCELL_CONFIG_PATH` when set, otherwise only
    /// defaults and environment variables.
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let environment = get_environment();
        let path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        Self::load_with_env(path.as_deref(), &environment)
    }

    /// Load configuration from an explicit file, which must exist
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = get_environment();
        Self::load_with_env(Some(path.as_ref()), &environment)
    }

    /// Load configuration for an explicit environment.
    ///
    /// Useful for tests that must not depend on the process environment name.
    pub fn load_with_env(
        path: Option<&Path>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigurationError::config_file_not_found(path));
            }
        }

        debug!(
            environment = %environment,
            path = ?path,
            "Loading workcell configuration"
        );

        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&WorkcellConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
            if let Some(overlay) = environment_overlay_path(path, environment) {
                debug!(overlay = %overlay.display(), "Checking for environment overlay");
                builder = builder.add_source(config::File::from(overlay).required(false));
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix(CONFIG_ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: WorkcellConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        crate::log_config!(info, "Configuration loaded successfully",
            environment: environment,
            scheduler: config.scheduler.kind,
            tick_interval_ms: config.engine.tick_interval_ms,
            capacity_aware: config.transfer.capacity_aware
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            source_path: path.map(Path::to_path_buf),
        }))
    }

    /// Wrap an already-built configuration after validating it
    pub fn from_config(config: WorkcellConfig, environment: &str) -> ConfigResult<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            source_path: None,
        }))
    }

    pub fn config(&self) -> &WorkcellConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }
}

/// `workcell.toml` + `test` -> `workcell.test.toml`, next to the base file
fn environment_overlay_path(path: &Path, environment: &str) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    let file_name = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{stem}.{environment}.{ext}"),
        None => format!("{stem}.{environment}"),
    };
    Some(path.with_file_name(file_name))
}
