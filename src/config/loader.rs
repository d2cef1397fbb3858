//! Configuration Loader
//!
//! Layers configuration sources with the `config` crate: built-in defaults,
//! then an optional TOML file, then environment variables.

use super::{ConfigurationError, ProvisioningConfig};
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default location of the configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/tag-provisioning.toml";

/// Prefix of environment overrides, e.g. `TAG_PROVISIONING__RETRY__POLL_INTERVAL_MS`
pub const ENV_PREFIX: &str = "TAG_PROVISIONING";

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: PathBuf,
    file_required: bool,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Defaults, optional `config/tag-provisioning.toml`, environment overrides
    pub fn new() -> Self {
        Self {
            file: PathBuf::from(DEFAULT_CONFIG_PATH),
            file_required: false,
            env_prefix: Some(ENV_PREFIX.to_string()),
        }
    }

    /// Load from an explicit file, which must exist
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = path.as_ref().to_path_buf();
        self.file_required = true;
        self
    }

    /// Skip environment overrides
    pub fn without_environment(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    pub fn load(&self) -> Result<ProvisioningConfig, ConfigurationError> {
        if self.file_required && !self.file.exists() {
            return Err(ConfigurationError::FileNotFound(
                self.file.display().to_string(),
            ));
        }

        debug!(
            file = %self.file.display(),
            env_prefix = ?self.env_prefix,
            "Loading provisioning configuration"
        );

        let mut builder = Config::builder()
            .add_source(Config::try_from(&ProvisioningConfig::default())?)
            .add_source(File::from(self.file.clone()).required(self.file_required));

        if let Some(prefix) = &self.env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: ProvisioningConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        info!(
            poll_interval_ms = config.retry.poll_interval_ms,
            scan_timeout_seconds = config.retry.scan_timeout_seconds,
            aggregation_timeout_seconds = config.retry.aggregation_timeout_seconds,
            "✅ Configuration loaded successfully"
        );

        Ok(config)
    }
}
