//! # Configuration
//!
//! Polling cadence, device table layout and layout clear pacing.
//!
//! Every section has working defaults, so an empty configuration is valid.
//! Values can be overridden from `config/tag-provisioning.toml` and from
//! environment variables (see [`loader::ConfigLoader`]).
//!
//! ```rust,no_run
//! use tag_provisioning::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new().load()?;
//! println!("poll every {:?}", config.retry.poll_interval());
//! # Ok(())
//! # }
//! ```

pub mod loader;

pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Configuration sources could not be read or merged
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// Configuration file given explicitly does not exist
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },
}

impl ConfigurationError {
    /// Create an invalid value error
    pub fn invalid_value<F: Into<String>, V: ToString, C: Into<String>>(
        field: F,
        value: V,
        context: C,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            context: context.into(),
        }
    }
}

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
}

impl ProvisioningConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let retry = &self.retry;

        if retry.poll_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry.poll_interval_ms",
                retry.poll_interval_ms,
                "poll interval must be greater than 0",
            ));
        }

        for (field, value) in [
            ("retry.scan_timeout_seconds", retry.scan_timeout_seconds),
            (
                "retry.aggregation_timeout_seconds",
                retry.aggregation_timeout_seconds,
            ),
        ] {
            if value == 0 {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value,
                    "timeout must be greater than 0",
                ));
            }
            if retry.poll_interval() > Duration::from_secs(value) {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value,
                    format!(
                        "timeout must not be shorter than the poll interval ({} ms)",
                        retry.poll_interval_ms
                    ),
                ));
            }
        }

        Ok(())
    }
}

/// Bounded polling settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Pause between probes
    pub poll_interval_ms: u64,
    /// Scan, removal and channel checks
    pub scan_timeout_seconds: u64,
    /// Multi-scanner aggregation
    pub aggregation_timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3000,
            scan_timeout_seconds: 300,
            aggregation_timeout_seconds: 600,
        }
    }
}

impl RetryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_seconds)
    }

    pub fn aggregation_timeout(&self) -> Duration {
        Duration::from_secs(self.aggregation_timeout_seconds)
    }
}

/// Table and parameter ids on the managed device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub scan_channel_table: u32,
    pub scan_title_column: u32,
    pub scan_mode_column: u32,
    pub scan_urls_column: u32,
    pub layout_table: u32,
    /// `"0"` while the slot is free
    pub layout_occupancy_column: u32,
    /// Occupant of the slot, or `"Reserved"`
    pub layout_reservation_column: u32,
    pub layout_name_column: u32,
    /// Written by primary key to empty a slot
    pub layout_clear_parameter: u32,
    pub scan_request_parameter: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            scan_channel_table: 1310,
            scan_title_column: 13,
            scan_mode_column: 2,
            scan_urls_column: 14,
            layout_table: 10300,
            layout_occupancy_column: 10302,
            layout_reservation_column: 10303,
            layout_name_column: 10305,
            layout_clear_parameter: 10353,
            scan_request_parameter: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Pause between consecutive slot clear writes
    pub clear_pacing_ms: u64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            clear_pacing_ms: 1000,
        }
    }
}

impl LayoutConfig {
    pub fn clear_pacing(&self) -> Duration {
        Duration::from_millis(self.clear_pacing_ms)
    }
}
