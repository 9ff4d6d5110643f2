//! Construction-time configuration.
//!
//! Collaborators that load plugin or server configuration hand the store a
//! `StoreConfig`; the store itself never reads files on its own.

use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest accepted expiry period (ten years).
pub const MAX_EXPIRY_PERIOD_SECS: u64 = 10 * 365 * 24 * 3600;

fn period(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Read error: {0}")]
    ReadError(#[from] std::io::Error),

    /// Configuration is not valid JSON for `StoreConfig`.
    #[error("Invalid data: {0}")]
    InvalidData(#[from] serde_json::Error),

    /// A field holds an unusable value.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    /// Seconds after which an unrefreshed value is stale.
    pub expiry_period_secs: u64,

    /// Seconds after which an unrefreshed AIS target is stale.
    pub ais_expiry_period_secs: u64,

    /// Own-ship MMSI. Empty disables AIS self-filtering.
    pub own_mmsi: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            expiry_period_secs: 30,
            ais_expiry_period_secs: 1200,
            own_mmsi: String::new(),
        }
    }
}

impl StoreConfig {
    pub fn new(expiry_period_secs: u64, ais_expiry_period_secs: u64, own_mmsi: &str) -> Self {
        Self {
            expiry_period_secs,
            ais_expiry_period_secs,
            own_mmsi: own_mmsi.to_string(),
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.expiry_period_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "expiryPeriodSecs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.ais_expiry_period_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "aisExpiryPeriodSecs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.expiry_period_secs > MAX_EXPIRY_PERIOD_SECS {
            return Err(ConfigError::InvalidValue {
                field: "expiryPeriodSecs",
                reason: format!("must not exceed {}", MAX_EXPIRY_PERIOD_SECS),
            });
        }
        if self.ais_expiry_period_secs > MAX_EXPIRY_PERIOD_SECS {
            return Err(ConfigError::InvalidValue {
                field: "aisExpiryPeriodSecs",
                reason: format!("must not exceed {}", MAX_EXPIRY_PERIOD_SECS),
            });
        }
        if !self.own_mmsi.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::InvalidValue {
                field: "ownMmsi",
                reason: format!("{} is not numeric", self.own_mmsi),
            });
        }
        Ok(())
    }

    pub fn expiry_period(&self) -> Duration {
        period(self.expiry_period_secs)
    }

    pub fn ais_expiry_period(&self) -> Duration {
        period(self.ais_expiry_period_secs)
    }
}
