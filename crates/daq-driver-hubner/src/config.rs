//! Driver configuration using Figment.
//!
//! Values come from an optional TOML file, overridden by `GTR_`-prefixed
//! environment variables (for example `GTR_ADDRESS=192.168.1.20` or
//! `GTR_REQUEST_TIMEOUT_MS=2000`).
//!
//! ```toml
//! address = "192.168.1.20"
//! request_timeout_ms = 5000
//! connect_timeout_ms = 5000
//! log_level = "info"
//! ```

use crate::bridge::BridgeOptions;
use crate::error::{GtrError, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "GTR_";

/// Driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GtrConfig {
    /// Device address (host, `host:port` or full URL)
    #[serde(default)]
    pub address: Option<String>,
    /// Bound on one request/reply exchange in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Bound on establishing a connection in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GtrConfig {
    fn default() -> Self {
        Self {
            address: None,
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            log_level: default_log_level(),
        }
    }
}

impl GtrConfig {
    /// Load from environment variables only.
    pub fn load() -> Result<Self> {
        Self::figment(None).extract().map_err(GtrError::from)
    }

    /// Load from a TOML file merged with environment variables.
    ///
    /// A missing file is treated as empty.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::figment(Some(path.as_ref()))
            .extract()
            .map_err(GtrError::from)
    }

    fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(GtrConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(GtrError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.request_timeout_ms == 0 {
            return Err(GtrError::Configuration(
                "request_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(GtrError::Configuration(
                "connect_timeout_ms must be greater than 0".into(),
            ));
        }

        if let Some(address) = &self.address {
            crate::address::normalize_address(address)?;
        }

        Ok(())
    }

    /// Timing options for the bridge.
    #[must_use]
    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }
}
