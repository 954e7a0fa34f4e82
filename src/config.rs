//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Only `[device]` is required; every other section falls back to its
//! defaults when omitted.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::assist::{AssistConfig, AssistSettings};
use crate::bridge::BridgeSettings;
use crate::controller::device::DeviceIdentity;
use crate::controller::state::RemovalPolicy;
use crate::error::{BridgeError, Result};
use crate::report::encoder::OutputModel;
use crate::report::protocol::ReportLayout;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub device: DeviceConfig,

    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub assist: AssistSettings,

    #[serde(default)]
    pub hotplug: HotplugConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Physical controller selection
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    pub vendor_id: u16,
    pub product_id: u16,

    /// Instance path, required only to tell identical controllers apart
    #[serde(default)]
    pub path: Option<String>,

    /// Virtual controller model; omitted picks it from the vendor
    #[serde(default)]
    pub output: Option<OutputModel>,

    /// Report layout; omitted picks it from the vendor
    #[serde(default)]
    pub layout: Option<ReportLayout>,
}

/// Emission loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    #[serde(default = "default_period_us")]
    pub period_us: u64,

    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    #[serde(default)]
    pub on_removal: RemovalPolicy,
}

/// Hot-plug polling configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HotplugConfig {
    #[serde(default = "default_hotplug_interval_ms")]
    pub interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily-rotated log files; console only when unset
    #[serde(default)]
    pub log_dir: Option<String>,
}

// Default value functions
fn default_period_us() -> u64 { 2000 }
fn default_stop_timeout_ms() -> u64 { 100 }

fn default_hotplug_interval_ms() -> u64 { 1000 }

fn default_log_level() -> String { "info".to_string() }

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            period_us: default_period_us(),
            stop_timeout_ms: default_stop_timeout_ms(),
            on_removal: RemovalPolicy::default(),
        }
    }
}

impl Default for HotplugConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_hotplug_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

fn invalid(msg: impl Into<String>) -> BridgeError {
    BridgeError::ConfigInvalid(msg.into())
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use pad_bridge::config::Config;
    ///
    /// let config = Config::load("config/pad-bridge.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` if any configuration value is out of range
    fn validate(&self) -> Result<()> {
        if self.device.path.as_deref().is_some_and(str::is_empty) {
            return Err(invalid("device path cannot be empty when set"));
        }

        if !(250..=100_000).contains(&self.bridge.period_us) {
            return Err(invalid("period_us must be between 250 and 100000"));
        }

        if !(1..=5000).contains(&self.bridge.stop_timeout_ms) {
            return Err(invalid("stop_timeout_ms must be between 1 and 5000"));
        }

        if !(10..=60_000).contains(&self.hotplug.interval_ms) {
            return Err(invalid("hotplug interval_ms must be between 10 and 60000"));
        }

        if self.logging.level.trim().is_empty() {
            return Err(invalid("logging level cannot be empty"));
        }

        if self.logging.log_dir.as_deref().is_some_and(str::is_empty) {
            return Err(invalid("log_dir cannot be empty when set"));
        }

        AssistConfig::from_settings(&self.assist)?;

        Ok(())
    }

    /// Requested device identity
    pub fn identity(&self) -> DeviceIdentity {
        let identity = DeviceIdentity::new(self.device.vendor_id, self.device.product_id);
        match &self.device.path {
            Some(path) => identity.with_path(path.clone()),
            None => identity,
        }
    }

    /// Bridge parameters
    pub fn bridge_settings(&self) -> BridgeSettings {
        BridgeSettings {
            identity: self.identity(),
            layout: self.device.layout,
            model: self.device.output,
            period: Duration::from_micros(self.bridge.period_us),
            stop_timeout: Duration::from_millis(self.bridge.stop_timeout_ms),
            removal_policy: self.bridge.on_removal,
        }
    }

    /// Validated assist configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` if the assist section violates an invariant
    pub fn assist_config(&self) -> Result<AssistConfig> {
        AssistConfig::from_settings(&self.assist)
    }

    pub fn hotplug_interval(&self) -> Duration {
        Duration::from_millis(self.hotplug.interval_ms)
    }
}
