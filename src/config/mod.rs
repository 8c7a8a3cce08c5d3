//! Configuration management module for the device plugin.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Environment variable overrides
//! - Configuration file support
//! - Component-wise validation
mod monitoring;
mod plugin;
mod supervisor;
pub use monitoring::*;
pub use plugin::*;
pub use supervisor::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Prefix of environment variables overriding configuration values,
/// e.g. `NIC_PLUGIN__PLUGIN__TOTAL_DEVICES=64`
pub(crate) const ENV_PREFIX: &str = "NIC_PLUGIN";

/// Main configuration container for the device plugin
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PluginConfig {
    /// Resource advertisement, device inventory and socket layout
    #[serde(default)]
    pub plugin: PluginSettings,
    /// Serve loop crash protection
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    /// Prometheus endpoint
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    /// Log output
    #[serde(default)]
    pub log: LogConfig,
}

impl PluginConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Callers MUST call `validate()` before using the configuration.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFIG_PATH", "config/plugin.toml");
    /// std::env::set_var("NIC_PLUGIN__PLUGIN__TOTAL_DEVICES", "64");
    /// let cfg = PluginConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    pub fn validate(self) -> Result<Self> {
        self.plugin.validate()?;
        self.supervisor.validate()?;
        self.monitoring.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
