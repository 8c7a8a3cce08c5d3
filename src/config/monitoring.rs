use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::Error;
use crate::Result;

/// Prometheus endpoint serving `GET /metrics`
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitoringConfig {
    #[serde(default = "default_prometheus_enabled")]
    pub prometheus_enabled: bool,

    /// Listen port on all interfaces
    #[serde(default = "default_prometheus_port")]
    pub prometheus_port: u16,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            prometheus_enabled: default_prometheus_enabled(),
            prometheus_port: default_prometheus_port(),
        }
    }
}

impl MonitoringConfig {
    /// The metrics port only matters when the endpoint is enabled; it must
    /// then be an unprivileged port nobody else listens on.
    pub fn validate(&self) -> Result<()> {
        if !self.prometheus_enabled {
            if self.prometheus_port != default_prometheus_port() {
                warn!(
                    "prometheus_port {} ignored: metrics endpoint is disabled",
                    self.prometheus_port
                );
            }
            return Ok(());
        }

        match self.prometheus_port {
            0 => Err(invalid_port(0, "is not a listen port")),
            port if port < 1024 => Err(invalid_port(port, "needs root to bind")),
            port => ensure_port_free(port),
        }
    }
}

fn invalid_port(
    port: u16,
    reason: &str,
) -> Error {
    Error::Config(ConfigError::Message(format!("prometheus_port {port} {reason}")))
}

#[cfg(not(test))]
fn ensure_port_free(port: u16) -> Result<()> {
    std::net::TcpListener::bind(("0.0.0.0", port))
        .map(drop)
        .map_err(|e| invalid_port(port, &format!("is unavailable: {e}")))
}

// Tests share the host's ports.
#[cfg(test)]
fn ensure_port_free(_port: u16) -> Result<()> {
    Ok(())
}

fn default_prometheus_enabled() -> bool {
    false
}

fn default_prometheus_port() -> u16 {
    9100
}

/// Log output destination
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LogConfig {
    /// Directory for `nic-device-plugin.log`; logs go to stdout when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}
