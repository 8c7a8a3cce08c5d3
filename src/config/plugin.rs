use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_ALLOCATION_ENV;
use crate::constants::DEFAULT_DEVICE_DIR;
use crate::constants::DEFAULT_DIAL_TIMEOUT_IN_MS;
use crate::constants::DEFAULT_KUBELET_SOCKET;
use crate::constants::DEFAULT_PLUGIN_DIR;
use crate::constants::DEFAULT_PLUGIN_SOCKET;
use crate::constants::DEFAULT_RESOURCE_NAME;
use crate::constants::DEFAULT_TOTAL_DEVICES;
use crate::Error;
use crate::Result;

/// Device plugin identity, inventory and socket layout
///
/// # Defaults
/// Field-level defaults use helper functions prefixed with `default_`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PluginSettings {
    /// Namespaced resource name advertised to the kubelet
    #[serde(default = "default_resource_name")]
    pub resource_name: String,

    /// Directory whose entry count is the number of devices in use
    #[serde(default = "default_device_dir")]
    pub device_dir: PathBuf,

    /// Fixed size of the device pool
    #[serde(default = "default_total_devices")]
    pub total_devices: usize,

    /// Kubelet device plugin directory holding both sockets
    #[serde(default = "default_plugin_dir")]
    pub plugin_dir: PathBuf,

    /// File name of this plugin's socket inside `plugin_dir`
    #[serde(default = "default_plugin_socket")]
    pub plugin_socket: String,

    /// File name of the kubelet registration socket inside `plugin_dir`
    #[serde(default = "default_kubelet_socket")]
    pub kubelet_socket: String,

    /// Upper bound for every socket dial (self probe and registration)
    #[serde(default = "default_dial_timeout")]
    pub dial_timeout_in_ms: u64,

    /// Environment variable carrying the allocated device IDs
    #[serde(default = "default_allocation_env")]
    pub allocation_env: String,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            resource_name: default_resource_name(),
            device_dir: default_device_dir(),
            total_devices: default_total_devices(),
            plugin_dir: default_plugin_dir(),
            plugin_socket: default_plugin_socket(),
            kubelet_socket: default_kubelet_socket(),
            dial_timeout_in_ms: default_dial_timeout(),
            allocation_env: default_allocation_env(),
        }
    }
}

impl PluginSettings {
    pub fn plugin_socket_path(&self) -> PathBuf {
        self.plugin_dir.join(&self.plugin_socket)
    }

    pub fn kubelet_socket_path(&self) -> PathBuf {
        self.plugin_dir.join(&self.kubelet_socket)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_in_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.resource_name.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "resource_name cannot be empty".into(),
            )));
        }

        // kubelet expects <domain>/<name>
        if !self.resource_name.contains('/') {
            return Err(Error::Config(ConfigError::Message(format!(
                "resource_name {} must be namespaced as <domain>/<name>",
                self.resource_name
            ))));
        }

        if self.total_devices == 0 {
            return Err(Error::Config(ConfigError::Message(
                "total_devices must be greater than 0".into(),
            )));
        }

        if self.device_dir.as_os_str().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "device_dir path cannot be empty".into(),
            )));
        }

        validate_socket_name(&self.plugin_socket, "plugin_socket")?;
        validate_socket_name(&self.kubelet_socket, "kubelet_socket")?;

        if self.plugin_socket == self.kubelet_socket {
            return Err(Error::Config(ConfigError::Message(
                "plugin_socket must differ from kubelet_socket".into(),
            )));
        }

        if self.dial_timeout_in_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "dial_timeout_in_ms must be > 0".into(),
            )));
        }

        if self.allocation_env.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "allocation_env cannot be empty".into(),
            )));
        }

        Ok(())
    }
}

/// The kubelet resolves the endpoint relative to its plugin directory, so
/// socket names must be bare file names.
fn validate_socket_name(
    name: &str,
    field: &str,
) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Config(ConfigError::Message(format!(
            "{field} cannot be empty"
        ))));
    }
    if name.contains('/') {
        return Err(Error::Config(ConfigError::Message(format!(
            "{field} {name} must be a file name, not a path"
        ))));
    }
    Ok(())
}

fn default_resource_name() -> String {
    DEFAULT_RESOURCE_NAME.to_string()
}
fn default_device_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DEVICE_DIR)
}
fn default_total_devices() -> usize {
    DEFAULT_TOTAL_DEVICES
}
fn default_plugin_dir() -> PathBuf {
    PathBuf::from(DEFAULT_PLUGIN_DIR)
}
fn default_plugin_socket() -> String {
    DEFAULT_PLUGIN_SOCKET.to_string()
}
fn default_kubelet_socket() -> String {
    DEFAULT_KUBELET_SOCKET.to_string()
}
fn default_dial_timeout() -> u64 {
    DEFAULT_DIAL_TIMEOUT_IN_MS
}
fn default_allocation_env() -> String {
    DEFAULT_ALLOCATION_ENV.to_string()
}
