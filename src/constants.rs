use std::time::Duration;

// -
// Kubelet device plugin protocol

/// API version sent in the registration request
pub const DEVICE_PLUGIN_API_VERSION: &str = "v1beta1";

/// Fully qualified gRPC name of the device plugin service, also used as the
/// key of its health status
pub const DEVICE_PLUGIN_SERVICE_NAME: &str = "v1beta1.DevicePlugin";

/// Device health values understood by the kubelet
pub const HEALTHY: &str = "Healthy";
pub const UNHEALTHY: &str = "Unhealthy";

// -
// Deployment defaults

pub(crate) const DEFAULT_RESOURCE_NAME: &str = "multus.network.dataworkbench.io/multus-nic-device";
pub(crate) const DEFAULT_DEVICE_DIR: &str = "/var/lib/multus-nic-device";
pub(crate) const DEFAULT_PLUGIN_DIR: &str = "/var/lib/kubelet/device-plugins/";
pub(crate) const DEFAULT_PLUGIN_SOCKET: &str = "multus-nic.sock";
pub(crate) const DEFAULT_KUBELET_SOCKET: &str = "kubelet.sock";
pub(crate) const DEFAULT_TOTAL_DEVICES: usize = 40;

/// Environment variable exposing the allocated device IDs to a container
pub(crate) const DEFAULT_ALLOCATION_ENV: &str = "MULTUS_NICS";

// -
// Supervision

pub(crate) const DEFAULT_DIAL_TIMEOUT_IN_MS: u64 = 5_000;
pub(crate) const DEFAULT_MAX_RESTARTS: u32 = 5;
pub(crate) const DEFAULT_RESTART_WINDOW_IN_SECS: u64 = 3_600;

/// Pause between connection attempts while a dial is still within its deadline
pub(crate) const DIAL_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Authority used for the HTTP/2 pseudo headers of Unix socket channels
pub(crate) const UDS_PLACEHOLDER_URI: &str = "http://[::]:50051";
