//! Kubelet device plugin advertising a fixed pool of virtual NIC devices.
//!
//! The number of entries in a watched directory is the number of devices in
//! use. The plugin reports the first `used` devices as `Unhealthy` and the
//! rest as `Healthy`, and streams a fresh device list to the kubelet after
//! every change.

mod config;
pub mod constants;
mod device;
mod errors;
pub mod metrics;
mod network;
pub mod proto;
mod supervisor;
pub mod utils;

pub use config::*;
pub use device::*;
pub use errors::*;
pub use network::*;
pub use supervisor::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
