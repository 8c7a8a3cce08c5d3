//! Fixed-capacity device inventory partitioned by a single watermark.
//!
//! Devices `[0, watermark)` are in use and reported `Unhealthy`, devices
//! `[watermark, N)` are free and reported `Healthy`. The registry value is
//! owned by exactly one writer (the device watcher). Every accepted mutation
//! publishes a fresh immutable snapshot through [`ArcSwap`], so readers holding
//! a [`RegistryReader`] always observe a complete point-in-time view.

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;

use crate::constants::HEALTHY;
use crate::constants::UNHEALTHY;
use crate::metrics::DEVICES_AVAILABLE;
use crate::metrics::DEVICES_IN_USE;
use crate::proto::v1beta1;
use crate::utils::file_io::count_dir_entries;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Healthy,
    Unhealthy,
}

impl Health {
    pub fn as_str(&self) -> &'static str {
        match self {
            Health::Healthy => HEALTHY,
            Health::Unhealthy => UNHEALTHY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    pub health: Health,
}

impl From<&Device> for v1beta1::Device {
    fn from(device: &Device) -> Self {
        v1beta1::Device {
            id: device.id.clone(),
            health: device.health.as_str().to_string(),
            topology: None,
        }
    }
}

pub type DeviceSnapshot = Arc<Vec<Device>>;

pub struct DeviceRegistry {
    devices: Vec<Device>,
    watermark: usize,
    published: Arc<ArcSwap<Vec<Device>>>,
}

/// Read-only, cloneable view on the latest published snapshot
#[derive(Clone)]
pub struct RegistryReader {
    published: Arc<ArcSwap<Vec<Device>>>,
}

impl RegistryReader {
    pub fn snapshot(&self) -> DeviceSnapshot {
        self.published.load_full()
    }
}

impl DeviceRegistry {
    /// Builds `total` devices and marks the first `in_use` (clamped to
    /// `total`) as unavailable.
    pub fn new(
        total: usize,
        in_use: usize,
    ) -> Self {
        let watermark = in_use.min(total);
        let devices: Vec<Device> = (0..total)
            .map(|index| Device {
                id: index.to_string(),
                health: if index < watermark {
                    Health::Unhealthy
                } else {
                    Health::Healthy
                },
            })
            .collect();

        let registry = Self {
            published: Arc::new(ArcSwap::from_pointee(devices.clone())),
            devices,
            watermark,
        };
        registry.report();
        registry
    }

    /// Discovers the devices in use from the entries of `device_dir`.
    ///
    /// # Errors
    /// Returns `SystemError::DeviceDirUnreadable` if the directory cannot be
    /// listed. Callers treat this as an unrecoverable startup failure.
    pub fn from_dir(
        device_dir: &Path,
        total: usize,
    ) -> Result<Self> {
        let in_use = count_dir_entries(device_dir)?;
        info!("discovered {} entries in {}", in_use, device_dir.display());
        Ok(Self::new(total, in_use))
    }

    pub fn reader(&self) -> RegistryReader {
        RegistryReader {
            published: self.published.clone(),
        }
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        self.published.load_full()
    }

    pub fn capacity(&self) -> usize {
        self.devices.len()
    }

    pub fn watermark(&self) -> usize {
        self.watermark
    }

    pub fn available(&self) -> usize {
        self.capacity() - self.watermark
    }

    /// Marks the next free device as in use.
    ///
    /// Returns `false` without touching state when every device is taken.
    pub fn occupy(&mut self) -> bool {
        if self.watermark >= self.capacity() {
            return false;
        }
        self.devices[self.watermark].health = Health::Unhealthy;
        self.watermark += 1;
        self.publish();
        true
    }

    /// Frees the most recently occupied device.
    ///
    /// Returns `false` without touching state when no device is in use.
    pub fn release(&mut self) -> bool {
        if self.watermark == 0 {
            return false;
        }
        self.devices[self.watermark - 1].health = Health::Healthy;
        self.watermark -= 1;
        self.publish();
        true
    }

    fn publish(&self) {
        self.published.store(Arc::new(self.devices.clone()));
        self.report();
    }

    fn report(&self) {
        DEVICES_IN_USE.set(self.watermark as i64);
        DEVICES_AVAILABLE.set(self.available() as i64);
        info!(
            "Current available devices count: {}, used: {}, total: {}",
            self.available(),
            self.watermark,
            self.capacity()
        );
    }
}
