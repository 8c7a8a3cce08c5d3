use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_MAX_RESTARTS;
use crate::constants::DEFAULT_RESTART_WINDOW_IN_SECS;
use crate::Error;
use crate::Result;

/// Crash-loop protection for the gRPC serve loop
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SupervisorConfig {
    /// Rapid restarts tolerated before the process gives up
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    /// A crash arriving later than this after the previous one resets the
    /// restart counter
    #[serde(default = "default_restart_window")]
    pub restart_window_in_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_restarts: default_max_restarts(),
            restart_window_in_secs: default_restart_window(),
        }
    }
}

impl SupervisorConfig {
    pub fn restart_window(&self) -> Duration {
        Duration::from_secs(self.restart_window_in_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_restarts == 0 {
            return Err(Error::Config(ConfigError::Message(
                "max_restarts must be greater than 0".into(),
            )));
        }

        if self.restart_window_in_secs == 0 {
            return Err(Error::Config(ConfigError::Message(
                "restart_window_in_secs must be greater than 0".into(),
            )));
        }

        Ok(())
    }
}

fn default_max_restarts() -> u32 {
    DEFAULT_MAX_RESTARTS
}
fn default_restart_window() -> u64 {
    DEFAULT_RESTART_WINDOW_IN_SECS
}
