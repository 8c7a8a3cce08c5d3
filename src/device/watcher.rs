//! Translates entry creation and removal in the device directory into
//! watermark transitions.
//!
//! The directory is a pure counter: no file is tied to a specific device
//! index. Events are applied strictly in arrival order by a single task that
//! owns the [`DeviceRegistry`], and each accepted transition is followed by
//! exactly one notification.
//!
//! Entries created or removed before the watch attaches are not reconciled;
//! the count is only re-read on process restart.

use std::path::PathBuf;

use notify::event::ModifyKind;
use notify::event::RenameMode;
use notify::Event;
use notify::EventKind;
use notify::RecursiveMode;
use notify::Watcher;
use tokio::select;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::ChangeNotifier;
use super::DeviceRegistry;
use crate::Result;
use crate::SystemError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// An entry appeared: one more device is in use
    Created,
    /// An entry vanished: one device became available
    Removed,
}

impl DeviceEvent {
    /// An entry moved into the directory counts as created and one moved
    /// out as removed. A rename inside the directory reports both halves,
    /// so the count is unchanged. Writes and metadata changes are ignored.
    pub fn from_kind(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                Some(DeviceEvent::Created)
            }
            EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                Some(DeviceEvent::Removed)
            }
            _ => None,
        }
    }
}

pub struct DeviceWatcher {
    registry: DeviceRegistry,
    notifier: ChangeNotifier,
    device_dir: PathBuf,
}

impl DeviceWatcher {
    pub fn new(
        registry: DeviceRegistry,
        notifier: ChangeNotifier,
        device_dir: PathBuf,
    ) -> Self {
        Self {
            registry,
            notifier,
            device_dir,
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Applies one event to the registry and signals subscribers if the
    /// registry changed.
    ///
    /// A create at full capacity or a remove with nothing in use is ignored
    /// and produces no notification.
    pub fn apply(
        &mut self,
        event: DeviceEvent,
    ) -> bool {
        let changed = match event {
            DeviceEvent::Created => self.registry.occupy(),
            DeviceEvent::Removed => self.registry.release(),
        };

        if changed {
            // Snapshot is already published, so any woken reader sees it.
            self.notifier.notify();
        } else {
            info!(
                "ignore {:?} event: used {} of {} devices",
                event,
                self.registry.watermark(),
                self.registry.capacity()
            );
        }
        changed
    }

    /// Watches the device directory until `shutdown` is cancelled or the
    /// event source closes.
    ///
    /// # Errors
    /// Returns `SystemError::Watch` if the watcher cannot be created or
    /// attached. Errors reported by the event source while running are
    /// logged and do not end the loop.
    pub async fn run(
        mut self,
        shutdown: CancellationToken,
    ) -> Result<()> {
        info!("watching devices in {}", self.device_dir.display());

        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = event_tx.send(res);
        })
        .map_err(|source| SystemError::Watch {
            path: self.device_dir.clone(),
            source,
        })?;

        watcher
            .watch(&self.device_dir, RecursiveMode::NonRecursive)
            .map_err(|source| SystemError::Watch {
                path: self.device_dir.clone(),
                source,
            })?;

        loop {
            select! {
                _ = shutdown.cancelled() => {
                    debug!("device watcher received shutdown signal");
                    break;
                }
                res = event_rx.recv() => match res {
                    Some(Ok(event)) => {
                        info!("device event: {:?}, paths: {:?}", event.kind, event.paths);
                        if let Some(device_event) = DeviceEvent::from_kind(&event.kind) {
                            self.apply(device_event);
                        }
                    }
                    Some(Err(e)) => {
                        warn!("device watch error: {:?}", e);
                    }
                    None => {
                        warn!("device event source closed");
                        break;
                    }
                }
            }
        }

        info!("watch device exit");
        Ok(())
    }
}
