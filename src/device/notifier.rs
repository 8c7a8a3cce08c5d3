//! Payload-free change signal between the device watcher and streaming
//! sessions.
//!
//! Signals coalesce: a subscriber that was busy while several changes
//! happened wakes up once and re-reads the registry. The producer never
//! blocks, whether or not anybody is subscribed.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Clone)]
pub struct ChangeNotifier {
    tx: Arc<watch::Sender<u64>>,
}

pub struct ChangeSubscriber {
    rx: watch::Receiver<u64>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub fn notify(&self) {
        self.tx.send_modify(|seq| *seq = seq.wrapping_add(1));
    }

    /// Only changes signalled after this call wake the returned subscriber.
    pub fn subscribe(&self) -> ChangeSubscriber {
        ChangeSubscriber {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of signals sent so far
    pub fn sequence(&self) -> u64 {
        *self.tx.borrow()
    }
}

impl ChangeSubscriber {
    /// Waits for the next change.
    ///
    /// Returns `false` once every [`ChangeNotifier`] handle is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Whether a change is pending that `changed()` would return immediately
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }
}
