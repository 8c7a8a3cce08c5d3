//! Device inventory: the registry, the directory watcher driving it and the
//! change signal consumed by streaming sessions.

mod notifier;
mod registry;
mod watcher;

pub use notifier::*;
pub use registry::*;
pub use watcher::*;
