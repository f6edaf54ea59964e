//! Filesystem notifications and serialized regeneration passes

pub mod service;
pub mod watcher;

pub use service::{PassOutcome, WatcherService};
pub use watcher::FileWatcher;
