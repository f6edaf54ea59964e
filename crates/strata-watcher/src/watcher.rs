//! Filesystem watcher implementation

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use notify::event::{EventKind, ModifyKind};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use strata_core::{CACHE_DIR, MIRROR_DIR};
use strata_processor::{ChangeBatch, ChangeEvent, ChangeKind};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Top-level directories under the project root that never hold input.
const IGNORED_DIRS: &[&str] = &[".git", "target", CACHE_DIR, MIRROR_DIR];

/// Watches a project tree and delivers one [`ChangeBatch`] per notification.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<ChangeBatch>,
    watched_paths: HashSet<PathBuf>,
    root_path: PathBuf,
}

impl FileWatcher {
    /// Create a new file watcher for the given root path
    pub fn new(root_path: impl AsRef<Path>) -> Result<Self> {
        let root_path = root_path.as_ref().to_path_buf();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let root = root_path.clone();
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let batch = match res {
                Ok(event) => {
                    debug!("File system event: {:?}", event);
                    to_batch(event, &root)
                }
                Err(e) => {
                    // Events may have been lost.
                    error!("File system watch error: {}", e);
                    ChangeBatch::rescan()
                }
            };
            if batch.is_empty() {
                return;
            }
            if let Err(e) = event_tx.send(batch) {
                warn!("Failed to send change batch: {}", e);
            }
        })?;

        Ok(Self {
            watcher,
            event_rx,
            watched_paths: HashSet::new(),
            root_path,
        })
    }

    /// Watch a directory recursively
    pub fn watch_directory(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        info!("Watching directory: {:?}", path);

        self.watcher.watch(path, RecursiveMode::Recursive)?;
        self.watched_paths.insert(path.to_path_buf());
        Ok(())
    }

    /// Stop watching a path
    pub fn unwatch(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        info!("Stopping watch for: {:?}", path);

        self.watcher.unwatch(path)?;
        self.watched_paths.remove(path);
        Ok(())
    }

    pub fn event_receiver(&mut self) -> &mut mpsc::UnboundedReceiver<ChangeBatch> {
        &mut self.event_rx
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.watched_paths.contains(path)
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }
}

fn to_batch(event: notify::Event, root: &Path) -> ChangeBatch {
    if event.need_rescan() {
        return ChangeBatch::rescan();
    }
    let Some(kind) = change_kind(&event.kind) else {
        return ChangeBatch::default();
    };
    ChangeBatch {
        events: event
            .paths
            .into_iter()
            .filter(|path| !should_ignore_path(path, root))
            .map(|path| ChangeEvent::new(path, kind))
            .collect(),
        rescan_required: false,
    }
}

fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Renamed),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Deleted),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

/// Check if a path should be ignored (e.g., target/, .git/, etc.)
fn should_ignore_path(path: &Path, root: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    if let Some(first) = relative.components().next() {
        let name = first.as_os_str();
        if IGNORED_DIRS.iter().any(|dir| name == *dir) {
            return true;
        }
    }
    relative
        .components()
        .any(|component| component.as_os_str() == ".git")
}
