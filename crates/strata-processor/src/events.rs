//! Change batches delivered by a notification source, and what they trigger

use std::path::{Path, PathBuf};

use crate::layout::ProjectLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Renamed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        ChangeEvent {
            path: path.into(),
            kind,
        }
    }
}

/// Events the source collected since the last batch.
///
/// The source may drop or coalesce events under load; when it does it sets
/// `rescan_required` and the receiver must not trust `events`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    pub events: Vec<ChangeEvent>,
    pub rescan_required: bool,
}

impl ChangeBatch {
    pub fn rescan() -> Self {
        ChangeBatch {
            events: Vec::new(),
            rescan_required: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && !self.rescan_required
    }

    pub fn merge(&mut self, other: ChangeBatch) {
        self.events.extend(other.events);
        self.rescan_required |= other.rescan_required;
    }
}

/// Why a pass should run. Ordered by how much it invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Trigger {
    Sources,
    Configuration,
    Rescan,
}

/// The strongest trigger `batch` implies, or `None` when nothing relevant
/// changed.
pub fn classify(batch: &ChangeBatch, layout: &ProjectLayout, extension: &str) -> Option<Trigger> {
    if batch.rescan_required {
        return Some(Trigger::Rescan);
    }
    let extension = extension.trim_start_matches('.');
    batch
        .events
        .iter()
        .filter_map(|event| classify_path(&event.path, event.kind, layout, extension))
        .max()
}

fn classify_path(
    path: &Path,
    kind: ChangeKind,
    layout: &ProjectLayout,
    extension: &str,
) -> Option<Trigger> {
    if path == layout.config_path {
        return Some(Trigger::Configuration);
    }
    if layout.is_generated(path) || !path.starts_with(&layout.models_dir) {
        return None;
    }
    let is_source = path.extension().is_some_and(|e| e == extension);
    // A deleted or renamed path can no longer be inspected; without an
    // extension it may have been a directory full of sources.
    let maybe_directory = match kind {
        ChangeKind::Deleted | ChangeKind::Renamed => path.extension().is_none(),
        ChangeKind::Created | ChangeKind::Modified => path.is_dir(),
    };
    (is_source || maybe_directory).then_some(Trigger::Sources)
}
