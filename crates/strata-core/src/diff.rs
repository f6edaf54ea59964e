//! Forest snapshots and diffs for incremental regeneration

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::model::ModuleFingerprint;

/// Value view of a forest: tip paths plus every reachable module.
///
/// Two snapshots are equal when both forests contain the same modules with
/// the same files and the same dependency paths, independent of the graph
/// handles either pass allocated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForestSnapshot {
    tips: BTreeSet<PathBuf>,
    modules: HashSet<ModuleFingerprint>,
}

impl ForestSnapshot {
    pub fn new(
        tips: impl IntoIterator<Item = PathBuf>,
        modules: impl IntoIterator<Item = ModuleFingerprint>,
    ) -> Self {
        ForestSnapshot {
            tips: tips.into_iter().collect(),
            modules: modules.into_iter().collect(),
        }
    }

    pub fn tips(&self) -> &BTreeSet<PathBuf> {
        &self.tips
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    fn by_path(&self) -> HashMap<&PathBuf, &ModuleFingerprint> {
        self.modules.iter().map(|m| (&m.path, m)).collect()
    }
}

/// What moved between two passes, by module path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestDiff {
    /// Monotonically increasing diff sequence number.
    pub sequence: u64,
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    /// Same path, different files or dependencies.
    pub changed: Vec<PathBuf>,
}

impl ForestDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Hands out diffs with increasing sequence numbers.
#[derive(Debug, Default)]
pub struct DiffEngine {
    sequence: u64,
}

impl DiffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare two snapshots. Output lists are sorted by path.
    pub fn compute_diff(&mut self, old: &ForestSnapshot, new: &ForestSnapshot) -> ForestDiff {
        let mut diff = ForestDiff::default();
        let (before, after) = (old.by_path(), new.by_path());

        for module in &new.modules {
            match before.get(&module.path) {
                None => diff.added.push(module.path.clone()),
                Some(previous) if *previous != module => diff.changed.push(module.path.clone()),
                Some(_) => {}
            }
        }
        for module in &old.modules {
            if !after.contains_key(&module.path) {
                diff.removed.push(module.path.clone());
            }
        }

        diff.added.sort();
        diff.removed.sort();
        diff.changed.sort();

        self.sequence += 1;
        diff.sequence = self.sequence;
        diff
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}
