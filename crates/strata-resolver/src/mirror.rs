//! Staged copies of external package sources
//!
//! Sources are copied into a staging directory inside the mirror root and
//! only renamed into place on [`MirrorTransaction::commit`]. Dropping an
//! uncommitted transaction removes the staged copies and leaves the mirror
//! as it was.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::MirrorError;

const STAGING_PREFIX: &str = ".staging-";

/// One top-level entry of the mirror root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorEntry {
    pub name: String,
    pub layout: EntryLayout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryLayout {
    /// Source files and their destination relative to the entry directory.
    Directory { files: Vec<(PathBuf, PathBuf)> },
    /// The entry is a single file copied from `source`.
    File { source: PathBuf },
}

impl MirrorEntry {
    pub fn directory(name: impl Into<String>) -> Self {
        MirrorEntry {
            name: name.into(),
            layout: EntryLayout::Directory { files: Vec::new() },
        }
    }

    pub fn file(name: impl Into<String>, source: PathBuf) -> Self {
        MirrorEntry {
            name: name.into(),
            layout: EntryLayout::File { source },
        }
    }

    /// Add a file to a directory entry. No-op for file entries.
    pub fn push(&mut self, source: PathBuf, relative: PathBuf) {
        if let EntryLayout::Directory { files } = &mut self.layout {
            files.push((source, relative));
        }
    }
}

/// Pending mirror update.
#[derive(Debug)]
pub struct MirrorTransaction {
    root: PathBuf,
    keep: BTreeSet<String>,
    staging: Option<TempDir>,
    staged: Vec<String>,
}

impl MirrorTransaction {
    /// Copy every entry whose current mirror content differs into a fresh
    /// staging directory. Entries that are already up to date are kept as
    /// they are.
    pub fn stage(
        root: &Path,
        entries: &[MirrorEntry],
        cancel: &CancellationToken,
    ) -> Result<Self, MirrorError> {
        let mut transaction = MirrorTransaction {
            root: root.to_path_buf(),
            keep: entries.iter().map(|e| e.name.clone()).collect(),
            staging: None,
            staged: Vec::new(),
        };

        for entry in entries {
            if cancel.is_cancelled() {
                return Err(MirrorError::Cancelled);
            }
            let destination = root.join(&entry.name);
            if is_identical(entry, &destination)? {
                debug!("Mirror entry unchanged: {}", entry.name);
                continue;
            }
            let staging = transaction.staging_dir()?.to_path_buf();
            copy_entry(entry, &staging.join(&entry.name), cancel)?;
            transaction.staged.push(entry.name.clone());
        }

        debug!(
            "Staged {} of {} mirror entries under {}",
            transaction.staged.len(),
            entries.len(),
            root.display()
        );
        Ok(transaction)
    }

    fn staging_dir(&mut self) -> Result<&Path, MirrorError> {
        if self.staging.is_none() {
            fs::create_dir_all(&self.root).map_err(|source| MirrorError::Io {
                path: self.root.clone(),
                source,
            })?;
            let dir = tempfile::Builder::new()
                .prefix(STAGING_PREFIX)
                .tempdir_in(&self.root)
                .map_err(|source| MirrorError::Io {
                    path: self.root.clone(),
                    source,
                })?;
            self.staging = Some(dir);
        }
        Ok(self.staging.as_ref().map(TempDir::path).unwrap_or(self.root.as_path()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of entries that will be replaced on commit.
    pub fn staged(&self) -> &[String] {
        &self.staged
    }

    /// Swap staged entries into place and prune everything else.
    ///
    /// With no entries at all the mirror root itself is removed.
    pub fn commit(mut self) -> Result<(), MirrorError> {
        let io = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| MirrorError::Io { path, source }
        };

        if self.keep.is_empty() {
            if self.root.exists() {
                fs::remove_dir_all(&self.root).map_err(io(&self.root))?;
                info!("Removed empty mirror {}", self.root.display());
            }
            return Ok(());
        }

        if let Some(staging) = self.staging.take() {
            let trash = staging.path().join(".trash");
            fs::create_dir(&trash).map_err(io(&trash))?;
            for name in &self.staged {
                let target = self.root.join(name);
                if fs::symlink_metadata(&target).is_ok() {
                    fs::rename(&target, trash.join(name)).map_err(io(&target))?;
                }
                fs::rename(staging.path().join(name), &target).map_err(io(&target))?;
            }
            let path = staging.path().to_path_buf();
            staging.close().map_err(io(&path))?;
        }

        let mut pruned = 0;
        for entry in fs::read_dir(&self.root).map_err(io(&self.root))? {
            let entry = entry.map_err(io(&self.root))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.keep.contains(&name) {
                continue;
            }
            let path = entry.path();
            let is_dir = entry.file_type().map_err(io(&path))?.is_dir();
            if is_dir {
                fs::remove_dir_all(&path).map_err(io(&path))?;
            } else {
                fs::remove_file(&path).map_err(io(&path))?;
            }
            debug!("Pruned stale mirror entry {}", path.display());
            pruned += 1;
        }

        info!(
            "Mirror committed: {} kept, {} replaced, {} pruned",
            self.keep.len(),
            self.staged.len(),
            pruned
        );
        Ok(())
    }
}

fn copy_file(from: &Path, to: &Path) -> Result<(), MirrorError> {
    let copy_error = |source| MirrorError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(copy_error)?;
    }
    fs::copy(from, to).map_err(copy_error)?;
    Ok(())
}

fn copy_entry(entry: &MirrorEntry, to: &Path, cancel: &CancellationToken) -> Result<(), MirrorError> {
    match &entry.layout {
        EntryLayout::File { source } => copy_file(source, to),
        EntryLayout::Directory { files } => {
            fs::create_dir_all(to).map_err(|source| MirrorError::Io {
                path: to.to_path_buf(),
                source,
            })?;
            for (source, relative) in files {
                if cancel.is_cancelled() {
                    return Err(MirrorError::Cancelled);
                }
                copy_file(source, &to.join(relative))?;
            }
            Ok(())
        }
    }
}

/// Whether `destination` already holds exactly what `entry` would copy.
fn is_identical(entry: &MirrorEntry, destination: &Path) -> Result<bool, MirrorError> {
    let read = |path: &Path| {
        fs::read(path).map_err(|source| MirrorError::Io {
            path: path.to_path_buf(),
            source,
        })
    };
    match &entry.layout {
        EntryLayout::File { source } => {
            if !destination.is_file() {
                return Ok(false);
            }
            Ok(read(source)? == read(destination)?)
        }
        EntryLayout::Directory { files } => {
            if !destination.is_dir() {
                return Ok(false);
            }
            let existing = list_files(destination)?;
            let wanted: BTreeMap<&Path, &Path> = files
                .iter()
                .map(|(source, relative)| (relative.as_path(), source.as_path()))
                .collect();
            if existing.len() != wanted.len()
                || existing.iter().any(|path| !wanted.contains_key(path.as_path()))
            {
                return Ok(false);
            }
            for (relative, source) in wanted {
                if read(source)? != read(&destination.join(relative))? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

/// Files below `dir`, relative to it.
fn list_files(dir: &Path) -> Result<Vec<PathBuf>, MirrorError> {
    let mut out = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let io = |source| MirrorError::Io {
            path: current.clone(),
            source,
        };
        for entry in fs::read_dir(&current).map_err(io)? {
            let path = entry.map_err(io)?.path();
            if path.is_dir() {
                pending.push(path);
            } else if let Ok(relative) = path.strip_prefix(dir) {
                out.push(relative.to_path_buf());
            }
        }
    }
    Ok(out)
}
