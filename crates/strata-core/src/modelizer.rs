//! Directory-to-module inference
//!
//! Every directory holding source files directly becomes a module. A module
//! depends on the nearest enclosing directory that is itself a module, so
//! directories without source files of their own are transparent.
//!
//! Symbolic links are followed: a link to a directory is walked like the
//! directory, a link to a file counts by its own name. Dangling links are
//! skipped, and a link back into the directory chain being walked is not
//! entered again.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::error::ModelizeError;
use crate::graph::{Forest, ModuleGraph};
use crate::model::{Module, ModuleId};

pub const DEFAULT_SOURCE_EXTENSION: &str = "swift";

/// Infers a [`Forest`] from a directory tree.
#[derive(Debug, Clone)]
pub struct Modelizer {
    root: PathBuf,
    base_name: String,
    extension: String,
    exclude: GlobSet,
}

struct Listing {
    directories: Vec<PathBuf>,
    files: Vec<PathBuf>,
}

impl Modelizer {
    /// `base_name` names the module formed by files directly in `root`.
    pub fn new(root: impl Into<PathBuf>, base_name: impl Into<String>) -> Self {
        Modelizer {
            root: root.into(),
            base_name: base_name.into(),
            extension: DEFAULT_SOURCE_EXTENSION.to_string(),
            exclude: GlobSet::empty(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Skip entries whose root-relative path matches any of `patterns`.
    pub fn with_exclude<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self, ModelizeError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = Glob::new(pattern).map_err(|e| ModelizeError::Pattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
            builder.add(glob);
        }
        self.exclude = builder.build().map_err(|e| ModelizeError::Pattern {
            pattern: patterns
                .iter()
                .map(|p| p.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
            reason: e.to_string(),
        })?;
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree and build the forest. Fails with
    /// [`ModelizeError::NoSourceFiles`] when no directory holds a source file.
    pub fn modelize(&self) -> Result<Forest, ModelizeError> {
        if !self.root.is_dir() {
            return Err(ModelizeError::NoSourceFiles(self.root.clone()));
        }

        let mut graph = ModuleGraph::new();
        self.visit(&self.root, None, &mut graph, &mut Vec::new())?;

        let tips = graph.tips();
        if tips.is_empty() {
            return Err(ModelizeError::NoSourceFiles(self.root.clone()));
        }
        debug!(
            "Inferred {} modules ({} tips) under {}",
            graph.len(),
            tips.len(),
            self.root.display()
        );
        Ok(Forest::new(graph, tips))
    }

    /// Returns whether `dir` or anything below it became a module.
    ///
    /// `trail` holds the canonical paths of the directories being walked.
    fn visit(
        &self,
        dir: &Path,
        enclosing: Option<ModuleId>,
        graph: &mut ModuleGraph,
        trail: &mut Vec<PathBuf>,
    ) -> Result<bool, ModelizeError> {
        let canonical = fs::canonicalize(dir).map_err(|source| ModelizeError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        if trail.contains(&canonical) {
            debug!("Skipping symlink loop at {}", dir.display());
            return Ok(false);
        }
        let listing = self.list(dir)?;

        let module = if listing.files.is_empty() {
            None
        } else {
            let name = if dir == self.root {
                self.base_name.clone()
            } else {
                dir.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| self.base_name.clone())
            };
            let dependencies: Vec<ModuleId> = enclosing.into_iter().collect();
            let id = graph.add_module(Module::new(name, dir, listing.files, None), &dependencies)?;
            debug!("Module `{}` at {}", graph[id].name(), dir.display());
            Some(id)
        };

        let next = module.or(enclosing);
        let mut below = false;
        trail.push(canonical);
        for child in &listing.directories {
            below |= self.visit(child, next, graph, trail)?;
        }
        trail.pop();
        Ok(module.is_some() || below)
    }

    fn list(&self, dir: &Path) -> Result<Listing, ModelizeError> {
        let io = |source| ModelizeError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut listing = Listing {
            directories: Vec::new(),
            files: Vec::new(),
        };
        for entry in fs::read_dir(dir).map_err(io)? {
            let entry = entry.map_err(io)?;
            let path = entry.path();
            if entry.file_name().to_string_lossy().starts_with('.') || self.is_excluded(&path) {
                continue;
            }
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("Skipping dangling link {}", path.display());
                    continue;
                }
                Err(e) => return Err(io(e)),
            };
            if metadata.is_dir() {
                listing.directories.push(path);
            } else if self.is_source(&path) {
                listing.files.push(path);
            }
        }
        listing.directories.sort();
        listing.files.sort();
        Ok(listing)
    }

    fn is_source(&self, path: &Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext.to_string_lossy() == self.extension.as_str())
    }

    fn is_excluded(&self, path: &Path) -> bool {
        path.strip_prefix(&self.root)
            .map(|relative| self.exclude.is_match(relative))
            .unwrap_or(false)
    }
}
