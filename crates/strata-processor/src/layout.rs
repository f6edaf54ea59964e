//! Where a project keeps its inputs and generated artifacts

use std::path::{Path, PathBuf};

use strata_core::{cache_dir, manifest_cache_path, mirror_dir};

use crate::config::{CONFIG_FILE, Options};

/// Generated project description, inside the cache directory.
pub const PROJECT_FILE: &str = "project.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub prefix: PathBuf,
    pub config_path: PathBuf,
    pub models_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub mirror_root: PathBuf,
    pub project_path: PathBuf,
}

impl ProjectLayout {
    pub fn new(prefix: impl Into<PathBuf>, options: &Options) -> Self {
        let prefix = prefix.into();
        ProjectLayout {
            config_path: prefix.join(CONFIG_FILE),
            models_dir: prefix.join(&options.models_dir),
            cache_dir: cache_dir(&prefix),
            manifest_path: manifest_cache_path(&prefix),
            mirror_root: mirror_dir(&prefix),
            project_path: cache_dir(&prefix).join(PROJECT_FILE),
            prefix,
        }
    }

    /// Same prefix, with `models_dir` taken from freshly loaded options.
    pub fn with_options(&self, options: &Options) -> Self {
        ProjectLayout::new(self.prefix.clone(), options)
    }

    /// Paths whose changes never describe user input.
    pub fn is_generated(&self, path: &Path) -> bool {
        path.starts_with(&self.cache_dir) || path.starts_with(&self.mirror_root)
    }
}
