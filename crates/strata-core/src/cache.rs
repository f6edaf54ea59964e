//! On-disk cache for the dependency manifest

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::ManifestError;
use crate::manifest::{DependencyManifest, ManifestDocument};
use crate::requirement::PackageRequirement;

/// Cache directory: .strata/
pub const CACHE_DIR: &str = ".strata";

/// Persisted manifest, inside the cache directory
pub const MANIFEST_CACHE: &str = "Dependencies.json";

/// Mirror root for external package sources
pub const MIRROR_DIR: &str = "Dependencies";

pub fn cache_dir(root: &Path) -> PathBuf {
    root.join(CACHE_DIR)
}

pub fn manifest_cache_path(root: &Path) -> PathBuf {
    root.join(CACHE_DIR).join(MANIFEST_CACHE)
}

pub fn mirror_dir(root: &Path) -> PathBuf {
    root.join(MIRROR_DIR)
}

/// Replace `path` with `contents` without ever exposing a partial file.
///
/// The data is written to a temporary file in the same directory and then
/// renamed over the destination.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let mut staged = NamedTempFile::new_in(parent)?;
    staged.write_all(contents)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Modification time, or `None` when the file is missing or the platform
/// cannot report one.
pub fn modification_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Clear cache directory
pub fn clear_cache(root: &Path) -> std::io::Result<()> {
    let cache = cache_dir(root);
    if cache.exists() {
        std::fs::remove_dir_all(&cache)?;
    }
    Ok(())
}

/// The manifest as persisted between runs, together with the requirements
/// it was resolved from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyCache {
    pub requirements: Vec<PackageRequirement>,
    #[serde(flatten)]
    pub document: ManifestDocument,
}

impl DependencyCache {
    pub fn new(
        requirements: Vec<PackageRequirement>,
        manifest: &DependencyManifest,
    ) -> Result<Self, ManifestError> {
        Ok(DependencyCache {
            requirements,
            document: manifest.encode()?,
        })
    }

    pub fn save(&self, root: &Path) -> Result<(), ManifestError> {
        let path = manifest_cache_path(root);
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(&path, json.as_bytes()).map_err(|source| ManifestError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::debug!("Manifest cache saved: {}", path.display());
        Ok(())
    }

    /// `Ok(None)` when nothing was cached yet.
    pub fn load(root: &Path) -> Result<Option<Self>, ManifestError> {
        let path = manifest_cache_path(root);
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ManifestError::Io { path, source }),
        };
        let cache = serde_json::from_str(&json)?;
        tracing::debug!("Manifest cache loaded from: {}", path.display());
        Ok(Some(cache))
    }

    pub fn manifest(&self) -> Result<DependencyManifest, ManifestError> {
        DependencyManifest::decode(self.document.clone())
    }
}
