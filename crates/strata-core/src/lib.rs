//! Strata Core: module graph, directory inference and dependency manifest

pub mod cache;
pub mod diff;
pub mod error;
pub mod graph;
pub mod manifest;
pub mod model;
pub mod modelizer;
pub mod requirement;
pub mod topo;
pub mod version;


#[cfg(test)]
pub mod test_utils;

pub use cache::{
    CACHE_DIR, DependencyCache, MANIFEST_CACHE, MIRROR_DIR, cache_dir, clear_cache,
    manifest_cache_path, mirror_dir, modification_time, write_atomic,
};
pub use diff::{DiffEngine, ForestDiff, ForestSnapshot};
pub use error::{GraphError, ManifestError, ModelizeError};
pub use graph::{Forest, ModuleGraph};
pub use manifest::{DependencyManifest, ManifestDocument, ModuleRecord, PackageRecord};
pub use model::{LanguageVersion, Module, ModuleFingerprint, ModuleId};
pub use modelizer::{DEFAULT_SOURCE_EXTENSION, Modelizer};
pub use requirement::{Constraint, PackageRequirement, VersionSpec};
pub use topo::{CycleDetected, topologically_sorted};
pub use version::{Version, VersionParseError, VersionRange};
