//! Configuration types deserialized from `Strata.toml`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strata_core::{DEFAULT_SOURCE_EXTENSION, PackageRequirement, Version, VersionRange};

/// File name of the project configuration, at the project prefix.
pub const CONFIG_FILE: &str = "Strata.toml";

/// The top-level project configuration.
///
/// Threaded explicitly through the processor; nothing reads it from global
/// state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Tool versions this project can be generated with.
    #[serde(default)]
    pub requires: Option<VersionRange>,
    #[serde(default)]
    pub options: Options,
    /// External packages, in declaration order.
    #[serde(default)]
    pub dependencies: Vec<PackageRequirement>,
    /// Minimum deployment targets.
    #[serde(default)]
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub resolver: ResolverConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Name of the module formed by files directly in the models directory.
    pub base_module_name: String,
    /// Silence compiler warnings in dependency modules.
    pub suppress_dependency_warnings: bool,
    pub source_extension: String,
    /// Root of the source tree modules are inferred from, relative to the
    /// project prefix.
    pub models_dir: PathBuf,
    /// Glob patterns, relative to `models_dir`, skipped during inference.
    pub exclude: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            base_module_name: "Bakeware".to_string(),
            suppress_dependency_warnings: true,
            source_extension: DEFAULT_SOURCE_EXTENSION.to_string(),
            models_dir: PathBuf::from("Sources/Model"),
            exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub name: String,
    pub deployment_target: Version,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Program and arguments; the project prefix is appended.
    #[serde(default)]
    pub command: Vec<String>,
}
