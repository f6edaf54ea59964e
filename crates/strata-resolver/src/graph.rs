//! Resolved package graph as handed over by an external resolver

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strata_core::{LanguageVersion, Version};

/// One resolution: every package that took part plus the names of the
/// packages the project depends on directly, in the resolver's own order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedGraph {
    pub roots: Vec<String>,
    pub packages: Vec<ResolvedPackage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPackage {
    pub name: String,
    /// Remote URL or local path the package was declared with.
    pub url: String,
    /// Checkout location inside the resolver's cache.
    pub path: PathBuf,
    #[serde(default)]
    pub version: Option<Version>,
    /// Language versions the package declares it supports, e.g. `"4.2"`.
    #[serde(default)]
    pub language_versions: Vec<String>,
    #[serde(default)]
    pub tools_version: Option<String>,
    #[serde(default)]
    pub targets: Vec<ResolvedTarget>,
    #[serde(default)]
    pub products: Vec<ResolvedProduct>,
    /// Names of packages this one depends on.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTarget {
    pub name: String,
    pub kind: TargetKind,
    pub sources_root: PathBuf,
    /// Relative to `sources_root`.
    pub sources: Vec<PathBuf>,
    #[serde(default)]
    pub dependencies: Vec<TargetDependency>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Library,
    Executable,
    Test,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TargetDependency {
    /// A target of the same package.
    Target { name: String },
    /// A product, usually of another package. Without a package the product
    /// is looked up across every package in the graph.
    Product {
        name: String,
        #[serde(default)]
        package: Option<String>,
    },
}

/// Named group of targets a package exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedProduct {
    pub name: String,
    pub targets: Vec<String>,
}

impl ResolvedPackage {
    pub fn library_targets(&self) -> impl Iterator<Item = &ResolvedTarget> + '_ {
        self.targets
            .iter()
            .filter(|t| t.kind == TargetKind::Library)
    }

    /// Highest declared language version, else the tools version.
    pub fn language_version(&self) -> Option<LanguageVersion> {
        self.language_versions
            .iter()
            .filter_map(|v| v.parse::<LanguageVersion>().ok())
            .max()
            .or_else(|| self.tools_version.as_deref().and_then(tools_language_version))
    }
}

/// Tools versions name the manifest format; map them onto the language
/// version that format implies.
fn tools_language_version(tools: &str) -> Option<LanguageVersion> {
    let version: Version = tools.parse().ok()?;
    match (version.major, version.minor) {
        (0..=3, _) => None,
        (4, 0..=1) => Some(LanguageVersion::V4),
        (4, _) => Some(LanguageVersion::V4_2),
        _ => Some(LanguageVersion::V5),
    }
}

impl ResolvedTarget {
    /// The target's only source file, if it has exactly one.
    pub fn single_file(&self) -> Option<PathBuf> {
        match self.sources.as_slice() {
            [only] => Some(self.sources_root.join(only)),
            _ => None,
        }
    }

    /// C99 identifier form of the target name, as used in import statements.
    pub fn c99_name(&self) -> String {
        c99_name(&self.name)
    }
}

pub fn c99_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}
