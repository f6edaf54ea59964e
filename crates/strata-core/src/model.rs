//! Core data structures for the module graph

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Handle to a module stored in a [`ModuleGraph`](crate::graph::ModuleGraph).
///
/// Only meaningful for the graph that issued it; compare modules across
/// passes with [`ModuleFingerprint`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct ModuleId(pub u32);

/// Language version a module can be pinned to.
///
/// Absent on a module means "inherit the project default".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum LanguageVersion {
    #[serde(rename = "4")]
    V4,
    #[serde(rename = "4.2")]
    V4_2,
    #[default]
    #[serde(rename = "5.0")]
    V5,
}

impl LanguageVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageVersion::V4 => "4",
            LanguageVersion::V4_2 => "4.2",
            LanguageVersion::V5 => "5.0",
        }
    }
}

impl fmt::Display for LanguageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "4" | "4.0" => Ok(LanguageVersion::V4),
            "4.2" => Ok(LanguageVersion::V4_2),
            "5" | "5.0" => Ok(LanguageVersion::V5),
            other => Err(format!("unsupported language version `{other}`")),
        }
    }
}

/// One compilable unit: a directory, its source files and an optional
/// language-version override.
///
/// Dependency edges live in the owning graph, not here. A module is never
/// mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    name: String,
    path: PathBuf,
    files: Vec<PathBuf>,
    language_version: Option<LanguageVersion>,
}

impl Module {
    /// Files are stored sorted and de-duplicated.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        files: impl IntoIterator<Item = PathBuf>,
        language_version: Option<LanguageVersion>,
    ) -> Self {
        let mut files: Vec<PathBuf> = files.into_iter().collect();
        files.sort();
        files.dedup();
        Module {
            name: name.into(),
            path: path.into(),
            files,
            language_version,
        }
    }

    /// A module made of one file; its directory is the file's container.
    pub fn single_file(
        name: impl Into<String>,
        file: PathBuf,
        language_version: Option<LanguageVersion>,
    ) -> Self {
        let directory = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Module::new(name, directory, [file], language_version)
    }

    /// A module located at its only file. Several of these can share one
    /// directory without sharing a path.
    pub fn at_file(
        name: impl Into<String>,
        file: PathBuf,
        language_version: Option<LanguageVersion>,
    ) -> Self {
        Module::new(name, file.clone(), [file], language_version)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn language_version(&self) -> Option<LanguageVersion> {
        self.language_version
    }

    /// Whether the module path is its only file rather than a directory.
    pub fn is_file_module(&self) -> bool {
        matches!(self.files.as_slice(), [only] if *only == self.path)
    }

    /// Directory holding the module's files.
    pub fn directory(&self) -> &Path {
        if self.is_file_module() {
            self.path.parent().unwrap_or(&self.path)
        } else {
            &self.path
        }
    }

    /// Files relative to [`Module::directory`]. Files outside it keep their
    /// full path.
    pub fn relative_files(&self) -> Vec<String> {
        let directory = self.directory();
        self.files
            .iter()
            .map(|file| {
                file.strip_prefix(directory)
                    .unwrap_or(file)
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }
}

/// Value identity of a module within one pass.
///
/// Equality covers path, files and dependency paths; hashing covers the path
/// only, so lookups are cheap while comparisons stay exact.
#[derive(Debug, Clone, Eq)]
pub struct ModuleFingerprint {
    pub name: String,
    pub path: PathBuf,
    pub files: Vec<PathBuf>,
    pub dependencies: Vec<PathBuf>,
}

impl PartialEq for ModuleFingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.dependencies == other.dependencies && self.files == other.files
    }
}

impl Hash for ModuleFingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}
