//! Dependency manifest and its reference-based JSON encoding
//!
//! Modules are written once each, dependencies first, and dependents name
//! their dependencies instead of nesting copies of them.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::diff::ForestSnapshot;
use crate::error::{GraphError, ManifestError};
use crate::graph::{Forest, ModuleGraph};
use crate::model::{LanguageVersion, Module, ModuleId};
use crate::version::Version;

/// A module as persisted: files relative to `path`, dependencies by name.
/// An empty file entry is `path` itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub name: String,
    pub path: PathBuf,
    pub files: Vec<String>,
    pub dependencies: Vec<String>,
    #[serde(rename = "swiftVersion")]
    pub language_version: Option<LanguageVersion>,
}

/// An external package and the modules it contributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub path: PathBuf,
    pub version: Option<Version>,
    #[serde(rename = "moduleNames")]
    pub module_names: Vec<String>,
}

/// The persisted shape of a [`DependencyManifest`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDocument {
    pub imports: Vec<String>,
    pub modules: Vec<ModuleRecord>,
    pub packages: Vec<PackageRecord>,
}

/// Modules in dependency-first order plus the import list and package
/// descriptors of one resolution.
#[derive(Debug, Clone, Default)]
pub struct DependencyManifest {
    graph: ModuleGraph,
    modules: Vec<ModuleId>,
    imports: Vec<String>,
    packages: Vec<PackageRecord>,
}

impl DependencyManifest {
    /// `imports` keeps the order it is given in.
    pub fn new(
        graph: ModuleGraph,
        imports: Vec<String>,
        packages: Vec<PackageRecord>,
    ) -> Result<Self, ManifestError> {
        let modules = graph.flattened(&graph.tips()).map_err(GraphError::from)?;
        Ok(DependencyManifest {
            graph,
            modules,
            imports,
            packages,
        })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    /// Dependency-first order.
    pub fn modules(&self) -> impl Iterator<Item = &Module> + '_ {
        self.modules.iter().map(|id| &self.graph[*id])
    }

    pub fn module_ids(&self) -> &[ModuleId] {
        &self.modules
    }

    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    pub fn packages(&self) -> &[PackageRecord] {
        &self.packages
    }

    pub fn forest(&self) -> Forest {
        Forest::new(self.graph.clone(), self.graph.tips())
    }

    pub fn snapshot(&self) -> ForestSnapshot {
        ForestSnapshot::new(
            self.graph
                .tips()
                .into_iter()
                .map(|id| self.graph[id].path().to_path_buf()),
            self.modules.iter().map(|id| self.graph.fingerprint(*id)),
        )
    }

    /// Assign every module its position, then write dependency edges as
    /// names of earlier positions.
    pub fn encode(&self) -> Result<ManifestDocument, ManifestError> {
        let positions: HashMap<ModuleId, usize> = self
            .modules
            .iter()
            .enumerate()
            .map(|(position, id)| (*id, position))
            .collect();

        let mut records = Vec::with_capacity(self.modules.len());
        for (position, id) in self.modules.iter().enumerate() {
            let module = &self.graph[*id];
            let mut dependencies = Vec::new();
            for dep in self.graph.dependencies(*id) {
                let name = self.graph[dep].name().to_string();
                match positions.get(&dep) {
                    Some(earlier) if *earlier < position => dependencies.push(name),
                    _ => {
                        return Err(ManifestError::ForwardReference {
                            module: module.name().to_string(),
                            dependency: name,
                        });
                    }
                }
            }
            records.push(ModuleRecord {
                name: module.name().to_string(),
                path: module.path().to_path_buf(),
                files: record_files(module),
                dependencies,
                language_version: module.language_version(),
            });
        }

        Ok(ManifestDocument {
            imports: self.imports.clone(),
            modules: records,
            packages: self.packages.clone(),
        })
    }

    /// Rebuild modules in document order, resolving each dependency name
    /// against the entries decoded so far.
    pub fn decode(document: ManifestDocument) -> Result<Self, ManifestError> {
        let mut graph = ModuleGraph::new();
        let mut table: HashMap<String, ModuleId> = HashMap::new();
        let mut order = Vec::with_capacity(document.modules.len());

        for record in document.modules {
            let dependencies = record
                .dependencies
                .iter()
                .map(|dep| {
                    table
                        .get(dep)
                        .copied()
                        .ok_or_else(|| ManifestError::UnknownDependency {
                            module: record.name.clone(),
                            dependency: dep.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let files = record.files.iter().map(|file| {
                if file.is_empty() {
                    record.path.clone()
                } else {
                    record.path.join(file)
                }
            });
            let module = Module::new(
                record.name.clone(),
                record.path.clone(),
                files,
                record.language_version,
            );
            let id = graph.add_module(module, &dependencies)?;
            table.insert(record.name, id);
            order.push(id);
        }

        Ok(DependencyManifest {
            graph,
            modules: order,
            imports: document.imports,
            packages: document.packages,
        })
    }

    /// Compact JSON of [`DependencyManifest::encode`].
    pub fn to_json(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string(&self.encode()?)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        Self::decode(serde_json::from_str(json)?)
    }
}

/// Files relative to the module path; a module located at its file records
/// that file as the empty path.
fn record_files(module: &Module) -> Vec<String> {
    module
        .files()
        .iter()
        .map(|file| {
            file.strip_prefix(module.path())
                .unwrap_or(file)
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}
