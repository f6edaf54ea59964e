//! Artifact writers: turn a generated forest into a project description

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_core::{
    DependencyManifest, Forest, LanguageVersion, ModuleGraph, ModuleId, PackageRecord,
    write_atomic,
};
use tracing::{debug, info};

use crate::config::{Platform, ProjectConfig};
use crate::error::WriterError;
use crate::settings::ProjectSettings;

/// Everything one generation hands to the writer.
#[derive(Debug, Clone, Copy)]
pub struct GenerationInput<'a> {
    pub prefix: &'a Path,
    pub config: &'a ProjectConfig,
    pub forest: &'a Forest,
    /// The forest flattened, dependencies first.
    pub order: &'a [ModuleId],
    pub manifest: &'a DependencyManifest,
    pub settings: &'a ProjectSettings,
}

/// Emits the build-project description.
///
/// `write` either commits a complete description or returns an error having
/// committed nothing.
pub trait ArtifactWriter: Send {
    /// The file whose modification time tracks user edits to the project.
    fn project_path(&self) -> &Path;

    /// Read back settings the user may have changed in the project.
    /// `None` when no project exists yet.
    fn extract_settings(&self) -> Result<Option<ProjectSettings>, WriterError>;

    fn write(&mut self, input: &GenerationInput<'_>) -> Result<(), WriterError>;
}

/// Writes a deterministic JSON description of targets, packages and settings.
#[derive(Debug, Clone)]
pub struct JsonProjectWriter {
    path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDescription {
    pub name: String,
    #[serde(default)]
    pub settings: ProjectSettings,
    pub suppress_dependency_warnings: bool,
    pub imports: Vec<String>,
    pub targets: Vec<TargetDescription>,
    pub packages: Vec<PackageRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescription {
    pub name: String,
    pub path: String,
    pub files: Vec<String>,
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_version: Option<LanguageVersion>,
    /// Sources mirrored from an external package.
    pub external: bool,
}

impl JsonProjectWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonProjectWriter { path: path.into() }
    }

    pub fn describe(input: &GenerationInput<'_>) -> ProjectDescription {
        let name = input
            .prefix
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Project".to_string());

        let manifest = input.manifest;
        let mut targets: Vec<TargetDescription> = manifest
            .module_ids()
            .iter()
            .map(|id| target(manifest.graph(), *id, input.prefix, true))
            .collect();
        targets.extend(
            input
                .order
                .iter()
                .map(|id| target(input.forest.graph(), *id, input.prefix, false)),
        );

        let platforms: Vec<Platform> = input.settings.merged_platforms(&input.config.platforms);
        ProjectDescription {
            name,
            settings: ProjectSettings {
                language_version: input.settings.language_version,
                platforms,
            },
            suppress_dependency_warnings: input.config.options.suppress_dependency_warnings,
            imports: manifest.imports().to_vec(),
            targets,
            packages: manifest.packages().to_vec(),
        }
    }
}

fn target(graph: &ModuleGraph, id: ModuleId, prefix: &Path, external: bool) -> TargetDescription {
    let module = &graph[id];
    TargetDescription {
        name: module.name().to_string(),
        path: module
            .directory()
            .strip_prefix(prefix)
            .unwrap_or(module.directory())
            .to_string_lossy()
            .into_owned(),
        files: module.relative_files(),
        dependencies: graph
            .dependencies(id)
            .into_iter()
            .map(|dep| graph[dep].name().to_string())
            .collect(),
        language_version: module.language_version(),
        external,
    }
}

impl ArtifactWriter for JsonProjectWriter {
    fn project_path(&self) -> &Path {
        &self.path
    }

    fn extract_settings(&self) -> Result<Option<ProjectSettings>, WriterError> {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(WriterError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        #[derive(Deserialize)]
        struct Extract {
            #[serde(default)]
            settings: ProjectSettings,
        }
        let extract: Extract = serde_json::from_slice(&content)?;
        debug!("Extracted settings from {}", self.path.display());
        Ok(Some(extract.settings))
    }

    fn write(&mut self, input: &GenerationInput<'_>) -> Result<(), WriterError> {
        let description = Self::describe(input);
        let mut json = serde_json::to_vec_pretty(&description)?;
        json.push(b'\n');
        write_atomic(&self.path, &json).map_err(|source| WriterError::Io {
            path: self.path.clone(),
            source,
        })?;
        info!(
            "Wrote {} targets to {}",
            description.targets.len(),
            self.path.display()
        );
        Ok(())
    }
}
