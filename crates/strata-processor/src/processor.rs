//! Incremental regeneration coordinator
//!
//! A [`Processor`] owns the state of the last successful generation and
//! decides, from modification times and forest snapshots, whether the next
//! pass has anything to do. State moves `Cold -> Warm`, and back to `Warm`
//! through a regeneration whenever a staleness check fires. A pass that fails
//! leaves the previous state in place.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use strata_core::{
    DependencyCache, DependencyManifest, DiffEngine, Forest, ForestDiff, ForestSnapshot,
    GraphError, ModelizeError, Modelizer, PackageRequirement, Version, clear_cache,
    modification_time,
};
use strata_resolver::{Adaptation, Adapter, PackageResolver, ResolvedGraph};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{
    LoadedConfig, Options, ProjectConfig, check_tool_version, load_config,
};
use crate::error::ProcessorError;
use crate::events::Trigger;
use crate::layout::ProjectLayout;
use crate::settings::ProjectSettings;
use crate::writer::{ArtifactWriter, GenerationInput};

/// Whether an input modified at `input` is newer than what was cached at
/// `cached`. Unknown times are always dirty.
pub fn is_dirty(input: Option<SystemTime>, cached: Option<SystemTime>) -> bool {
    match (input, cached) {
        (Some(input), Some(cached)) => input > cached,
        _ => true,
    }
}

/// Version of this build, checked against a project's `requires` range.
pub fn current_tool_version() -> Version {
    env!("CARGO_PKG_VERSION")
        .parse()
        .unwrap_or_else(|_| Version::new(0, 0, 0))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GenerateMode {
    #[default]
    Incremental,
    /// Skip every staleness check: reload, re-resolve and regenerate.
    Force,
}

/// Why a pass regenerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    ColdStart,
    Forced,
    ConfigurationChanged,
    RequirementsChanged,
    ProjectChanged,
    ModulesChanged,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Reason::ColdStart => "cold start",
            Reason::Forced => "forced",
            Reason::ConfigurationChanged => "configuration changed",
            Reason::RequirementsChanged => "dependencies changed",
            Reason::ProjectChanged => "project changed",
            Reason::ModulesChanged => "modules changed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    UpToDate,
    Regenerated(Generation),
}

/// Summary of one regeneration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub reasons: Vec<Reason>,
    /// Local modules, relative to the previous generation.
    pub diff: ForestDiff,
    pub modules: usize,
    pub dependencies: usize,
    /// Dependencies were resolved and mirrored during this pass.
    pub resolved: bool,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorState {
    Cold,
    Warm,
    Dirty(Vec<Reason>),
}

/// What the last successful generation was made from.
#[derive(Debug)]
struct Cached {
    config: LoadedConfig,
    requirements: Vec<PackageRequirement>,
    manifest: DependencyManifest,
    settings: ProjectSettings,
    project_mtime: Option<SystemTime>,
    forest: Forest,
    snapshot: ForestSnapshot,
    generated_at: DateTime<Utc>,
}

/// Result of the staleness checks, before anything is written.
struct Evaluation {
    config: LoadedConfig,
    layout: ProjectLayout,
    forest: Forest,
    snapshot: ForestSnapshot,
    reasons: Vec<Reason>,
    requirements_changed: bool,
    project_stale: bool,
}

pub struct Processor<R, W> {
    prefix: PathBuf,
    resolver: R,
    writer: W,
    tool_version: Version,
    cached: Option<Cached>,
    diffs: DiffEngine,
}

impl<R, W> fmt::Debug for Processor<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("prefix", &self.prefix)
            .field("tool_version", &self.tool_version)
            .field("warm", &self.cached.is_some())
            .field("sequence", &self.diffs.sequence())
            .finish()
    }
}

impl<R: PackageResolver, W: ArtifactWriter> Processor<R, W> {
    pub fn new(prefix: impl Into<PathBuf>, resolver: R, writer: W) -> Self {
        Processor {
            prefix: prefix.into(),
            resolver,
            writer,
            tool_version: current_tool_version(),
            cached: None,
            diffs: DiffEngine::new(),
        }
    }

    pub fn with_tool_version(mut self, version: Version) -> Self {
        self.tool_version = version;
        self
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn tool_version(&self) -> &Version {
        &self.tool_version
    }

    pub fn config(&self) -> Option<&ProjectConfig> {
        self.cached.as_ref().map(|c| &c.config.config)
    }

    /// Layout of the last generation, or the default layout when cold.
    pub fn layout(&self) -> ProjectLayout {
        match &self.cached {
            Some(cached) => ProjectLayout::new(&self.prefix, &cached.config.config.options),
            None => ProjectLayout::new(&self.prefix, &Options::default()),
        }
    }

    pub fn forest(&self) -> Option<&Forest> {
        self.cached.as_ref().map(|c| &c.forest)
    }

    pub fn manifest(&self) -> Option<&DependencyManifest> {
        self.cached.as_ref().map(|c| &c.manifest)
    }

    pub fn last_generated(&self) -> Option<DateTime<Utc>> {
        self.cached.as_ref().map(|c| c.generated_at)
    }

    /// `Cold` or `Warm`, without looking at any input.
    pub fn state(&self) -> ProcessorState {
        match self.cached {
            Some(_) => ProcessorState::Warm,
            None => ProcessorState::Cold,
        }
    }

    /// Run the staleness checks without changing anything.
    pub fn inspect(&self) -> Result<ProcessorState, ProcessorError> {
        if self.cached.is_none() {
            return Ok(ProcessorState::Cold);
        }
        let evaluation = self.evaluate(GenerateMode::Incremental)?;
        Ok(if evaluation.reasons.is_empty() {
            ProcessorState::Warm
        } else {
            ProcessorState::Dirty(evaluation.reasons)
        })
    }

    /// Forget the in-memory state. The persisted manifest stays.
    pub fn reset(&mut self) {
        if self.cached.take().is_some() {
            debug!("Processor state reset to cold");
        }
    }

    /// Remove the cache directory and the mirror root.
    pub fn clean(&mut self) -> Result<(), ProcessorError> {
        let layout = self.layout();
        clear_cache(&self.prefix).map_err(|source| ProcessorError::Io {
            operation: "clean",
            path: layout.cache_dir.clone(),
            source,
        })?;
        if layout.mirror_root.exists() {
            std::fs::remove_dir_all(&layout.mirror_root).map_err(|source| ProcessorError::Io {
                operation: "clean",
                path: layout.mirror_root.clone(),
                source,
            })?;
        }
        self.reset();
        info!("Cleaned {}", self.prefix.display());
        Ok(())
    }

    /// React to a classified change. A rescan invalidates everything held in
    /// memory first.
    pub fn process(
        &mut self,
        trigger: Trigger,
        cancel: &CancellationToken,
    ) -> Result<Outcome, ProcessorError> {
        if trigger == Trigger::Rescan {
            info!("Rescan requested, reprocessing from cold");
            self.reset();
        }
        self.generate(GenerateMode::Incremental, cancel)
    }

    /// One regeneration pass.
    ///
    /// Commit order is: write artifacts, commit the mirror, persist the
    /// manifest cache, advance the in-memory state. Any error returns before
    /// the state is touched.
    pub fn generate(
        &mut self,
        mode: GenerateMode,
        cancel: &CancellationToken,
    ) -> Result<Outcome, ProcessorError> {
        let Evaluation {
            config,
            layout,
            forest,
            snapshot,
            reasons,
            requirements_changed,
            project_stale,
        } = self.evaluate(mode)?;

        if reasons.is_empty() {
            debug!("{} is up to date", self.prefix.display());
            return Ok(Outcome::UpToDate);
        }
        info!(
            "Regenerating {} ({})",
            self.prefix.display(),
            reasons
                .iter()
                .map(Reason::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );

        let force = mode == GenerateMode::Force;
        let requirements = config.config.dependencies.clone();
        let reused = match &self.cached {
            _ if force => None,
            Some(cached) if !requirements_changed => Some(cached.manifest.clone()),
            Some(_) => None,
            None => self.persisted_manifest(&requirements),
        };
        let (manifest, mirror) = match reused {
            Some(manifest) => (manifest, None),
            None => {
                let Adaptation { manifest, mirror } =
                    self.resolve(&requirements, &layout, cancel)?;
                (manifest, Some(mirror))
            }
        };

        let settings = match &self.cached {
            Some(cached) if !force && !project_stale => cached.settings.clone(),
            _ => self.writer.extract_settings()?.unwrap_or_default(),
        };

        if cancel.is_cancelled() {
            return Err(ProcessorError::Cancelled);
        }

        let order = forest
            .flattened()
            .map_err(|e| ModelizeError::from(GraphError::from(e)))?;
        check_shadowing(&forest, &manifest)?;
        self.writer.write(&GenerationInput {
            prefix: &self.prefix,
            config: &config.config,
            forest: &forest,
            order: &order,
            manifest: &manifest,
            settings: &settings,
        })?;

        let resolved = mirror.is_some();
        if let Some(mirror) = mirror {
            mirror.commit()?;
            DependencyCache::new(requirements.clone(), &manifest)?.save(&self.prefix)?;
        }

        // The write above touched the project; later edits are the user's.
        let project_mtime = modification_time(self.writer.project_path());

        let empty = ForestSnapshot::default();
        let previous = self.cached.as_ref().map_or(&empty, |c| &c.snapshot);
        let diff = self.diffs.compute_diff(previous, &snapshot);

        let at = Utc::now();
        let generation = Generation {
            reasons,
            diff,
            modules: order.len(),
            dependencies: manifest.module_ids().len(),
            resolved,
            at,
        };
        info!(
            "Generated {} modules and {} dependency modules (diff #{}: +{} -{} ~{})",
            generation.modules,
            generation.dependencies,
            generation.diff.sequence,
            generation.diff.added.len(),
            generation.diff.removed.len(),
            generation.diff.changed.len()
        );

        self.cached = Some(Cached {
            config,
            requirements,
            manifest,
            settings,
            project_mtime,
            forest,
            snapshot,
            generated_at: at,
        });
        Ok(Outcome::Regenerated(generation))
    }

    fn evaluate(&self, mode: GenerateMode) -> Result<Evaluation, ProcessorError> {
        let force = mode == GenerateMode::Force;
        let cached = self.cached.as_ref();
        let mut reasons = Vec::new();
        if cached.is_none() {
            reasons.push(Reason::ColdStart);
        }
        if force {
            reasons.push(Reason::Forced);
        }

        let config = match cached {
            Some(cached) if !force && !cached.config.is_stale() => cached.config.clone(),
            _ => {
                let loaded = load_config(&self.prefix)?;
                if cached.is_some() && !force {
                    debug!("{} changed", loaded.path.display());
                    reasons.push(Reason::ConfigurationChanged);
                }
                loaded
            }
        };
        check_tool_version(&config.config, &self.tool_version)?;

        let requirements_changed =
            cached.is_none_or(|cached| cached.requirements != config.config.dependencies);
        if requirements_changed && cached.is_some() {
            reasons.push(Reason::RequirementsChanged);
        }

        let project_mtime = modification_time(self.writer.project_path());
        let project_stale = cached.is_none_or(|cached| is_dirty(project_mtime, cached.project_mtime));
        if project_stale && cached.is_some() {
            reasons.push(Reason::ProjectChanged);
        }

        let layout = ProjectLayout::new(&self.prefix, &config.config.options);
        let forest = modelize(&layout, &config.config.options)?;
        let snapshot = forest
            .snapshot()
            .map_err(|e| ModelizeError::from(GraphError::from(e)))?;
        if cached.is_some_and(|cached| cached.snapshot != snapshot) {
            reasons.push(Reason::ModulesChanged);
        }

        Ok(Evaluation {
            config,
            layout,
            forest,
            snapshot,
            reasons,
            requirements_changed,
            project_stale,
        })
    }

    fn resolve(
        &self,
        requirements: &[PackageRequirement],
        layout: &ProjectLayout,
        cancel: &CancellationToken,
    ) -> Result<Adaptation, ProcessorError> {
        let graph = if requirements.is_empty() {
            debug!("No dependencies declared");
            ResolvedGraph::default()
        } else {
            self.resolver.resolve(requirements, &self.prefix, cancel)?
        };
        if cancel.is_cancelled() {
            return Err(ProcessorError::Cancelled);
        }
        Ok(Adapter::new(layout.mirror_root.clone()).adapt(&graph, cancel)?)
    }

    /// The manifest persisted by an earlier process, if it was resolved from
    /// the same requirements and its mirror is still complete.
    fn persisted_manifest(&self, requirements: &[PackageRequirement]) -> Option<DependencyManifest> {
        let cache = match DependencyCache::load(&self.prefix) {
            Ok(Some(cache)) => cache,
            Ok(None) => return None,
            Err(e) => {
                warn!("Ignoring unreadable manifest cache: {}", e);
                return None;
            }
        };
        if cache.requirements != requirements {
            debug!("Manifest cache was resolved from different dependencies");
            return None;
        }
        let manifest = match cache.manifest() {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!("Ignoring inconsistent manifest cache: {}", e);
                return None;
            }
        };
        let complete = manifest
            .modules()
            .all(|module| module.files().iter().all(|file| file.is_file()));
        if !complete {
            debug!("Mirror is incomplete, resolving again");
            return None;
        }
        info!(
            "Reusing cached manifest with {} modules",
            manifest.module_ids().len()
        );
        Some(manifest)
    }
}

/// Targets reference each other by name, so a local module may not reuse the
/// name of a dependency module.
fn check_shadowing(forest: &Forest, manifest: &DependencyManifest) -> Result<(), ProcessorError> {
    match manifest
        .modules()
        .find_map(|external| forest.find(external.name()).map(|local| (local, external)))
    {
        Some((local, external)) => Err(ProcessorError::ShadowedDependency {
            name: local.name().to_string(),
            local: local.path().to_path_buf(),
            external: external.path().to_path_buf(),
        }),
        None => Ok(()),
    }
}

fn modelize(layout: &ProjectLayout, options: &Options) -> Result<Forest, ProcessorError> {
    let forest = Modelizer::new(layout.models_dir.clone(), options.base_module_name.clone())
        .with_extension(options.source_extension.clone())
        .with_exclude(options.exclude.as_slice())?
        .modelize()?;
    Ok(forest)
}
