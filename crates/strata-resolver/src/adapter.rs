//! Turns a resolved package graph into modules and a dependency manifest

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use strata_core::{
    DependencyManifest, Module, ModuleGraph, ModuleId, PackageRecord, topologically_sorted,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{AdapterError, MirrorError};
use crate::graph::{ResolvedGraph, ResolvedPackage, ResolvedTarget, TargetDependency, TargetKind};
use crate::mirror::{MirrorEntry, MirrorTransaction};
use crate::naming::{mirror_name, qualified_name};

/// Modules built from a resolution, plus the mirror update that makes their
/// paths real. Nothing on disk changes until the mirror is committed.
#[derive(Debug)]
pub struct Adaptation {
    pub manifest: DependencyManifest,
    pub mirror: MirrorTransaction,
}

/// Where a target's sources end up in the mirror.
struct Placement {
    /// Module path: the target's mirror directory, or the mirrored file of
    /// a single-file package.
    path: PathBuf,
    files: Vec<PathBuf>,
    single_file: bool,
}

pub struct Adapter {
    mirror_root: PathBuf,
}

impl Adapter {
    pub fn new(mirror_root: impl Into<PathBuf>) -> Self {
        Adapter {
            mirror_root: mirror_root.into(),
        }
    }

    pub fn mirror_root(&self) -> &Path {
        &self.mirror_root
    }

    /// Build one module per library target reachable from the graph roots
    /// and stage their sources into the mirror.
    pub fn adapt(
        &self,
        resolved: &ResolvedGraph,
        cancel: &CancellationToken,
    ) -> Result<Adaptation, AdapterError> {
        let index = Index::build(resolved)?;

        let roots: Vec<&ResolvedTarget> = resolved
            .roots
            .iter()
            .filter_map(|name| index.packages.iter().find(|p| &p.name == name))
            .flat_map(|p| p.library_targets())
            .collect();
        let root_names: Vec<String> = roots.iter().map(|t| t.name.clone()).collect();

        let mut edges: HashMap<String, Vec<String>> = HashMap::new();
        let mut pending = root_names.clone();
        while let Some(name) = pending.pop() {
            if edges.contains_key(&name) {
                continue;
            }
            let (_, target) = index.target(&name)?;
            let deps = index.expand(target)?;
            pending.extend(deps.iter().cloned());
            edges.insert(name, deps);
        }

        let order = topologically_sorted(
            root_names.iter().cloned(),
            |name| name.clone(),
            |name| edges.get(name).cloned().unwrap_or_default(),
        )?;

        let (entries, placements) = self.plan(&index, &order)?;

        let mut graph = ModuleGraph::new();
        let mut ids: HashMap<&str, ModuleId> = HashMap::new();
        for name in &order {
            let (package, _) = index.target(name)?;
            let Some(placement) = placements.get(name.as_str()) else {
                continue;
            };
            let dependencies: Vec<ModuleId> = edges
                .get(name)
                .into_iter()
                .flatten()
                .filter_map(|dep| ids.get(dep.as_str()).copied())
                .collect();
            let version = package.language_version();
            let module = if placement.single_file {
                Module::at_file(name.clone(), placement.path.clone(), version)
            } else {
                Module::new(
                    name.clone(),
                    placement.path.clone(),
                    placement.files.clone(),
                    version,
                )
            };
            let id = graph.add_module(module, &dependencies)?;
            ids.insert(name.as_str(), id);
        }

        let imports = roots.iter().map(|t| t.c99_name()).collect();
        let packages = index
            .packages
            .iter()
            .filter_map(|package| {
                let module_names: Vec<String> = package
                    .library_targets()
                    .filter(|t| ids.contains_key(t.name.as_str()))
                    .map(|t| t.name.clone())
                    .collect();
                (!module_names.is_empty()).then(|| PackageRecord {
                    name: qualified_name(&package.url, &package.name),
                    path: package.path.clone(),
                    version: package.version.clone(),
                    module_names,
                })
            })
            .collect();

        let manifest = DependencyManifest::new(graph, imports, packages)?;
        if cancel.is_cancelled() {
            return Err(MirrorError::Cancelled.into());
        }
        let mirror = MirrorTransaction::stage(&self.mirror_root, &entries, cancel)?;
        info!(
            "Adapted {} packages into {} modules",
            manifest.packages().len(),
            manifest.module_ids().len()
        );
        Ok(Adaptation { manifest, mirror })
    }

    /// Decide mirror entries for every package that contributes a target in
    /// `order`.
    fn plan<'g>(
        &self,
        index: &Index<'g>,
        order: &[String],
    ) -> Result<(Vec<MirrorEntry>, HashMap<&'g str, Placement>), AdapterError> {
        let mut entries: Vec<MirrorEntry> = Vec::new();
        let mut by_package: HashMap<&str, usize> = HashMap::new();
        let mut placements: HashMap<&'g str, Placement> = HashMap::new();

        for name in order {
            let (package, target) = index.target(name)?;
            if target.sources.is_empty() {
                debug!("Target `{}` has no sources", target.name);
            }
            let base = mirror_name(&package.url, &package.name, package.version.as_ref());
            let libraries = package.library_targets().count();

            if libraries == 1 {
                if let Some(source) = target.single_file() {
                    let extension = source
                        .extension()
                        .map(|e| format!(".{}", e.to_string_lossy()))
                        .unwrap_or_default();
                    let file_name = format!("{base}{extension}");
                    let file = self.mirror_root.join(&file_name);
                    entries.push(MirrorEntry::file(file_name, source));
                    placements.insert(
                        target.name.as_str(),
                        Placement {
                            path: file.clone(),
                            files: vec![file],
                            single_file: true,
                        },
                    );
                    continue;
                }
            }

            let entry = match by_package.get(package.name.as_str()) {
                Some(entry) => *entry,
                None => {
                    entries.push(MirrorEntry::directory(base.clone()));
                    by_package.insert(package.name.as_str(), entries.len() - 1);
                    entries.len() - 1
                }
            };
            let within = if libraries > 1 {
                PathBuf::from(&target.name)
            } else {
                PathBuf::new()
            };
            let entry_dir = self.mirror_root.join(&base);
            let directory = if libraries > 1 {
                entry_dir.join(&target.name)
            } else {
                entry_dir.clone()
            };
            let mut files = Vec::with_capacity(target.sources.len());
            for relative in &target.sources {
                let destination = within.join(relative);
                files.push(entry_dir.join(&destination));
                entries[entry].push(target.sources_root.join(relative), destination);
            }
            placements.insert(
                target.name.as_str(),
                Placement {
                    path: directory,
                    files,
                    single_file: false,
                },
            );
        }

        debug!(
            "Planned {} mirror entries for {} targets",
            entries.len(),
            placements.len()
        );
        Ok((entries, placements))
    }
}

/// Packages reachable from the roots and the targets they define.
struct Index<'g> {
    packages: Vec<&'g ResolvedPackage>,
    targets: HashMap<&'g str, (&'g ResolvedPackage, &'g ResolvedTarget)>,
    all: &'g ResolvedGraph,
}

impl<'g> Index<'g> {
    fn build(resolved: &'g ResolvedGraph) -> Result<Self, AdapterError> {
        let by_name: HashMap<&str, &ResolvedPackage> = resolved
            .packages
            .iter()
            .map(|p| (p.name.as_str(), p))
            .collect();
        let lookup = |name: &str| {
            by_name
                .get(name)
                .copied()
                .ok_or_else(|| AdapterError::UnknownPackage {
                    name: name.to_string(),
                })
        };

        let mut packages: Vec<&ResolvedPackage> = Vec::new();
        let mut pending: Vec<&ResolvedPackage> = resolved
            .roots
            .iter()
            .rev()
            .map(|name| lookup(name))
            .collect::<Result<_, _>>()?;
        while let Some(package) = pending.pop() {
            if packages.iter().any(|p| p.name == package.name) {
                continue;
            }
            packages.push(package);
            for dep in package.dependencies.iter().rev() {
                pending.push(lookup(dep)?);
            }
        }

        let mut targets = HashMap::new();
        for package in packages.iter().copied() {
            for target in &package.targets {
                if let Some((first, _)) = targets.insert(target.name.as_str(), (package, target)) {
                    return Err(AdapterError::DuplicateTarget {
                        target: target.name.clone(),
                        first: first.name.clone(),
                        second: package.name.clone(),
                    });
                }
            }
        }

        Ok(Index {
            packages,
            targets,
            all: resolved,
        })
    }

    fn target(&self, name: &str) -> Result<(&'g ResolvedPackage, &'g ResolvedTarget), AdapterError> {
        self.targets
            .get(name)
            .copied()
            .ok_or_else(|| AdapterError::UnmappedTarget {
                target: name.to_string(),
            })
    }

    /// Direct library dependencies of `target`, with products expanded into
    /// the targets they export. Sorted and de-duplicated.
    fn expand(&self, target: &ResolvedTarget) -> Result<Vec<String>, AdapterError> {
        let mut names = Vec::new();
        for dependency in &target.dependencies {
            match dependency {
                TargetDependency::Target { name } => names.push(name.clone()),
                TargetDependency::Product { name, package } => {
                    let product = self
                        .all
                        .packages
                        .iter()
                        .filter(|p| package.as_ref().is_none_or(|wanted| &p.name == wanted))
                        .flat_map(|p| p.products.iter())
                        .find(|p| &p.name == name)
                        .ok_or_else(|| AdapterError::UnknownProduct {
                            product: name.clone(),
                            package: package.clone(),
                        })?;
                    names.extend(product.targets.iter().cloned());
                }
            }
        }

        let mut libraries = Vec::with_capacity(names.len());
        for name in names {
            let (_, dependency) = self.target(&name)?;
            if dependency.kind == TargetKind::Library {
                libraries.push(name);
            }
        }
        libraries.sort();
        libraries.dedup();
        Ok(libraries)
    }
}
