//! Module arena using petgraph::StableDiGraph with ModuleId handles

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction;

use crate::diff::ForestSnapshot;
use crate::error::GraphError;
use crate::model::{Module, ModuleFingerprint, ModuleId};
use crate::topo::{topologically_sorted, CycleDetected};

/// Modules plus their dependency edges. Edges point from a dependent to its
/// dependency.
///
/// Modules can only depend on modules that are already in the graph, so a
/// graph built through [`ModuleGraph::add_module`] is acyclic.
#[derive(Clone, Default)]
pub struct ModuleGraph {
    inner: StableDiGraph<Module, ()>,
    by_path: HashMap<PathBuf, ModuleId>,
    by_name: HashMap<String, ModuleId>,
}

impl std::fmt::Debug for ModuleGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleGraph")
            .field("module_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

fn index(id: ModuleId) -> NodeIndex {
    NodeIndex::new(id.0 as usize)
}

fn handle(idx: NodeIndex) -> ModuleId {
    ModuleId(idx.index() as u32)
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module depending on already-present modules.
    pub fn add_module(
        &mut self,
        module: Module,
        dependencies: &[ModuleId],
    ) -> Result<ModuleId, GraphError> {
        if module.files().is_empty() {
            return Err(GraphError::EmptyModule {
                name: module.name().to_string(),
            });
        }
        if let Some(existing) = self.by_path.get(module.path()) {
            return Err(GraphError::DuplicatePath {
                path: module.path().to_path_buf(),
                existing: self[*existing].name().to_string(),
            });
        }
        if let Some(existing) = self.by_name.get(module.name()) {
            return Err(GraphError::DuplicateName {
                name: module.name().to_string(),
                first: self[*existing].path().to_path_buf(),
                second: module.path().to_path_buf(),
            });
        }
        if let Some(unknown) = dependencies.iter().find(|dep| self.module(**dep).is_none()) {
            return Err(GraphError::UnknownModule {
                name: module.name().to_string(),
                dependency: *unknown,
            });
        }

        let path = module.path().to_path_buf();
        let name = module.name().to_string();
        let id = handle(self.inner.add_node(module));
        let mut seen = Vec::with_capacity(dependencies.len());
        for dep in dependencies {
            if !seen.contains(dep) {
                self.inner.add_edge(index(id), index(*dep), ());
                seen.push(*dep);
            }
        }
        self.by_path.insert(path, id);
        self.by_name.insert(name, id);
        Ok(id)
    }

    /// Get a module by ID.
    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        self.inner.node_weight(index(id))
    }

    /// Total number of modules.
    pub fn len(&self) -> usize {
        self.inner.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.node_count() == 0
    }

    /// Module handles in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.inner.node_indices().map(handle)
    }

    /// Direct dependencies, sorted by name.
    pub fn dependencies(&self, id: ModuleId) -> Vec<ModuleId> {
        self.sorted_neighbors(id, Direction::Outgoing)
    }

    /// Modules that list `id` as a direct dependency, sorted by name.
    pub fn dependents(&self, id: ModuleId) -> Vec<ModuleId> {
        self.sorted_neighbors(id, Direction::Incoming)
    }

    fn sorted_neighbors(&self, id: ModuleId, direction: Direction) -> Vec<ModuleId> {
        let mut neighbors: Vec<ModuleId> = self
            .inner
            .neighbors_directed(index(id), direction)
            .map(handle)
            .collect();
        neighbors.sort_by(|a, b| {
            let (a, b) = (&self[*a], &self[*b]);
            a.name().cmp(b.name()).then_with(|| a.path().cmp(b.path()))
        });
        neighbors
    }

    pub fn find_by_name(&self, name: &str) -> Option<ModuleId> {
        self.by_name.get(name).copied()
    }

    pub fn find_by_path(&self, path: &Path) -> Option<ModuleId> {
        self.by_path.get(path).copied()
    }

    /// Modules nothing depends on, sorted by name.
    pub fn tips(&self) -> Vec<ModuleId> {
        let mut tips: Vec<ModuleId> = self
            .ids()
            .filter(|id| {
                self.inner
                    .neighbors_directed(index(*id), Direction::Incoming)
                    .next()
                    .is_none()
            })
            .collect();
        tips.sort_by(|a, b| self[*a].name().cmp(self[*b].name()));
        tips
    }

    /// Everything reachable from `roots`, dependencies first.
    pub fn flattened(&self, roots: &[ModuleId]) -> Result<Vec<ModuleId>, CycleDetected> {
        topologically_sorted(
            roots.iter().copied(),
            |id| self[*id].name().to_string(),
            |id| self.dependencies(*id),
        )
    }

    /// The dependency-free part of [`ModuleGraph::flattened`].
    pub fn bases(&self, roots: &[ModuleId]) -> Result<Vec<ModuleId>, CycleDetected> {
        Ok(self
            .flattened(roots)?
            .into_iter()
            .filter(|id| self.dependencies(*id).is_empty())
            .collect())
    }

    pub fn fingerprint(&self, id: ModuleId) -> ModuleFingerprint {
        let module = &self[id];
        ModuleFingerprint {
            name: module.name().to_string(),
            path: module.path().to_path_buf(),
            files: module.files().to_vec(),
            dependencies: self
                .dependencies(id)
                .into_iter()
                .map(|dep| self[dep].path().to_path_buf())
                .collect(),
        }
    }

    /// Value snapshot of everything reachable from `tips`.
    pub fn snapshot(&self, tips: &[ModuleId]) -> Result<ForestSnapshot, CycleDetected> {
        let modules = self
            .flattened(tips)?
            .into_iter()
            .map(|id| self.fingerprint(id));
        let tips = tips.iter().map(|id| self[*id].path().to_path_buf());
        Ok(ForestSnapshot::new(tips, modules))
    }

    /// Render `id` and its dependency tree, one module per line.
    pub fn render_tree(&self, id: ModuleId) -> String {
        let mut out = format!("{}\n", self[id].name());
        self.render_children(id, "", &mut out);
        out
    }

    fn render_children(&self, id: ModuleId, prefix: &str, out: &mut String) {
        let children = self.dependencies(id);
        for (i, child) in children.iter().enumerate() {
            let last = i + 1 == children.len();
            let hanger = if last { "└── " } else { "├── " };
            out.push_str(prefix);
            out.push_str(hanger);
            out.push_str(self[*child].name());
            out.push('\n');
            let indent = if last { "    " } else { "│   " };
            self.render_children(*child, &format!("{prefix}{indent}"), out);
        }
    }
}

impl std::ops::Index<ModuleId> for ModuleGraph {
    type Output = Module;

    fn index(&self, id: ModuleId) -> &Module {
        &self.inner[index(id)]
    }
}

/// The result of one inference pass: a graph plus its tips, the deepest
/// file-bearing module on every branch.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    graph: ModuleGraph,
    tips: Vec<ModuleId>,
}

impl Forest {
    pub fn new(graph: ModuleGraph, tips: Vec<ModuleId>) -> Self {
        Forest { graph, tips }
    }

    pub fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    pub fn tips(&self) -> &[ModuleId] {
        &self.tips
    }

    pub fn flattened(&self) -> Result<Vec<ModuleId>, CycleDetected> {
        self.graph.flattened(&self.tips)
    }

    pub fn bases(&self) -> Result<Vec<ModuleId>, CycleDetected> {
        self.graph.bases(&self.tips)
    }

    pub fn snapshot(&self) -> Result<ForestSnapshot, CycleDetected> {
        self.graph.snapshot(&self.tips)
    }

    /// Find a module anywhere in the forest by name.
    pub fn find(&self, name: &str) -> Option<&Module> {
        self.graph.find_by_name(name).map(|id| &self.graph[id])
    }
}
