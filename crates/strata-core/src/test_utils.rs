//! Test utilities for Strata

use std::fs;

use tempfile::TempDir;

use crate::graph::Forest;
use crate::model::Module;

/// Create a temporary tree holding `files`, given relative to its root.
///
/// Parent directories are created as needed. Every file gets a one-line body
/// so copies can be compared by content.
pub fn create_fixture(files: &[&str]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for file in files {
        let path = temp_dir.path().join(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, format!("// {file}\n")).unwrap();
    }
    temp_dir
}

/// Look a module up by name, panicking with the available names if absent.
pub fn get<'a>(forest: &'a Forest, name: &str) -> &'a Module {
    forest.find(name).unwrap_or_else(|| {
        let names: Vec<&str> = forest
            .graph()
            .ids()
            .map(|id| forest.graph()[id].name())
            .collect();
        panic!("no module `{name}` in {names:?}")
    })
}

/// Names of the direct dependencies of `name`.
pub fn dependency_names(forest: &Forest, name: &str) -> Vec<String> {
    let graph = forest.graph();
    let id = graph.find_by_name(name).unwrap();
    graph
        .dependencies(id)
        .into_iter()
        .map(|dep| graph[dep].name().to_string())
        .collect()
}

/// Flattened module names, dependencies first.
pub fn flattened_names(forest: &Forest) -> Vec<String> {
    forest
        .flattened()
        .unwrap()
        .into_iter()
        .map(|id| forest.graph()[id].name().to_string())
        .collect()
}

pub fn tip_names(forest: &Forest) -> Vec<String> {
    forest
        .tips()
        .iter()
        .map(|id| forest.graph()[*id].name().to_string())
        .collect()
}
