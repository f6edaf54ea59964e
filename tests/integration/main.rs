//! Integration tests for Strata
//!
//! These drive the processor, resolver and watcher together against real
//! project directories.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use strata_core::{DependencyCache, DependencyManifest, Modelizer, ModuleId, Version};
use strata_processor::{
    CONFIG_FILE, GenerateMode, Generation, JsonProjectWriter, Outcome, Processor, ProjectLayout,
    Reason, Trigger, load_config,
};
use strata_resolver::{
    CommandResolver, NoResolver, PackageResolver, ResolvedGraph, ResolvedPackage,
    ResolvedProduct, ResolvedTarget, TargetKind,
};
use strata_watcher::{PassOutcome, WatcherService};
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

fn write(root: &Path, relative: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, format!("// {relative}\n")).unwrap();
}

fn project(files: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for file in files {
        write(dir.path(), &format!("Sources/Model/{file}"));
    }
    dir
}

/// Builds a processor the way the `strata` binary does.
fn open(root: &Path) -> Processor<Box<dyn PackageResolver>, JsonProjectWriter> {
    let loaded = load_config(root).unwrap();
    let layout = ProjectLayout::new(root, &loaded.config.options);
    let resolver: Box<dyn PackageResolver> =
        match CommandResolver::from_command_line(&loaded.config.resolver.command) {
            Some(command) => Box::new(command),
            None => Box::new(NoResolver),
        };
    Processor::new(root, resolver, JsonProjectWriter::new(layout.project_path))
}

fn regenerated(outcome: Outcome) -> Generation {
    match outcome {
        Outcome::Regenerated(generation) => generation,
        Outcome::UpToDate => panic!("expected a regeneration"),
    }
}

fn project_json(root: &Path) -> Value {
    let path = root.join(".strata/project.json");
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn target_names(root: &Path) -> Vec<String> {
    project_json(root)["targets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect()
}

fn widgets(checkouts: &Path) -> ResolvedGraph {
    write(checkouts, "Widgets/Sources/Widgets/Button.swift");
    write(checkouts, "Widgets/Sources/Widgets/Label.swift");
    ResolvedGraph {
        roots: vec!["Widgets".to_string()],
        packages: vec![ResolvedPackage {
            name: "Widgets".to_string(),
            url: "https://example.com/acme/Widgets.git".to_string(),
            path: checkouts.join("Widgets"),
            version: Some(Version::new(2, 1, 0)),
            language_versions: vec!["5".to_string()],
            tools_version: None,
            targets: vec![ResolvedTarget {
                name: "Widgets".to_string(),
                kind: TargetKind::Library,
                sources_root: checkouts.join("Widgets/Sources/Widgets"),
                sources: vec![PathBuf::from("Button.swift"), PathBuf::from("Label.swift")],
                dependencies: vec![],
            }],
            products: vec![ResolvedProduct {
                name: "Widgets".to_string(),
                targets: vec!["Widgets".to_string()],
            }],
            dependencies: vec![],
        }],
    }
}

/// A project whose resolver is a shell script that logs each run and prints
/// a prepared graph.
#[cfg(unix)]
fn scripted_project(checkouts: &Path) -> TempDir {
    let dir = project(&["Base.swift", "Feature/Screen.swift"]);
    let graph = serde_json::to_string(&widgets(checkouts)).unwrap();
    fs::write(dir.path().join("graph.json"), graph).unwrap();
    fs::write(
        dir.path().join(CONFIG_FILE),
        r#"
[[dependencies]]
url = "https://example.com/acme/Widgets.git"
from = "2.0.0"

[resolver]
command = ["sh", "-c", "echo run >> calls.log && cat graph.json"]
"#,
    )
    .unwrap();
    dir
}

#[cfg(unix)]
fn resolver_runs(root: &Path) -> usize {
    fs::read_to_string(root.join("calls.log"))
        .map(|log| log.lines().count())
        .unwrap_or(0)
}

#[cfg(unix)]
#[test]
fn test_command_resolver_pipeline() {
    let checkouts = TempDir::new().unwrap();
    let dir = scripted_project(checkouts.path());
    let cancel = CancellationToken::new();

    let mut processor = open(dir.path());
    let generation = regenerated(processor.generate(GenerateMode::Incremental, &cancel).unwrap());
    assert_eq!(generation.reasons, vec![Reason::ColdStart]);
    assert!(generation.resolved);
    assert_eq!(generation.modules, 2);
    assert_eq!(generation.dependencies, 1);
    assert_eq!(resolver_runs(dir.path()), 1);
    assert!(dir.path().join(".strata/requirements.json").is_file());

    assert_eq!(target_names(dir.path()), vec!["Widgets", "Bakeware", "Feature"]);
    let project = project_json(dir.path());
    assert_eq!(project["imports"], serde_json::json!(["Widgets"]));
    assert_eq!(project["targets"][0]["external"], Value::Bool(true));

    assert_eq!(
        processor.generate(GenerateMode::Incremental, &cancel).unwrap(),
        Outcome::UpToDate
    );
    assert_eq!(resolver_runs(dir.path()), 1);

    // A fresh process picks up the persisted manifest instead of resolving.
    let mut restarted = open(dir.path());
    let generation = regenerated(restarted.generate(GenerateMode::Incremental, &cancel).unwrap());
    assert!(!generation.resolved);
    assert_eq!(generation.dependencies, 1);
    assert_eq!(resolver_runs(dir.path()), 1);

    regenerated(restarted.generate(GenerateMode::Force, &cancel).unwrap());
    assert_eq!(resolver_runs(dir.path()), 2);
}

#[cfg(unix)]
#[test]
fn test_failing_resolver_leaves_nothing_behind() {
    let dir = project(&["Base.swift"]);
    fs::write(
        dir.path().join(CONFIG_FILE),
        r#"
[[dependencies]]
url = "https://example.com/acme/Widgets.git"
from = "2.0.0"

[resolver]
command = ["sh", "-c", "echo 'no network' >&2; exit 3"]
"#,
    )
    .unwrap();

    let mut processor = open(dir.path());
    let err = processor
        .generate(GenerateMode::Incremental, &CancellationToken::new())
        .unwrap_err();
    assert_eq!(err.class(), strata_processor::ErrorClass::Io);
    assert!(err.to_string().contains("no network"));
    assert!(!dir.path().join(".strata/project.json").exists());
    assert!(!dir.path().join("Dependencies").exists());
}

#[test]
fn test_dependencies_without_resolver_are_rejected() {
    let dir = project(&["Base.swift"]);
    fs::write(
        dir.path().join(CONFIG_FILE),
        "[[dependencies]]\nurl = \"https://example.com/acme/Widgets.git\"\nfrom = \"2.0.0\"\n",
    )
    .unwrap();

    let err = open(dir.path())
        .generate(GenerateMode::Incremental, &CancellationToken::new())
        .unwrap_err();
    assert_eq!(err.class(), strata_processor::ErrorClass::InvalidInput);
}

#[test]
fn test_layered_tree_becomes_a_module_chain() {
    let dir = project(&[
        "Base.swift",
        "Network/Client.swift",
        "Network/Cache/Store.swift",
        "shared/Settings/Prefs.swift",
    ]);
    let models = dir.path().join("Sources/Model");

    let mut processor = open(dir.path());
    let generation = regenerated(
        processor
            .generate(GenerateMode::Incremental, &CancellationToken::new())
            .unwrap(),
    );
    assert_eq!(generation.modules, 4);

    let forest = processor.forest().unwrap();
    let graph = forest.graph();
    let name = |id: ModuleId| graph[id].name().to_string();

    let cache = forest.find("Cache").unwrap();
    assert_eq!(cache.path(), models.join("Network/Cache"));

    // The file-less `shared` directory is skipped over: `Settings` sits
    // directly on top of the base module.
    let settings = graph.find_by_name("Settings").unwrap();
    let parents: Vec<String> = graph.dependencies(settings).into_iter().map(name).collect();
    assert_eq!(parents, vec!["Bakeware"]);

    let bases: Vec<String> = forest.bases().unwrap().into_iter().map(name).collect();
    assert_eq!(bases, vec!["Bakeware"]);
    assert_eq!(
        target_names(dir.path()),
        vec!["Bakeware", "Network", "Cache", "Settings"]
    );
}

#[test]
fn test_modelizer_matches_generated_targets() {
    let dir = project(&["Base.swift", "Feature/Screen.swift"]);
    let mut processor = open(dir.path());
    processor
        .generate(GenerateMode::Incremental, &CancellationToken::new())
        .unwrap();

    let forest = Modelizer::new(dir.path().join("Sources/Model"), "Bakeware")
        .modelize()
        .unwrap();
    let mut names: Vec<String> = forest
        .flattened()
        .unwrap()
        .into_iter()
        .map(|id| forest.graph()[id].name().to_string())
        .collect();
    names.sort();
    let mut targets = target_names(dir.path());
    targets.sort();
    assert_eq!(names, targets);
}

#[test]
fn test_persisted_manifest_round_trips() {
    use strata_processor::ProcessorState;

    let dir = project(&["Base.swift"]);
    let checkouts = TempDir::new().unwrap();
    fs::write(
        dir.path().join(CONFIG_FILE),
        "[[dependencies]]\nurl = \"https://example.com/acme/Widgets.git\"\nfrom = \"2.0.0\"\n",
    )
    .unwrap();
    let loaded = load_config(dir.path()).unwrap();
    let layout = ProjectLayout::new(dir.path(), &loaded.config.options);
    let resolver = strata_resolver::StaticResolver::new(widgets(checkouts.path()));
    let mut processor = Processor::new(
        dir.path(),
        resolver,
        JsonProjectWriter::new(layout.project_path.clone()),
    );
    processor
        .generate(GenerateMode::Incremental, &CancellationToken::new())
        .unwrap();
    assert_eq!(processor.state(), ProcessorState::Warm);

    let cache = DependencyCache::load(dir.path()).unwrap().unwrap();
    assert_eq!(cache.requirements, loaded.config.dependencies);
    let manifest = cache.manifest().unwrap();
    assert_eq!(manifest.imports(), ["Widgets"]);
    assert_eq!(manifest.encode().unwrap(), cache.document);

    let json = manifest.to_json().unwrap();
    let decoded = DependencyManifest::from_json(&json).unwrap();
    assert_eq!(decoded.snapshot(), manifest.snapshot());
    assert_eq!(decoded.packages()[0].version, Some(Version::new(2, 1, 0)));
}

#[test]
fn test_clean_then_generate_starts_cold() {
    let dir = project(&["Base.swift"]);
    let mut processor = open(dir.path());
    let cancel = CancellationToken::new();
    processor.generate(GenerateMode::Incremental, &cancel).unwrap();
    assert!(dir.path().join(".strata").is_dir());

    processor.clean().unwrap();
    assert!(!dir.path().join(".strata").exists());

    let generation = regenerated(processor.generate(GenerateMode::Incremental, &cancel).unwrap());
    assert_eq!(generation.reasons, vec![Reason::ColdStart]);
    assert!(dir.path().join(".strata/project.json").is_file());
}

async fn next_regeneration(outcomes: &mut broadcast::Receiver<PassOutcome>) -> (Trigger, Generation) {
    loop {
        match outcomes.recv().await.unwrap() {
            PassOutcome::Regenerated {
                trigger,
                generation,
            } => return (trigger, generation),
            PassOutcome::Failed { message, .. } => panic!("pass failed: {message}"),
            _ => {}
        }
    }
}

#[tokio::test]
async fn test_watcher_regenerates_on_new_source() {
    let dir = project(&["Base.swift"]);
    let mut processor = open(dir.path());
    processor
        .generate(GenerateMode::Incremental, &CancellationToken::new())
        .unwrap();

    let service = WatcherService::new(processor).with_debounce(Duration::from_millis(50));
    let mut outcomes = service.subscribe();
    let shutdown = CancellationToken::new();

    let driver = async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        write(dir.path(), "Sources/Model/Profile/Avatar.swift");
        let result =
            tokio::time::timeout(Duration::from_secs(10), next_regeneration(&mut outcomes)).await;
        shutdown.cancel();
        result
    };

    let (watched, result) = tokio::join!(service.watch(shutdown.clone()), driver);
    watched.unwrap();
    let (trigger, generation) = result.expect("watcher did not regenerate in time");
    assert_eq!(trigger, Trigger::Sources);
    assert_eq!(generation.reasons, vec![Reason::ModulesChanged]);
    assert_eq!(target_names(dir.path()), vec!["Bakeware", "Profile"]);
}
