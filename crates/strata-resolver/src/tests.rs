//! Unit tests for strata-resolver

use std::fs;
use std::path::{Path, PathBuf};

use strata_core::{Constraint, LanguageVersion, PackageRequirement, Version};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::adapter::Adapter;
use crate::error::{AdapterError, ResolveError};
use crate::graph::*;
use crate::resolver::{NoResolver, PackageResolver, StaticResolver};

const KIT: &str = "acme\u{2215}Kit-1.2.0";
const LOG: &str = "acme\u{2215}Log-0.3.0.swift";

fn write(root: &Path, relative: &str, body: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn library(name: &str, root: PathBuf, sources: &[&str], deps: Vec<TargetDependency>) -> ResolvedTarget {
    ResolvedTarget {
        name: name.to_string(),
        kind: TargetKind::Library,
        sources_root: root,
        sources: sources.iter().map(PathBuf::from).collect(),
        dependencies: deps,
    }
}

fn target_dep(name: &str) -> TargetDependency {
    TargetDependency::Target {
        name: name.to_string(),
    }
}

/// Two packages checked out under `checkouts`: Kit (two library targets and
/// a test target) depending on Log (one single-file library).
fn sample(checkouts: &Path) -> ResolvedGraph {
    write(checkouts, "Kit/Sources/KitCore/a.swift", "// a\n");
    write(checkouts, "Kit/Sources/KitCore/sub/b.swift", "// b\n");
    write(checkouts, "Kit/Sources/Kit/kit.swift", "// kit\n");
    write(checkouts, "Kit/Tests/KitTests/t.swift", "// t\n");
    write(checkouts, "Log/Sources/Log/Log.swift", "// log\n");

    let kit = ResolvedPackage {
        name: "Kit".to_string(),
        url: "https://github.com/acme/Kit.git".to_string(),
        path: checkouts.join("Kit"),
        version: Some(Version::new(1, 2, 0)),
        language_versions: vec![],
        tools_version: Some("5.0".to_string()),
        targets: vec![
            library("KitCore", checkouts.join("Kit/Sources/KitCore"), &["a.swift", "sub/b.swift"], vec![]),
            library(
                "Kit",
                checkouts.join("Kit/Sources/Kit"),
                &["kit.swift"],
                vec![
                    target_dep("KitCore"),
                    TargetDependency::Product {
                        name: "Log".to_string(),
                        package: Some("Log".to_string()),
                    },
                ],
            ),
            ResolvedTarget {
                name: "KitTests".to_string(),
                kind: TargetKind::Test,
                sources_root: checkouts.join("Kit/Tests/KitTests"),
                sources: vec![PathBuf::from("t.swift")],
                dependencies: vec![target_dep("Kit")],
            },
        ],
        products: vec![ResolvedProduct {
            name: "Kit".to_string(),
            targets: vec!["Kit".to_string()],
        }],
        dependencies: vec!["Log".to_string()],
    };
    let log = ResolvedPackage {
        name: "Log".to_string(),
        url: "https://github.com/acme/Log.git".to_string(),
        path: checkouts.join("Log"),
        version: Some(Version::new(0, 3, 0)),
        language_versions: vec!["4".to_string(), "4.2".to_string()],
        tools_version: None,
        targets: vec![library("Log", checkouts.join("Log/Sources/Log"), &["Log.swift"], vec![])],
        products: vec![ResolvedProduct {
            name: "Log".to_string(),
            targets: vec!["Log".to_string()],
        }],
        dependencies: vec![],
    };
    ResolvedGraph {
        roots: vec!["Kit".to_string()],
        packages: vec![kit, log],
    }
}

fn names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_adapt_builds_library_modules() {
    let dir = TempDir::new().unwrap();
    let resolved = sample(&dir.path().join("checkouts"));
    let mirror = dir.path().join("Dependencies");

    let adaptation = Adapter::new(&mirror).adapt(&resolved, &CancellationToken::new()).unwrap();
    let manifest = &adaptation.manifest;

    let order: Vec<&str> = manifest.modules().map(|m| m.name()).collect();
    assert_eq!(order, vec!["KitCore", "Log", "Kit"]);
    assert_eq!(manifest.imports(), ["KitCore", "Kit"]);

    let graph = manifest.graph();
    let kit = graph.find_by_name("Kit").unwrap();
    let deps: Vec<&str> = graph.dependencies(kit).into_iter().map(|d| graph[d].name()).collect();
    assert_eq!(deps, vec!["KitCore", "Log"]);
    assert_eq!(graph[kit].path(), mirror.join(KIT).join("Kit"));
    assert_eq!(graph[kit].language_version(), Some(LanguageVersion::V5));

    let core = &graph[graph.find_by_name("KitCore").unwrap()];
    assert_eq!(core.relative_files(), vec!["a.swift", "sub/b.swift"]);

    let log = &graph[graph.find_by_name("Log").unwrap()];
    assert_eq!(log.path(), mirror.join(LOG));
    assert_eq!(log.directory(), mirror);
    assert_eq!(log.files(), [mirror.join(LOG)]);
    assert_eq!(log.relative_files(), vec![LOG]);
    assert_eq!(log.language_version(), Some(LanguageVersion::V4_2));

    assert!(graph.find_by_name("KitTests").is_none());

    let packages: Vec<(&str, &[String])> = manifest
        .packages()
        .iter()
        .map(|p| (p.name.as_str(), p.module_names.as_slice()))
        .collect();
    assert_eq!(packages[0].0, "acme/Kit");
    assert_eq!(packages[0].1, ["KitCore", "Kit"]);
    assert_eq!(packages[1].0, "acme/Log");
}

/// A package named `name` whose only library is the single file `<name>.swift`.
fn single_file_package(checkouts: &Path, name: &str) -> ResolvedPackage {
    let file = format!("{name}.swift");
    write(checkouts, &format!("{name}/Sources/{name}/{file}"), "// one\n");
    ResolvedPackage {
        name: name.to_string(),
        url: format!("https://github.com/acme/{name}.git"),
        path: checkouts.join(name),
        version: Some(Version::new(1, 0, 0)),
        language_versions: vec![],
        tools_version: None,
        targets: vec![library(
            name,
            checkouts.join(format!("{name}/Sources/{name}")),
            &[file.as_str()],
            vec![],
        )],
        products: vec![ResolvedProduct {
            name: name.to_string(),
            targets: vec![name.to_string()],
        }],
        dependencies: vec![],
    }
}

#[test]
fn test_single_file_packages_share_the_mirror_root() {
    let dir = TempDir::new().unwrap();
    let checkouts = dir.path().join("checkouts");
    let resolved = ResolvedGraph {
        roots: vec!["Alpha".to_string(), "Beta".to_string()],
        packages: vec![
            single_file_package(&checkouts, "Alpha"),
            single_file_package(&checkouts, "Beta"),
        ],
    };
    let mirror = dir.path().join("Dependencies");

    let adaptation = Adapter::new(&mirror).adapt(&resolved, &CancellationToken::new()).unwrap();
    let manifest = &adaptation.manifest;
    let paths: Vec<PathBuf> = manifest.modules().map(|m| m.path().to_path_buf()).collect();
    assert_eq!(
        paths,
        vec![
            mirror.join("acme\u{2215}Alpha-1.0.0.swift"),
            mirror.join("acme\u{2215}Beta-1.0.0.swift"),
        ]
    );
    assert!(manifest.modules().all(|m| m.directory() == mirror));

    let decoded = strata_core::DependencyManifest::from_json(&manifest.to_json().unwrap()).unwrap();
    assert_eq!(decoded.snapshot(), manifest.snapshot());
    let files: Vec<&[PathBuf]> = decoded.modules().map(|m| m.files()).collect();
    assert_eq!(files, vec![&paths[..1], &paths[1..]]);

    adaptation.mirror.commit().unwrap();
    assert!(paths.iter().all(|p| p.is_file()));
}

#[test]
fn test_nothing_is_mirrored_before_commit() {
    let dir = TempDir::new().unwrap();
    let resolved = sample(&dir.path().join("checkouts"));
    let mirror = dir.path().join("Dependencies");

    let adaptation = Adapter::new(&mirror).adapt(&resolved, &CancellationToken::new()).unwrap();
    assert!(!mirror.join(KIT).exists());
    assert_eq!(adaptation.mirror.staged().len(), 2);

    adaptation.mirror.commit().unwrap();
    assert_eq!(names(&mirror), vec![KIT.to_string(), LOG.to_string()]);
    assert_eq!(
        fs::read_to_string(mirror.join(KIT).join("KitCore/sub/b.swift")).unwrap(),
        "// b\n"
    );
    assert_eq!(fs::read_to_string(mirror.join(LOG)).unwrap(), "// log\n");
}

#[test]
fn test_dropped_stage_leaves_no_trace() {
    let dir = TempDir::new().unwrap();
    let resolved = sample(&dir.path().join("checkouts"));
    let mirror = dir.path().join("Dependencies");

    let adaptation = Adapter::new(&mirror).adapt(&resolved, &CancellationToken::new()).unwrap();
    drop(adaptation);
    assert!(names(&mirror).is_empty());
}

#[test]
fn test_restaging_identical_content_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let resolved = sample(&dir.path().join("checkouts"));
    let adapter = Adapter::new(dir.path().join("Dependencies"));
    let cancel = CancellationToken::new();

    let first = adapter.adapt(&resolved, &cancel).unwrap();
    let first_json = first.manifest.to_json().unwrap();
    first.mirror.commit().unwrap();

    let second = adapter.adapt(&resolved, &cancel).unwrap();
    assert!(second.mirror.staged().is_empty());
    assert_eq!(second.manifest.to_json().unwrap(), first_json);
}

#[test]
fn test_changed_source_is_restaged() {
    let dir = TempDir::new().unwrap();
    let checkouts = dir.path().join("checkouts");
    let resolved = sample(&checkouts);
    let adapter = Adapter::new(dir.path().join("Dependencies"));
    let cancel = CancellationToken::new();
    adapter.adapt(&resolved, &cancel).unwrap().mirror.commit().unwrap();

    write(&checkouts, "Kit/Sources/KitCore/a.swift", "// a, edited\n");
    let again = adapter.adapt(&resolved, &cancel).unwrap();
    assert_eq!(again.mirror.staged(), [KIT.to_string()]);
    again.mirror.commit().unwrap();
    assert_eq!(
        fs::read_to_string(dir.path().join("Dependencies").join(KIT).join("KitCore/a.swift")).unwrap(),
        "// a, edited\n"
    );
}

#[test]
fn test_removed_package_is_pruned() {
    let dir = TempDir::new().unwrap();
    let mut resolved = sample(&dir.path().join("checkouts"));
    let mirror = dir.path().join("Dependencies");
    let adapter = Adapter::new(&mirror);
    let cancel = CancellationToken::new();
    adapter.adapt(&resolved, &cancel).unwrap().mirror.commit().unwrap();

    let kit = &mut resolved.packages[0];
    kit.dependencies.clear();
    kit.targets[1].dependencies.truncate(1);
    resolved.packages.truncate(1);

    adapter.adapt(&resolved, &cancel).unwrap().mirror.commit().unwrap();
    assert_eq!(names(&mirror), vec![KIT.to_string()]);
}

#[test]
fn test_zero_dependencies_remove_the_mirror_root() {
    let dir = TempDir::new().unwrap();
    let resolved = sample(&dir.path().join("checkouts"));
    let mirror = dir.path().join("Dependencies");
    let adapter = Adapter::new(&mirror);
    let cancel = CancellationToken::new();
    adapter.adapt(&resolved, &cancel).unwrap().mirror.commit().unwrap();
    assert!(mirror.exists());

    let empty = adapter.adapt(&ResolvedGraph::default(), &cancel).unwrap();
    assert!(empty.manifest.is_empty());
    empty.mirror.commit().unwrap();
    assert!(!mirror.exists());
}

#[test]
fn test_unmapped_target_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut resolved = sample(&dir.path().join("checkouts"));
    resolved.packages[0].targets[1].dependencies.push(target_dep("Ghost"));

    let err = Adapter::new(dir.path().join("Dependencies"))
        .adapt(&resolved, &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, AdapterError::UnmappedTarget { target } if target == "Ghost"));
}

#[test]
fn test_unknown_product_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut resolved = sample(&dir.path().join("checkouts"));
    resolved.packages[0].targets[1].dependencies.push(TargetDependency::Product {
        name: "Missing".to_string(),
        package: None,
    });

    let err = Adapter::new(dir.path().join("Dependencies"))
        .adapt(&resolved, &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, AdapterError::UnknownProduct { ref product, .. } if product == "Missing"));
}

#[test]
fn test_target_cycle_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut resolved = sample(&dir.path().join("checkouts"));
    resolved.packages[0].targets[0].dependencies.push(target_dep("Kit"));

    let err = Adapter::new(dir.path().join("Dependencies"))
        .adapt(&resolved, &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, AdapterError::Cycle(_)));
}

#[test]
fn test_cancelled_adaptation_stages_nothing() {
    let dir = TempDir::new().unwrap();
    let resolved = sample(&dir.path().join("checkouts"));
    let mirror = dir.path().join("Dependencies");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = Adapter::new(&mirror).adapt(&resolved, &cancel).unwrap_err();
    assert!(err.is_cancelled());
    assert!(!mirror.exists());
}

#[test]
fn test_static_resolver() {
    let graph = ResolvedGraph {
        roots: vec!["Kit".to_string()],
        packages: vec![],
    };
    let resolver = StaticResolver::new(graph.clone());
    let cancel = CancellationToken::new();
    assert_eq!(resolver.resolve(&[], Path::new("/"), &cancel).unwrap(), graph);

    cancel.cancel();
    assert!(matches!(
        resolver.resolve(&[], Path::new("/"), &cancel),
        Err(ResolveError::Cancelled)
    ));
}

#[test]
fn test_no_resolver_only_resolves_nothing() {
    let cancel = CancellationToken::new();
    let boxed: Box<dyn PackageResolver> = Box::new(NoResolver);
    assert_eq!(
        boxed.resolve(&[], Path::new("/"), &cancel).unwrap(),
        ResolvedGraph::default()
    );

    let requirements = vec![PackageRequirement::new(
        "../Kit",
        Constraint::Branch("main".to_string()),
    )];
    let err = boxed.resolve(&requirements, Path::new("/"), &cancel).unwrap_err();
    assert!(matches!(err, ResolveError::NotConfigured { count: 1 }));
}

#[test]
fn test_resolved_graph_json_shape() {
    let json = r#"{
        "roots": ["Log"],
        "packages": [{
            "name": "Log",
            "url": "../Log",
            "path": "/checkouts/Log",
            "version": "0.3.0",
            "languageVersions": ["5"],
            "targets": [{
                "name": "Log",
                "kind": "library",
                "sourcesRoot": "/checkouts/Log/Sources/Log",
                "sources": ["Log.swift"],
                "dependencies": [{"type": "product", "name": "Kit", "package": "Kit"}]
            }]
        }]
    }"#;
    let graph: ResolvedGraph = serde_json::from_str(json).unwrap();
    let package = &graph.packages[0];
    assert_eq!(package.language_version(), Some(LanguageVersion::V5));
    assert_eq!(
        package.targets[0].dependencies,
        vec![TargetDependency::Product {
            name: "Kit".to_string(),
            package: Some("Kit".to_string()),
        }]
    );
    assert_eq!(package.targets[0].single_file(), Some(PathBuf::from("/checkouts/Log/Sources/Log/Log.swift")));
}

#[test]
fn test_c99_names() {
    assert_eq!(c99_name("Path.swift"), "Path_swift");
    assert_eq!(c99_name("3D-Kit"), "_3D_Kit");
}

#[cfg(unix)]
mod command {
    use super::*;
    use crate::resolver::{CommandResolver, REQUIREMENTS_FILE};
    use strata_core::cache_dir;

    fn shell(script: &str) -> CommandResolver {
        CommandResolver::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    #[test]
    fn test_command_output_is_parsed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("graph.json"), r#"{"roots":[],"packages":[]}"#).unwrap();
        let requirements = vec![PackageRequirement::new(
            "https://github.com/acme/Log.git",
            Constraint::From(Version::new(0, 3, 0)),
        )];

        let graph = shell("cat graph.json")
            .resolve(&requirements, dir.path(), &CancellationToken::new())
            .unwrap();
        assert_eq!(graph, ResolvedGraph::default());

        let written = fs::read_to_string(cache_dir(dir.path()).join(REQUIREMENTS_FILE)).unwrap();
        let back: Vec<PackageRequirement> = serde_json::from_str(&written).unwrap();
        assert_eq!(back, requirements);
    }

    #[test]
    fn test_command_failure_carries_stderr() {
        let dir = TempDir::new().unwrap();
        let err = shell("echo boom >&2; exit 3")
            .resolve(&[], dir.path(), &CancellationToken::new())
            .unwrap_err();
        match err {
            ResolveError::CommandFailed { status, stderr, .. } => {
                assert_eq!(status, Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_cancelled_command_is_killed() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = shell("sleep 30").resolve(&[], dir.path(), &cancel).unwrap_err();
        assert!(matches!(err, ResolveError::Cancelled));
    }

    #[test]
    fn test_missing_program() {
        let dir = TempDir::new().unwrap();
        let err = CommandResolver::new("/nonexistent/strata-resolve", vec![])
            .resolve(&[], dir.path(), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, ResolveError::Spawn { .. }));
    }
}
