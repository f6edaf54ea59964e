//! CLI command implementations

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use strata_core::{DependencyCache, Modelizer};
use strata_processor::{
    ErrorClass, GenerateMode, Generation, JsonProjectWriter, Outcome, Processor, ProjectConfig,
    ProjectLayout, load_config,
};
use strata_resolver::{CommandResolver, NoResolver, PackageResolver};
use strata_watcher::{PassOutcome, WatcherService};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

type CliProcessor = Processor<Box<dyn PackageResolver>, JsonProjectWriter>;

/// The resolver command is read once; changing it needs a restart.
fn open(root: &Path) -> anyhow::Result<CliProcessor> {
    let loaded = load_config(root)?;
    let layout = ProjectLayout::new(root, &loaded.config.options);
    Ok(Processor::new(
        root,
        resolver(&loaded.config),
        JsonProjectWriter::new(layout.project_path),
    ))
}

fn resolver(config: &ProjectConfig) -> Box<dyn PackageResolver> {
    match CommandResolver::from_command_line(&config.resolver.command) {
        Some(command) => Box::new(command),
        None => Box::new(NoResolver),
    }
}

fn report(generation: &Generation) {
    let reasons: Vec<String> = generation.reasons.iter().map(ToString::to_string).collect();
    println!(
        "Generated {} modules, {} dependency modules ({})",
        generation.modules,
        generation.dependencies,
        reasons.join(", ")
    );
    for path in &generation.diff.added {
        println!("  + {}", path.display());
    }
    for path in &generation.diff.removed {
        println!("  - {}", path.display());
    }
    for path in &generation.diff.changed {
        println!("  ~ {}", path.display());
    }
}

fn explain(error: strata_processor::ProcessorError) -> anyhow::Error {
    let hint = match error.class() {
        ErrorClass::InputAbsent => "add source files under the models directory",
        ErrorClass::InvalidInput => "fix Strata.toml or the source tree",
        ErrorClass::Compatibility => "use a tool version the project accepts",
        ErrorClass::InternalConsistency => "the resolver produced an inconsistent graph",
        ErrorClass::Io | ErrorClass::Cancelled => return error.into(),
    };
    anyhow::Error::new(error).context(hint)
}

pub async fn generate(root: PathBuf, force: bool) -> anyhow::Result<()> {
    let mode = if force {
        GenerateMode::Force
    } else {
        GenerateMode::Incremental
    };
    let outcome = tokio::task::spawn_blocking(move || {
        let mut processor = open(&root)?;
        processor
            .generate(mode, &CancellationToken::new())
            .map_err(explain)
    })
    .await??;

    match outcome {
        Outcome::UpToDate => println!("Up to date"),
        Outcome::Regenerated(generation) => report(&generation),
    }
    Ok(())
}

pub async fn watch(root: PathBuf, debounce: u64) -> anyhow::Result<()> {
    tracing::info!("Starting watcher for: {}", root.display());

    let processor = tokio::task::spawn_blocking(move || {
        let mut processor = open(&root)?;
        match processor.generate(GenerateMode::Incremental, &CancellationToken::new()) {
            Ok(Outcome::Regenerated(generation)) => report(&generation),
            Ok(Outcome::UpToDate) => println!("Up to date"),
            Err(e) => tracing::error!("Initial generation failed: {}", e),
        }
        anyhow::Ok(processor)
    })
    .await??;

    let service = WatcherService::new(processor).with_debounce(Duration::from_millis(debounce));
    let mut outcomes = service.subscribe();
    tokio::spawn(async move {
        loop {
            match outcomes.recv().await {
                Ok(PassOutcome::Regenerated { generation, .. }) => report(&generation),
                Ok(PassOutcome::Failed { message, class, .. }) => {
                    eprintln!("Generation failed ({:?}): {}", class, message)
                }
                Ok(PassOutcome::UpToDate { .. } | PassOutcome::Cancelled { .. }) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Skipped {} pass outcomes", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.cancel();
        }
    });

    service.watch(shutdown).await
}

pub fn modules(root: PathBuf) -> anyhow::Result<()> {
    let options = load_config(&root)?.config.options;
    let layout = ProjectLayout::new(&root, &options);
    let forest = Modelizer::new(layout.models_dir.clone(), options.base_module_name)
        .with_extension(options.source_extension)
        .with_exclude(options.exclude.as_slice())?
        .modelize()
        .with_context(|| format!("inferring modules under {}", layout.models_dir.display()))?;

    let graph = forest.graph();
    for tip in forest.tips() {
        print!("{}", graph.render_tree(*tip));
    }
    let flattened = forest.flattened()?;
    let bases: Vec<&str> = forest.bases()?.iter().map(|id| graph[*id].name()).collect();
    println!(
        "{} modules, {} tips, bases: {}",
        flattened.len(),
        forest.tips().len(),
        bases.join(", ")
    );
    Ok(())
}

pub fn deps(root: PathBuf) -> anyhow::Result<()> {
    let Some(cache) = DependencyCache::load(&root)? else {
        println!("No dependencies resolved yet; run `strata generate`");
        return Ok(());
    };
    let manifest = cache.manifest()?;
    println!("imports: {}", manifest.imports().join(", "));
    for package in manifest.packages() {
        let version = package
            .version
            .as_ref()
            .map_or_else(|| "unversioned".to_string(), ToString::to_string);
        println!(
            "{} {} ({}) -> {}",
            package.name,
            version,
            package.path.display(),
            package.module_names.join(", ")
        );
    }
    for module in manifest.modules() {
        println!("  {} {}", module.name(), module.path().display());
    }
    Ok(())
}

pub fn clean(root: PathBuf) -> anyhow::Result<()> {
    tracing::info!("Cleaning: {}", root.display());
    open(&root)?.clean()?;
    Ok(())
}
