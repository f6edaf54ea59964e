//! Strata CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Keep a generated project in sync with a layered source tree", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Project prefix holding Strata.toml (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Regenerate the project if any input changed
    Generate {
        /// Re-resolve dependencies and regenerate unconditionally
        #[arg(short, long)]
        force: bool,
    },
    /// Regenerate whenever sources or configuration change
    Watch {
        /// Quiet period before a pass starts, in milliseconds
        #[arg(long, default_value = "200")]
        debounce: u64,
    },
    /// Show the modules inferred from the source tree
    Modules,
    /// Show the dependency manifest of the last resolution
    Deps,
    /// Remove the cache and the dependency mirror
    Clean,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !cli.verbose => EnvFilter::new(directives),
        _ => EnvFilter::new(format!("strata={}", log_level)),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::debug!("Strata v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Project root: {}", cli.root.display());

    match cli.command {
        Commands::Generate { force } => commands::generate(cli.root, force).await,
        Commands::Watch { debounce } => commands::watch(cli.root, debounce).await,
        Commands::Modules => commands::modules(cli.root),
        Commands::Deps => commands::deps(cli.root),
        Commands::Clean => commands::clean(cli.root),
        Commands::Version => {
            println!("Strata v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
