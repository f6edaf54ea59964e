//! Error types for package resolution, adaptation and mirroring.

use std::path::PathBuf;

use strata_core::{CycleDetected, GraphError, ManifestError};

/// Errors raised while turning a resolved graph into modules.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// A root or package dependency names a package the graph does not hold.
    #[error("resolved graph references unknown package `{name}`")]
    UnknownPackage { name: String },

    /// A target dependency that no visited package defines.
    #[error("target `{target}` has no package entry in the resolved graph")]
    UnmappedTarget { target: String },

    #[error("product `{product}` is not exported by {}", package.as_deref().unwrap_or("any package"))]
    UnknownProduct {
        product: String,
        package: Option<String>,
    },

    /// The same target name is defined by two packages.
    #[error("target `{target}` is defined by both `{first}` and `{second}`")]
    DuplicateTarget {
        target: String,
        first: String,
        second: String,
    },

    #[error(transparent)]
    Cycle(#[from] CycleDetected),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Mirror(#[from] MirrorError),
}

/// Errors raised while staging or committing mirrored sources.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("mirror I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot copy {} to {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[error("mirroring was cancelled")]
    Cancelled,
}

/// Errors raised by a [`PackageResolver`](crate::resolver::PackageResolver).
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("cannot start resolver `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The resolver ran and reported failure.
    #[error("resolver `{program}` exited with {}: {stderr}", status.map_or_else(|| "a signal".to_string(), |c| format!("status {c}")))]
    CommandFailed {
        program: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("resolver produced an invalid graph: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("resolver I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Requirements were declared but no resolver command is configured.
    #[error("{count} dependencies declared but no resolver command is configured")]
    NotConfigured { count: usize },

    #[error("resolution was cancelled")]
    Cancelled,
}

impl AdapterError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AdapterError::Mirror(MirrorError::Cancelled))
    }
}
