//! Error types for module inference, graph construction and manifests.

use std::path::PathBuf;

use crate::model::ModuleId;
use crate::topo::CycleDetected;

/// Errors raised while building a [`ModuleGraph`](crate::graph::ModuleGraph).
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A module must own at least one source file.
    #[error("module `{name}` has no source files")]
    EmptyModule { name: String },

    /// Two modules with the same path are the same module.
    #[error("module path {} is already taken by `{existing}`", path.display())]
    DuplicatePath { path: PathBuf, existing: String },

    /// Dependencies are referenced by name, so names must be unique.
    #[error("module name `{name}` is used by both {} and {}", first.display(), second.display())]
    DuplicateName {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// A dependency handle was issued by a different graph.
    #[error("module `{name}` depends on unknown module {dependency:?}")]
    UnknownModule { name: String, dependency: ModuleId },

    #[error(transparent)]
    Cycle(#[from] CycleDetected),
}

/// Errors raised while inferring modules from a directory tree.
#[derive(Debug, thiserror::Error)]
pub enum ModelizeError {
    /// Not a single file-bearing module anywhere under the root.
    #[error("no source files found under {}", .0.display())]
    NoSourceFiles(PathBuf),

    #[error("cannot read directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid exclude pattern `{pattern}`: {reason}")]
    Pattern { pattern: String, reason: String },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Errors raised while encoding, decoding or persisting a dependency manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// A dependency name that no earlier entry defined.
    #[error("module `{module}` references `{dependency}` before it is defined")]
    UnknownDependency { module: String, dependency: String },

    /// The module order handed to the encoder is not dependency-first.
    #[error("module `{module}` is ordered before its dependency `{dependency}`")]
    ForwardReference { module: String, dependency: String },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("malformed manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("manifest I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
