//! Error types for the regeneration pass, and their classification.

use std::path::PathBuf;

use strata_core::{GraphError, ManifestError, ModelizeError};
use strata_resolver::{AdapterError, MirrorError, ResolveError};

use crate::config::ConfigError;
use crate::config::error::IncompatibleToolVersion;

/// Errors raised by an [`ArtifactWriter`](crate::writer::ArtifactWriter).
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error("cannot write project description {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot encode project description: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Everything that can abort a regeneration pass.
///
/// A pass that returns any of these left the cached state, the mirror and the
/// persisted manifest as they were.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Incompatible(#[from] IncompatibleToolVersion),

    #[error(transparent)]
    Modelize(#[from] ModelizeError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Mirror(#[from] MirrorError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Writer(#[from] WriterError),

    /// A local module has the name of a dependency module.
    #[error(
        "module `{name}` at {} has the same name as the dependency module at {}",
        local.display(),
        external.display()
    )]
    ShadowedDependency {
        name: String,
        local: PathBuf,
        external: PathBuf,
    },

    #[error("{} I/O error at {}: {source}", operation, path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("regeneration was cancelled")]
    Cancelled,
}

/// How the caller should react to a failed pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Nothing to work on yet; the caller may offer to scaffold.
    InputAbsent,
    /// The user's configuration or tree needs fixing.
    InvalidInput,
    /// A collaborator produced an inconsistent graph, or a bug.
    InternalConsistency,
    Io,
    Compatibility,
    Cancelled,
}

impl ProcessorError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ProcessorError::Config(ConfigError::Io { .. }) => ErrorClass::Io,
            ProcessorError::Config(_) => ErrorClass::InvalidInput,
            ProcessorError::Incompatible(_) => ErrorClass::Compatibility,
            ProcessorError::Modelize(e) => match e {
                ModelizeError::NoSourceFiles(_) => ErrorClass::InputAbsent,
                ModelizeError::Io { .. } => ErrorClass::Io,
                ModelizeError::Pattern { .. }
                | ModelizeError::Graph(GraphError::DuplicateName { .. })
                | ModelizeError::Graph(GraphError::DuplicatePath { .. }) => {
                    ErrorClass::InvalidInput
                }
                ModelizeError::Graph(_) => ErrorClass::InternalConsistency,
            },
            ProcessorError::Resolve(e) => match e {
                ResolveError::Spawn { .. }
                | ResolveError::CommandFailed { .. }
                | ResolveError::Io { .. } => ErrorClass::Io,
                ResolveError::Parse(_) => ErrorClass::InternalConsistency,
                ResolveError::NotConfigured { .. } => ErrorClass::InvalidInput,
                ResolveError::Cancelled => ErrorClass::Cancelled,
            },
            ProcessorError::Adapter(AdapterError::Mirror(e)) | ProcessorError::Mirror(e) => {
                mirror_class(e)
            }
            ProcessorError::Adapter(AdapterError::Manifest(e)) | ProcessorError::Manifest(e) => {
                manifest_class(e)
            }
            ProcessorError::Adapter(_) => ErrorClass::InternalConsistency,
            ProcessorError::Writer(WriterError::Io { .. }) | ProcessorError::Io { .. } => {
                ErrorClass::Io
            }
            ProcessorError::Writer(WriterError::Serialize(_)) => ErrorClass::InternalConsistency,
            ProcessorError::ShadowedDependency { .. } => ErrorClass::InvalidInput,
            ProcessorError::Cancelled => ErrorClass::Cancelled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.class() == ErrorClass::Cancelled
    }
}

fn mirror_class(error: &MirrorError) -> ErrorClass {
    match error {
        MirrorError::Io { .. } | MirrorError::Copy { .. } => ErrorClass::Io,
        MirrorError::Cancelled => ErrorClass::Cancelled,
    }
}

fn manifest_class(error: &ManifestError) -> ErrorClass {
    match error {
        ManifestError::Io { .. } => ErrorClass::Io,
        _ => ErrorClass::InternalConsistency,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::CycleDetected;

    #[test]
    fn classify_input_absent() {
        let err = ProcessorError::from(ModelizeError::NoSourceFiles(PathBuf::from("/p")));
        assert_eq!(err.class(), ErrorClass::InputAbsent);
        assert_eq!(err.to_string(), "no source files found under /p");
    }

    #[test]
    fn classify_consistency_and_io() {
        let unmapped = ProcessorError::from(AdapterError::UnmappedTarget {
            target: "Kit".to_string(),
        });
        assert_eq!(unmapped.class(), ErrorClass::InternalConsistency);

        let cycle = ProcessorError::from(AdapterError::from(CycleDetected {
            node: "Kit".to_string(),
        }));
        assert_eq!(cycle.class(), ErrorClass::InternalConsistency);

        let copy = ProcessorError::from(AdapterError::from(MirrorError::Copy {
            from: PathBuf::from("/a"),
            to: PathBuf::from("/b"),
            source: std::io::Error::other("disk full"),
        }));
        assert_eq!(copy.class(), ErrorClass::Io);
        assert!(copy.to_string().contains("/a"));
    }

    #[test]
    fn classify_cancelled() {
        assert!(ProcessorError::from(ResolveError::Cancelled).is_cancelled());
        assert!(ProcessorError::from(AdapterError::from(MirrorError::Cancelled)).is_cancelled());
        assert!(!ProcessorError::from(ConfigError::Parse("x".to_string())).is_cancelled());
    }

    #[test]
    fn classify_invalid_input() {
        let err = ProcessorError::from(ModelizeError::Graph(GraphError::DuplicateName {
            name: "Kit".to_string(),
            first: PathBuf::from("/a/Kit"),
            second: PathBuf::from("/b/Kit"),
        }));
        assert_eq!(err.class(), ErrorClass::InvalidInput);

        let shadowed = ProcessorError::ShadowedDependency {
            name: "Kit".to_string(),
            local: PathBuf::from("/p/Sources/Model/Kit"),
            external: PathBuf::from("/p/Dependencies/Kit"),
        };
        assert_eq!(shadowed.class(), ErrorClass::InvalidInput);
        assert_eq!(
            shadowed.to_string(),
            "module `Kit` at /p/Sources/Model/Kit has the same name as the dependency module at /p/Dependencies/Kit"
        );
    }
}
