//! Error types for configuration loading and validation.

use std::path::PathBuf;

use strata_core::{Version, VersionRange};

/// Errors that can occur when loading or validating a `Strata.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    Validation(String),
}

/// The configuration asks for a tool version this build does not satisfy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("project requires tool version {required}, this is {available}")]
pub struct IncompatibleToolVersion {
    pub required: VersionRange,
    pub available: Version,
}
