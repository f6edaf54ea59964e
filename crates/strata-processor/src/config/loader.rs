//! Configuration file loading and validation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use strata_core::{Version, modification_time};

use super::error::{ConfigError, IncompatibleToolVersion};
use super::types::{CONFIG_FILE, ProjectConfig};

/// A parsed configuration and what it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConfig {
    pub path: PathBuf,
    /// `false` when no file exists and defaults are in effect.
    pub exists: bool,
    pub mtime: Option<SystemTime>,
    pub config: ProjectConfig,
}

impl LoadedConfig {
    /// Whether the file changed since this copy was loaded.
    pub fn is_stale(&self) -> bool {
        let exists = self.path.is_file();
        if !exists && !self.exists {
            return false;
        }
        exists != self.exists || crate::is_dirty(modification_time(&self.path), self.mtime)
    }
}

/// Loads and validates `<prefix>/Strata.toml`.
///
/// A missing file yields the default configuration.
pub fn load_config(prefix: &Path) -> Result<LoadedConfig, ConfigError> {
    let path = prefix.join(CONFIG_FILE);
    let mtime = modification_time(&path);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {} at {}, using defaults", CONFIG_FILE, prefix.display());
            return Ok(LoadedConfig {
                path,
                exists: false,
                mtime: None,
                config: ProjectConfig::default(),
            });
        }
        Err(source) => return Err(ConfigError::Io { path, source }),
    };
    let config = load_config_from_str(&content)?;
    Ok(LoadedConfig {
        path,
        exists: true,
        mtime,
        config,
    })
}

/// Parses and validates a configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    let options = &config.options;
    if options.base_module_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "options.base_module_name must not be empty".to_string(),
        ));
    }
    if options.source_extension.trim_start_matches('.').is_empty() {
        return Err(ConfigError::Validation(
            "options.source_extension must not be empty".to_string(),
        ));
    }
    if options.models_dir.is_absolute() {
        return Err(ConfigError::Validation(format!(
            "options.models_dir must be relative to the project, got {}",
            options.models_dir.display()
        )));
    }

    let mut urls = HashSet::new();
    for dependency in &config.dependencies {
        if dependency.url.trim().is_empty() {
            return Err(ConfigError::Validation("dependency url must not be empty".to_string()));
        }
        if !urls.insert(dependency.url.as_str()) {
            return Err(ConfigError::Validation(format!(
                "dependency `{}` is declared twice",
                dependency.url
            )));
        }
    }

    let mut platforms = HashSet::new();
    for platform in &config.platforms {
        if !platforms.insert(platform.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "platform `{}` is declared twice",
                platform.name
            )));
        }
    }
    Ok(())
}

/// Fails when the configuration's `requires` range excludes `available`.
pub fn check_tool_version(
    config: &ProjectConfig,
    available: &Version,
) -> Result<(), IncompatibleToolVersion> {
    match &config.requires {
        Some(required) if !required.contains(available) => Err(IncompatibleToolVersion {
            required: required.clone(),
            available: available.clone(),
        }),
        _ => Ok(()),
    }
}
