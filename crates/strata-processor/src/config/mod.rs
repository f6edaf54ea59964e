//! Project configuration loaded from `Strata.toml`

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{LoadedConfig, check_tool_version, load_config, load_config_from_str};
pub use types::{CONFIG_FILE, Options, Platform, ProjectConfig, ResolverConfig};
