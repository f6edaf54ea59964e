//! Incremental regeneration of a generated project

pub mod config;
pub mod error;
pub mod events;
pub mod layout;
pub mod processor;
pub mod settings;
pub mod writer;


pub use config::{
    CONFIG_FILE, ConfigError, LoadedConfig, Options, Platform, ProjectConfig, ResolverConfig,
    load_config, load_config_from_str,
};
pub use error::{ErrorClass, ProcessorError, WriterError};
pub use events::{ChangeBatch, ChangeEvent, ChangeKind, Trigger, classify};
pub use layout::{PROJECT_FILE, ProjectLayout};
pub use processor::{
    GenerateMode, Generation, Outcome, Processor, ProcessorState, Reason, current_tool_version,
    is_dirty,
};
pub use settings::ProjectSettings;
pub use writer::{
    ArtifactWriter, GenerationInput, JsonProjectWriter, ProjectDescription, TargetDescription,
};
