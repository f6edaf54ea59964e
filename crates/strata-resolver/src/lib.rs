//! Adapts externally resolved packages into modules

pub mod adapter;
pub mod error;
pub mod graph;
pub mod mirror;
pub mod naming;
pub mod resolver;

#[cfg(test)]
pub mod tests;

pub use adapter::{Adaptation, Adapter};
pub use error::{AdapterError, MirrorError, ResolveError};
pub use graph::{
    ResolvedGraph, ResolvedPackage, ResolvedProduct, ResolvedTarget, TargetDependency, TargetKind,
    c99_name,
};
pub use mirror::{EntryLayout, MirrorEntry, MirrorTransaction};
pub use naming::{mirror_name, qualified_name};
pub use resolver::{CommandResolver, NoResolver, PackageResolver, REQUIREMENTS_FILE, StaticResolver};
