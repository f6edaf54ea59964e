//! External package resolvers

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use strata_core::{PackageRequirement, cache_dir, write_atomic};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ResolveError;
use crate::graph::ResolvedGraph;

/// Requirements handed to a command resolver, inside the cache directory.
pub const REQUIREMENTS_FILE: &str = "requirements.json";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Resolves declared requirements into a package graph.
///
/// Implementations may block for a long time and should give up with
/// [`ResolveError::Cancelled`] once `cancel` fires.
pub trait PackageResolver: Send + Sync {
    fn resolve(
        &self,
        requirements: &[PackageRequirement],
        prefix: &Path,
        cancel: &CancellationToken,
    ) -> Result<ResolvedGraph, ResolveError>;
}

impl<T: PackageResolver + ?Sized> PackageResolver for Box<T> {
    fn resolve(
        &self,
        requirements: &[PackageRequirement],
        prefix: &Path,
        cancel: &CancellationToken,
    ) -> Result<ResolvedGraph, ResolveError> {
        (**self).resolve(requirements, prefix, cancel)
    }
}

/// Runs `<program> <args..> <prefix>` and reads the resolved graph as JSON
/// from its standard output.
#[derive(Debug, Clone)]
pub struct CommandResolver {
    program: String,
    args: Vec<String>,
}

impl CommandResolver {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        CommandResolver {
            program: program.into(),
            args,
        }
    }

    /// First element is the program, the rest are arguments.
    pub fn from_command_line(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(CommandResolver::new(program.clone(), args.to_vec()))
    }
}

impl PackageResolver for CommandResolver {
    fn resolve(
        &self,
        requirements: &[PackageRequirement],
        prefix: &Path,
        cancel: &CancellationToken,
    ) -> Result<ResolvedGraph, ResolveError> {
        let path = cache_dir(prefix).join(REQUIREMENTS_FILE);
        let json = serde_json::to_vec_pretty(requirements)?;
        write_atomic(&path, &json).map_err(|source| ResolveError::Io {
            path: path.clone(),
            source,
        })?;

        info!("Resolving {} packages with `{}`", requirements.len(), self.program);
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(prefix)
            .current_dir(prefix)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ResolveError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = loop {
            if cancel.is_cancelled() {
                if let Err(e) = child.kill() {
                    warn!("Failed to kill resolver `{}`: {}", self.program, e);
                }
                let _ = child.wait();
                return Err(ResolveError::Cancelled);
            }
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(source) => {
                    return Err(ResolveError::Spawn {
                        program: self.program.clone(),
                        source,
                    });
                }
            }
        };

        let stdout = stdout.map(join).unwrap_or_default();
        let stderr = stderr.map(join).unwrap_or_default();
        if !status.success() {
            return Err(ResolveError::CommandFailed {
                program: self.program.clone(),
                status: status.code(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        let graph: ResolvedGraph = serde_json::from_slice(&stdout)?;
        debug!(
            "Resolver returned {} packages ({} roots)",
            graph.packages.len(),
            graph.roots.len()
        );
        Ok(graph)
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn join(handle: thread::JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.join().unwrap_or_default()
}

/// Always answers with the same graph. Useful when the graph was produced
/// ahead of time, and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    graph: ResolvedGraph,
}

impl StaticResolver {
    pub fn new(graph: ResolvedGraph) -> Self {
        StaticResolver { graph }
    }
}

impl PackageResolver for StaticResolver {
    fn resolve(
        &self,
        _requirements: &[PackageRequirement],
        _prefix: &Path,
        cancel: &CancellationToken,
    ) -> Result<ResolvedGraph, ResolveError> {
        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        Ok(self.graph.clone())
    }
}

/// Stands in when no resolver command is configured. Resolving nothing is
/// fine; anything else fails with [`ResolveError::NotConfigured`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResolver;

impl PackageResolver for NoResolver {
    fn resolve(
        &self,
        requirements: &[PackageRequirement],
        _prefix: &Path,
        _cancel: &CancellationToken,
    ) -> Result<ResolvedGraph, ResolveError> {
        if requirements.is_empty() {
            return Ok(ResolvedGraph::default());
        }
        Err(ResolveError::NotConfigured {
            count: requirements.len(),
        })
    }
}
