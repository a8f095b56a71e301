//! Distributed launcher.
//!
//! Starts one worker process per rank of a [`RankMapping`], waits for all of
//! them and reports a single aggregate exit code. Per-rank diagnostics stay
//! in the workers' own logs.
//!
//! Two implementations:
//! - [`MpiLauncher`]: delegates placement to `mpirun` via the generated
//!   hostfile and rankfile
//! - [`RankFanoutLauncher`]: one remote command per rank over a
//!   [`crate::remote::RemoteExec`] channel, all ranks concurrently

mod fanout;
mod mpi;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::errors::FfaResult;
use crate::topology::RankMapping;

pub use fanout::RankFanoutLauncher;
pub use mpi::MpiLauncher;

/// Everything one distributed invocation needs.
///
/// Built fresh for every stage invocation; nothing is shared between
/// invocations through files the workers read back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Short label for logs (usually the stage name).
    pub label: String,
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment exported to every rank.
    pub env: Vec<(String, String)>,
    /// Working directory of every rank.
    pub workdir: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn new(label: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            label: label.into(),
            program: program.into(),
            args,
            env: Vec::new(),
            workdir: None,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_workdir(mut self, workdir: PathBuf) -> Self {
        self.workdir = Some(workdir);
        self
    }
}

/// Runs a program on every rank and aggregates the result.
///
/// `launch` blocks until every rank has finished. It returns `Ok(0)` only if
/// all ranks succeeded; a non-zero value means at least one rank failed.
/// `Err` is reserved for failures that abort the run (launcher missing,
/// unreachable host, cancellation).
#[async_trait]
pub trait DistributedLauncher: Send + Sync {
    async fn launch(&self, mapping: &RankMapping, spec: &LaunchSpec) -> FfaResult<i32>;
}
