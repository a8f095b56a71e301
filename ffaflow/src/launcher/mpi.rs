//! `mpirun`-based launcher.

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::{DistributedLauncher, LaunchSpec};
use crate::errors::{FfaError, FfaResult};
use crate::topology::{PlacementFiles, RankMapping};
use crate::util::process::{ChildError, exit_code, run_logged};

/// Launches ranks with `mpirun --hostfile … --rankfile …`.
///
/// mpirun runs in its own process group; cancelling the run terminates the
/// group. What the remote ranks do after that is up to mpirun. Console output
/// of all ranks goes to the log as it arrives.
#[derive(Debug, Clone)]
pub struct MpiLauncher {
    mpirun: String,
    placement: PlacementFiles,
    cancel: CancellationToken,
}

impl MpiLauncher {
    pub fn new(mpirun: String, placement: PlacementFiles, cancel: CancellationToken) -> Self {
        Self {
            mpirun,
            placement,
            cancel,
        }
    }

    /// Arguments passed to mpirun, program included.
    pub fn build_args(&self, mapping: &RankMapping, spec: &LaunchSpec) -> Vec<String> {
        let mut args = vec![
            "--hostfile".to_string(),
            self.placement.hostfile.display().to_string(),
            "--rankfile".to_string(),
            self.placement.rankfile.display().to_string(),
            "-np".to_string(),
            mapping.rank_count().to_string(),
        ];
        if let Some(dir) = &spec.workdir {
            args.push("--wdir".to_string());
            args.push(dir.display().to_string());
        }
        for (key, value) in &spec.env {
            args.push("-x".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(spec.program.clone());
        args.extend(spec.args.iter().cloned());
        args
    }
}

#[async_trait]
impl DistributedLauncher for MpiLauncher {
    async fn launch(&self, mapping: &RankMapping, spec: &LaunchSpec) -> FfaResult<i32> {
        let args = self.build_args(mapping, spec);
        tracing::info!(
            stage = %spec.label,
            ranks = mapping.rank_count(),
            program = %spec.program,
            "Launching distributed job"
        );
        tracing::debug!(mpirun = %self.mpirun, args = ?args, "mpirun command line");

        let mut cmd = Command::new(&self.mpirun);
        cmd.args(&args);

        let status = run_logged(cmd, &spec.label, &self.cancel)
            .await
            .map_err(|e| match e {
                ChildError::Spawn(e) => {
                    FfaError::Launch(format!("failed to start '{}': {}", self.mpirun, e))
                }
                ChildError::Wait(e) => {
                    FfaError::Launch(format!("lost track of '{}': {}", self.mpirun, e))
                }
                ChildError::Cancelled => FfaError::Cancelled,
            })?;

        let code = exit_code(status);
        if code != 0 {
            tracing::warn!(stage = %spec.label, exit_code = code, "Distributed job failed");
        }
        Ok(code)
    }
}
