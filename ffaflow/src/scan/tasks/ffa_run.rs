//! FFA_RUN: the periodicity search itself.
//!
//! Each invocation gets its own run configuration written into the scan's
//! state directory; nothing is shared between scans or runs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::PREPARE_FAILED_EXIT;
use crate::errors::{FfaError, FfaResult};
use crate::gates::{self, GateVerdict};
use crate::launcher::LaunchSpec;
use crate::pipeline::{PipelineTask, Stage};
use crate::runtime::Backend;
use crate::scan::ScanContext;

/// Per-scan configuration read by the FFA program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FfaRunConfig {
    pub scan: String,
    /// RFI-mitigated filterbanks.
    pub input_dir: PathBuf,
    /// Search state and candidate output.
    pub state_dir: PathBuf,
    pub backend: Backend,
    /// Host per rank, in rank order.
    pub ranks: Vec<String>,
}

impl FfaRunConfig {
    pub fn for_scan(ctx: &ScanContext) -> Self {
        Self {
            scan: ctx.scan.clone(),
            input_dir: ctx.layout.filterbank_dir.clone(),
            state_dir: ctx.layout.state_dir.clone(),
            backend: ctx.settings().backend,
            ranks: ctx
                .topology()
                .mapping
                .slots()
                .iter()
                .map(|s| s.host.clone())
                .collect(),
        }
    }

    /// Write as pretty JSON, creating the parent directory.
    pub fn write(&self, path: &Path) -> FfaResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                FfaError::Storage(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| FfaError::Storage(format!("failed to write {}: {}", path.display(), e)))
    }
}

pub struct FfaRunTask;

impl FfaRunTask {
    pub fn launch_spec(ctx: &ScanContext, config_path: &Path) -> LaunchSpec {
        let settings = ctx.settings();
        let args = settings.programs.ffa_run.args_with([
            "-c".to_string(),
            config_path.display().to_string(),
            "-b".to_string(),
            settings.backend.to_string(),
        ]);
        LaunchSpec::new(
            Stage::FfaRun.name(),
            settings.programs.ffa_run.program.clone(),
            args,
        )
    }
}

#[async_trait]
impl PipelineTask<ScanContext> for FfaRunTask {
    fn stage(&self) -> Stage {
        Stage::FfaRun
    }

    fn gate(&self, _ctx: &ScanContext) -> GateVerdict {
        gates::ffa_gate()
    }

    async fn run(&self, ctx: &ScanContext) -> FfaResult<i32> {
        let config_path = ctx.layout.ffa_config_path();
        if let Err(e) = FfaRunConfig::for_scan(ctx).write(&config_path) {
            tracing::error!(scan = %ctx.scan, error = %e, "Failed to write FFA run config");
            return Ok(PREPARE_FAILED_EXIT);
        }

        let spec = Self::launch_spec(ctx, &config_path);
        ctx.services
            .launcher
            .launch(&ctx.topology().mapping, &spec)
            .await
    }
}
