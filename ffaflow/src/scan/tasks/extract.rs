//! EXTRACT: raw beam data → downsampled filterbanks, one rank per host.

use async_trait::async_trait;

use super::PREPARE_FAILED_EXIT;
use crate::errors::FfaResult;
use crate::gates::{self, GateVerdict};
use crate::launcher::LaunchSpec;
use crate::pipeline::{PipelineTask, Stage};
use crate::runtime::ScanLayout;
use crate::scan::ScanContext;

/// Removes a scan's filterbank directory unless disarmed.
///
/// Armed for the whole extraction, so a failed or aborted extraction never
/// leaves partial filterbanks for the gate to count on the next run.
pub struct ExtractCleanupGuard {
    layout: ScanLayout,
    armed: bool,
}

impl ExtractCleanupGuard {
    pub fn new(layout: ScanLayout) -> Self {
        Self {
            layout,
            armed: true,
        }
    }

    /// Keep the directory (call on success).
    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ExtractCleanupGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        tracing::warn!(
            dir = %self.layout.filterbank_dir.display(),
            "Extraction did not complete, removing filterbank directory"
        );
        if let Err(e) = self.layout.cleanup_filterbanks() {
            tracing::warn!("Failed to remove filterbank directory: {}", e);
        }
    }
}

pub struct ExtractTask;

impl ExtractTask {
    pub fn launch_spec(ctx: &ScanContext) -> LaunchSpec {
        let settings = ctx.settings();
        let out = ctx.layout.filterbank_dir.display().to_string();
        let args = settings.programs.extract.args_with([
            "--raw-dir".to_string(),
            ctx.raw_dir.display().to_string(),
            "--scan".to_string(),
            ctx.scan.clone(),
            "--out".to_string(),
            out,
            "--beams-per-host".to_string(),
            settings.beams_per_host.to_string(),
            "--tbin".to_string(),
            settings.time_bin.to_string(),
            "--fbin".to_string(),
            settings.freq_bin.to_string(),
            "--jobs".to_string(),
            settings.jobs.to_string(),
            format!("--offset={}", settings.offset),
            "--backend".to_string(),
            settings.backend.to_string(),
        ]);
        LaunchSpec::new(
            Stage::Extract.name(),
            settings.programs.extract.program.clone(),
            args,
        )
        .with_workdir(ctx.layout.filterbank_dir.clone())
    }
}

#[async_trait]
impl PipelineTask<ScanContext> for ExtractTask {
    fn stage(&self) -> Stage {
        Stage::Extract
    }

    fn gate(&self, ctx: &ScanContext) -> GateVerdict {
        gates::extract_gate(
            ctx.services.probe.as_ref(),
            &ctx.layout,
            ctx.expected_beams(),
            ctx.topology().nodes.hosts(),
        )
    }

    async fn run(&self, ctx: &ScanContext) -> FfaResult<i32> {
        let mut guard = ExtractCleanupGuard::new(ctx.layout.clone());

        if let Err(e) = std::fs::create_dir_all(ctx.layout.headers_dir()) {
            tracing::error!(
                scan = %ctx.scan,
                dir = %ctx.layout.filterbank_dir.display(),
                error = %e,
                "Failed to create filterbank directory"
            );
            return Ok(PREPARE_FAILED_EXIT);
        }

        let spec = Self::launch_spec(ctx);
        let code = ctx
            .services
            .launcher
            .launch(&ctx.topology().mapping, &spec)
            .await?;

        if code == 0 {
            guard.disarm();
        }
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::constants::artifacts;
    use crate::scan::testing::{Harness, write_beams};

    #[test]
    fn test_launch_spec() {
        let harness = Harness::new(&["n1", "n2"]);
        let ctx = harness.context("scan_007");
        let spec = ExtractTask::launch_spec(&ctx);

        assert_eq!(spec.label, "EXTRACT");
        assert_eq!(spec.program, "python3");
        assert_eq!(spec.workdir.as_deref(), Some(ctx.layout.filterbank_dir.as_path()));
        assert_eq!(spec.args[0], "src_scripts/raw_to_fil.py");
        assert!(spec.args.windows(2).any(|w| w == ["--scan", "scan_007"]));
        assert!(spec.args.windows(2).any(|w| w == ["--beams-per-host", "10"]));
        assert!(spec.args.windows(2).any(|w| w == ["--backend", "SPOTLIGHT"]));
        assert!(spec.args.iter().any(|a| a == "--offset=0"));
    }

    #[tokio::test]
    async fn test_success_keeps_directory() {
        let harness = Harness::new(&["n1"]);
        let ctx = harness.context("scan_001");

        let code = ExtractTask.run(&ctx).await.unwrap();
        assert_eq!(code, 0);
        assert!(ctx.layout.filterbank_dir.exists());
        assert_eq!(harness.launcher.labels(), vec!["EXTRACT"]);
    }

    #[tokio::test]
    async fn test_failure_removes_directory() {
        let harness = Harness::new(&["n1"]);
        harness.launcher.fail("EXTRACT", 4);
        let ctx = harness.context("scan_001");
        let fil_dir = ctx.layout.filterbank_dir.clone();
        harness.launcher.on_launch(move |_| {
            write_beams(&fil_dir, artifacts::EXTRACT_SUFFIX, 3);
        });

        let code = ExtractTask.run(&ctx).await.unwrap();
        assert_eq!(code, 4);
        assert!(!ctx.layout.filterbank_dir.exists());
    }

    #[tokio::test]
    async fn test_launcher_error_removes_directory() {
        let harness = Harness::new(&["n1"]);
        harness.launcher.error_on("EXTRACT");
        let ctx = harness.context("scan_001");

        assert!(ExtractTask.run(&ctx).await.is_err());
        assert!(!ctx.layout.filterbank_dir.exists());
    }
}
