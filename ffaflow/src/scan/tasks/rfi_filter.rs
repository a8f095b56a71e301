//! RFI_FILTER: mitigates every extracted filterbank in place.

use async_trait::async_trait;

use crate::errors::FfaResult;
use crate::gates::{self, GateVerdict};
use crate::launcher::LaunchSpec;
use crate::pipeline::{PipelineTask, Stage};
use crate::scan::ScanContext;

pub struct RfiFilterTask;

impl RfiFilterTask {
    pub fn launch_spec(ctx: &ScanContext) -> LaunchSpec {
        let settings = ctx.settings();
        let fil_dir = ctx.layout.filterbank_dir.display().to_string();
        let args = settings.programs.rfi_filter.args_with([
            fil_dir,
            "-w".to_string(),
            settings.jobs.to_string(),
        ]);
        LaunchSpec::new(
            Stage::RfiFilter.name(),
            settings.programs.rfi_filter.program.clone(),
            args,
        )
        .with_workdir(ctx.layout.filterbank_dir.clone())
    }
}

#[async_trait]
impl PipelineTask<ScanContext> for RfiFilterTask {
    fn stage(&self) -> Stage {
        Stage::RfiFilter
    }

    fn gate(&self, ctx: &ScanContext) -> GateVerdict {
        gates::rfi_gate(ctx.services.probe.as_ref(), &ctx.layout, ctx.expected_beams())
    }

    async fn run(&self, ctx: &ScanContext) -> FfaResult<i32> {
        let spec = Self::launch_spec(ctx);
        ctx.services
            .launcher
            .launch(&ctx.topology().mapping, &spec)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::testing::Harness;

    #[tokio::test]
    async fn test_launches_on_filterbank_dir() {
        let harness = Harness::new(&["n1", "n2"]);
        let ctx = harness.context("scan_001");

        assert_eq!(RfiFilterTask.run(&ctx).await.unwrap(), 0);

        let specs = harness.launcher.specs();
        assert_eq!(specs.len(), 1);
        let fil_dir = ctx.layout.filterbank_dir.display().to_string();
        assert_eq!(
            specs[0].args,
            vec!["src_scripts/rfi_filter_filtool.py", fil_dir.as_str(), "-w", "1"]
        );
    }
}
