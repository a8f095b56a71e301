//! CLASSIFY: scores the combined candidate table.

use async_trait::async_trait;

use super::run_remote_stage;
use crate::errors::FfaResult;
use crate::gates::{self, GateVerdict};
use crate::pipeline::{PipelineTask, Stage};
use crate::scan::ScanContext;

pub struct ClassifyTask;

#[async_trait]
impl PipelineTask<ScanContext> for ClassifyTask {
    fn stage(&self) -> Stage {
        Stage::Classify
    }

    fn gate(&self, ctx: &ScanContext) -> GateVerdict {
        gates::classify_gate(ctx.services.probe.as_ref(), &ctx.layout)
    }

    async fn run(&self, ctx: &ScanContext) -> FfaResult<i32> {
        let settings = ctx.settings();
        let words = settings
            .programs
            .classify
            .command_line([ctx.layout.state_dir.display().to_string()]);
        run_remote_stage(ctx, self.name(), &settings.classify_host, &words).await
    }
}
