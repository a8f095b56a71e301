//! CANDIDATE_FILTER: merges per-beam summaries on the head host.

use async_trait::async_trait;

use super::run_remote_stage;
use crate::errors::FfaResult;
use crate::gates::{self, GateVerdict};
use crate::pipeline::{PipelineTask, Stage};
use crate::scan::ScanContext;

pub struct CandidateFilterTask;

impl CandidateFilterTask {
    pub fn command(ctx: &ScanContext) -> Vec<String> {
        ctx.settings()
            .programs
            .cand_filter
            .command_line([ctx.layout.state_dir.display().to_string()])
    }
}

#[async_trait]
impl PipelineTask<ScanContext> for CandidateFilterTask {
    fn stage(&self) -> Stage {
        Stage::CandidateFilter
    }

    fn gate(&self, ctx: &ScanContext) -> GateVerdict {
        gates::cand_filter_gate(ctx.services.probe.as_ref(), &ctx.layout)
    }

    async fn run(&self, ctx: &ScanContext) -> FfaResult<i32> {
        let host = ctx.settings().head_host.clone();
        run_remote_stage(ctx, self.name(), &host, &Self::command(ctx)).await
    }
}
