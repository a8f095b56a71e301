use super::stage::{Stage, StageExecution};
use super::task::StageOutcome;

#[derive(Debug, Clone)]
pub struct StageMetrics {
    pub stage: Stage,
    pub execution: StageExecution,
    pub outcome: StageOutcome,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineMetrics {
    pub total_duration_ms: u128,
    pub stages: Vec<StageMetrics>,
}

impl PipelineMetrics {
    pub fn stage_duration_ms(&self, stage: Stage) -> Option<u128> {
        self.stages
            .iter()
            .find(|m| m.stage == stage)
            .map(|m| m.duration_ms)
    }

    /// Stages that actually ran (not skipped).
    pub fn executed(&self) -> impl Iterator<Item = &StageMetrics> {
        self.stages
            .iter()
            .filter(|m| !matches!(m.outcome, StageOutcome::Skipped(_)))
    }
}
