//! Pipeline executor.
//!
//! Runs the tasks of an [`ExecutionPlan`] in order against one scan,
//! driving the [`ScanState`] machine and reporting every outcome to a
//! [`StatusSink`].

use std::time::Instant;

use super::metrics::{PipelineMetrics, StageMetrics};
use super::stage::Stage;
use super::state::{ScanState, Transition};
use super::task::{BoxedTask, SkipReason, StageOutcome, StatusSink};
use crate::errors::{FfaError, FfaResult};
use crate::gates::GateVerdict;

pub struct ExecutionPlan<Ctx: Sync> {
    tasks: Vec<BoxedTask<Ctx>>,
}

impl<Ctx: Sync> ExecutionPlan<Ctx> {
    pub fn new(tasks: Vec<BoxedTask<Ctx>>) -> Self {
        Self { tasks }
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.tasks.iter().map(|t| t.stage()).collect()
    }

    pub fn tasks(self) -> Vec<BoxedTask<Ctx>> {
        self.tasks
    }
}

/// What happened to one scan.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub state: ScanState,
    pub outcomes: Vec<(Stage, StageOutcome)>,
    pub metrics: PipelineMetrics,
}

impl ScanReport {
    pub fn failed(&self) -> bool {
        self.state == ScanState::Failed
    }

    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.outcomes
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, o)| o)
    }

    /// First failed stage and its exit code.
    pub fn failure(&self) -> Option<(Stage, i32)> {
        self.outcomes.iter().find_map(|(stage, outcome)| match outcome {
            StageOutcome::Failed { exit_code } => Some((*stage, *exit_code)),
            _ => None,
        })
    }
}

pub struct PipelineExecutor;

impl PipelineExecutor {
    /// Execute a plan against one scan.
    ///
    /// Stage failures end the scan and are reported in the returned
    /// [`ScanReport`]. An `Err` means the run itself must stop.
    pub async fn execute<Ctx: Sync>(
        plan: ExecutionPlan<Ctx>,
        ctx: &Ctx,
        sink: &dyn StatusSink,
    ) -> FfaResult<ScanReport> {
        let total_start = Instant::now();
        let mut state = ScanState::Discovered;
        let mut outcomes = Vec::new();
        let mut stage_metrics = Vec::new();

        for task in plan.tasks() {
            let stage = task.stage();
            if state.pending_stage() != Some(stage) {
                return Err(FfaError::InvalidState(format!(
                    "task {} cannot start in state {}",
                    task.name(),
                    state
                )));
            }

            let stage_start = Instant::now();
            let outcome = match task.gate(ctx) {
                GateVerdict::Complete => {
                    tracing::info!(stage = %stage, "Output present, skipping");
                    state = state.advance(Transition::Skip)?;
                    StageOutcome::Skipped(SkipReason::AlreadyDone)
                }
                GateVerdict::NoInput(reason) => {
                    tracing::warn!(stage = %stage, reason = %reason, "No input, skipping");
                    state = state.advance(Transition::Skip)?;
                    StageOutcome::Skipped(SkipReason::NoInput(reason))
                }
                GateVerdict::Pending => {
                    state = state.advance(Transition::Begin)?;
                    tracing::info!(stage = %stage, state = %state, "Stage started");
                    let exit_code = task.run(ctx).await.inspect_err(|e| {
                        tracing::error!(stage = %stage, error = %e, "Stage aborted the run")
                    })?;
                    if exit_code == 0 {
                        state = state.advance(Transition::Succeed)?;
                        StageOutcome::Succeeded
                    } else {
                        state = state.advance(Transition::Fail)?;
                        tracing::error!(stage = %stage, exit_code, "Stage failed");
                        StageOutcome::Failed { exit_code }
                    }
                }
            };

            sink.record(stage, &outcome);
            stage_metrics.push(StageMetrics {
                stage,
                execution: stage.execution(),
                outcome: outcome.clone(),
                duration_ms: stage_start.elapsed().as_millis(),
            });
            let failed = outcome.is_failed();
            outcomes.push((stage, outcome));
            if failed {
                break;
            }
        }

        let metrics = PipelineMetrics {
            total_duration_ms: total_start.elapsed().as_millis(),
            stages: stage_metrics,
        };
        for m in metrics.executed() {
            tracing::debug!(stage = %m.stage, duration_ms = m.duration_ms as u64, "Stage timing");
        }

        Ok(ScanReport {
            state,
            outcomes,
            metrics,
        })
    }
}
