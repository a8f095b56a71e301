//! Stage task trait and outcomes.

use std::fmt;

use async_trait::async_trait;

use super::stage::Stage;
use crate::errors::FfaResult;
use crate::gates::GateVerdict;

/// Why a stage was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Output already on disk.
    AlreadyDone,
    /// Nothing to work on.
    NoInput(String),
}

/// Result of one stage of one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Skipped(SkipReason),
    Succeeded,
    Failed { exit_code: i32 },
}

impl StageOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed { .. })
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutcome::Skipped(SkipReason::AlreadyDone) => f.write_str("SKIPPED (already done)"),
            StageOutcome::Skipped(SkipReason::NoInput(reason)) => {
                write!(f, "SKIPPED (no input: {})", reason)
            }
            StageOutcome::Succeeded => f.write_str("SUCCESS"),
            StageOutcome::Failed { exit_code } => write!(f, "FAILED (exit {})", exit_code),
        }
    }
}

/// One stage of the scan pipeline.
///
/// `gate` only reads artifacts. `run` does the work and returns its exit
/// status (0 is success). An `Err` from `run` aborts the whole run, so
/// tasks return `Ok(code)` for every failure that only concerns this scan.
#[async_trait]
pub trait PipelineTask<Ctx: Sync>: Send + Sync {
    fn stage(&self) -> Stage;

    /// Human-readable task name for logging.
    fn name(&self) -> &str {
        self.stage().name()
    }

    fn gate(&self, ctx: &Ctx) -> GateVerdict;

    async fn run(&self, ctx: &Ctx) -> FfaResult<i32>;
}

pub type BoxedTask<Ctx> = Box<dyn PipelineTask<Ctx>>;

/// Receives every stage outcome as it happens.
///
/// Implementations log their own write failures; recording never aborts
/// the pipeline.
pub trait StatusSink: Send + Sync {
    fn record(&self, stage: Stage, outcome: &StageOutcome);
}
