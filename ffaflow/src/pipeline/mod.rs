//! Table-driven scan pipeline.
//!
//! ```text
//! ExecutionPlan → [task per stage] → PipelineExecutor
//!
//! per task:  gate ──Complete/NoInput──→ Skip ──────────────┐
//!              └──Pending──→ Begin → run → Succeed | Fail ──┴→ StatusSink
//! ```
//!
//! The executor owns the [`ScanState`] machine; tasks only decide whether
//! they need to run (their gate) and do the work. A failed stage ends the
//! scan. Errors returned by a task are fatal for the whole run and are
//! propagated unchanged.

mod metrics;
#[allow(clippy::module_inception)]
mod pipeline;
mod stage;
mod state;
mod task;

pub use metrics::{PipelineMetrics, StageMetrics};
pub use pipeline::{ExecutionPlan, PipelineExecutor, ScanReport};
pub use stage::{Stage, StageExecution};
pub use state::{ScanState, Transition};
pub use task::{BoxedTask, PipelineTask, SkipReason, StageOutcome, StatusSink};
