//! ffaflow: resumable multi-node controller for the FFA pulsar-search pipeline.
//!
//! The controller walks a list of observations, discovers their scans and
//! drives each scan through five stages (extraction, RFI mitigation, FFA
//! search, candidate filtering, classification). Finished stages are
//! detected from the artifacts they leave on disk, so a rerun picks up
//! where the last one stopped.

pub mod cli;
pub mod coordinator;
pub mod errors;
pub mod gates;
pub mod launcher;
pub mod observation;
pub mod pipeline;
pub mod remote;
pub mod runtime;
pub mod scan;
pub mod status;
pub mod topology;
pub mod util;

pub use coordinator::{Coordinator, RunSummary};
pub use errors::{FfaError, FfaResult};
pub use runtime::{Backend, PipelineConfig, RunOptions};
