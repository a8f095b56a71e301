//! Error types for ffaflow.
//!
//! Only run-level failures are errors. A stage that runs and exits non-zero
//! is reported as [`crate::pipeline::StageOutcome::Failed`] and never becomes
//! an `FfaError`.

use thiserror::Error;

/// Exit code used by remote transports to report a connection failure.
pub const CONNECTION_FAILURE_EXIT: i32 = 255;

/// Exit code used when the run was cancelled (SIGINT convention).
pub const CANCELLED_EXIT: i32 = 130;

/// Errors that abort the whole run.
#[derive(Error, Debug)]
pub enum FfaError {
    /// Missing or invalid input, configuration, or command-line value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Rank placement could not be generated or verified.
    #[error("topology error: {0}")]
    Topology(String),

    /// The remote transport could not reach the host.
    #[error("connection to {host} failed: {detail}")]
    Connection { host: String, detail: String },

    /// The distributed launcher program could not be started.
    #[error("launcher error: {0}")]
    Launch(String),

    /// Status or output directories could not be written.
    #[error("storage error: {0}")]
    Storage(String),

    /// A scan state transition that the state machine does not allow.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The run's cancellation token fired while work was in flight.
    #[error("run cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl FfaError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            FfaError::Connection { .. } => CONNECTION_FAILURE_EXIT,
            FfaError::Cancelled => CANCELLED_EXIT,
            _ => 1,
        }
    }

    /// Whether this error came from the remote transport.
    pub fn is_connection(&self) -> bool {
        matches!(self, FfaError::Connection { .. })
    }
}

pub type FfaResult<T> = Result<T, FfaError>;
