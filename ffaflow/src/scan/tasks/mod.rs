//! One task per pipeline stage.

mod cand_filter;
mod classify;
mod extract;
mod ffa_run;
mod rfi_filter;

pub use cand_filter::CandidateFilterTask;
pub use classify::ClassifyTask;
pub use extract::{ExtractCleanupGuard, ExtractTask};
pub use ffa_run::{FfaRunConfig, FfaRunTask};
pub use rfi_filter::RfiFilterTask;

use crate::errors::FfaResult;
use crate::remote::ExecCapture;
use crate::util::shell;

/// Exit code reported for a stage that could not prepare its own
/// directories or files.
pub(crate) const PREPARE_FAILED_EXIT: i32 = 1;

/// Run `words` on `host` and log what the remote side said.
pub(crate) async fn run_remote_stage(
    ctx: &super::ScanContext,
    stage: &str,
    host: &str,
    words: &[String],
) -> FfaResult<i32> {
    let command = shell::join(words);
    tracing::info!(scan = %ctx.scan, stage, host, "Running remote stage");
    let capture: ExecCapture = ctx.services.remote.run(host, &[command]).await?;
    if !capture.success() {
        tracing::warn!(
            scan = %ctx.scan,
            stage,
            host,
            exit_code = capture.exit_code,
            stderr = %capture.stderr.trim(),
            "Remote stage failed"
        );
    }
    Ok(capture.exit_code)
}
