//! Scan pipeline controller.
//!
//! Drives one scan through EXTRACT → RFI_FILTER → FFA_RUN →
//! CANDIDATE_FILTER → CLASSIFY using the generic [`crate::pipeline`]
//! executor. Gates make every stage resumable: a rerun over a scan whose
//! output is already on disk launches nothing for the finished stages.

pub mod tasks;
mod types;

use crate::errors::FfaResult;
use crate::pipeline::{ExecutionPlan, PipelineExecutor, ScanReport};
use crate::status::ScanStatusLog;

pub use tasks::{
    CandidateFilterTask, ClassifyTask, ExtractCleanupGuard, ExtractTask, FfaRunConfig, FfaRunTask,
    RfiFilterTask,
};
pub use types::{ScanContext, ScanServices, ScanSettings};

/// The fixed stage table.
pub fn build_plan() -> ExecutionPlan<ScanContext> {
    ExecutionPlan::new(vec![
        Box::new(ExtractTask),
        Box::new(RfiFilterTask),
        Box::new(FfaRunTask),
        Box::new(CandidateFilterTask),
        Box::new(ClassifyTask),
    ])
}

/// Run every stage of one scan, appending outcomes to its status log.
pub async fn run_scan(ctx: &ScanContext) -> FfaResult<ScanReport> {
    tracing::info!(
        scan = %ctx.scan,
        expected_beams = ctx.expected_beams(),
        "Processing scan"
    );

    let sink = ScanStatusLog::new(ctx.layout.status_path.clone());
    let report = PipelineExecutor::execute(build_plan(), ctx, &sink).await?;

    match report.failure() {
        Some((stage, exit_code)) => tracing::error!(
            scan = %ctx.scan,
            stage = %stage,
            exit_code,
            "Scan failed"
        ),
        None => tracing::info!(
            scan = %ctx.scan,
            state = %report.state,
            total_ms = report.metrics.total_duration_ms as u64,
            "Scan finished"
        ),
    }
    Ok(report)
}


#[cfg(test)]
mod tests {
    use super::testing::Harness;
    use super::*;
    use crate::pipeline::{ScanState, SkipReason, Stage, StageOutcome};

    #[tokio::test]
    async fn test_full_scan_then_idempotent_rerun() {
        let harness = Harness::new(&["n1", "n2"]);
        harness.produce_outputs();
        let ctx = harness.context("scan_001");

        let first = run_scan(&ctx).await.unwrap();
        assert_eq!(first.state, ScanState::Done);
        assert_eq!(
            harness.launcher.labels(),
            vec!["EXTRACT", "RFI_FILTER", "FFA_RUN"]
        );
        assert_eq!(harness.remote.calls().len(), 2);

        let second = run_scan(&ctx).await.unwrap();
        assert_eq!(second.state, ScanState::Done);
        assert_eq!(
            second.outcome(Stage::Extract),
            Some(&StageOutcome::Skipped(SkipReason::AlreadyDone))
        );
        assert_eq!(
            second.outcome(Stage::RfiFilter),
            Some(&StageOutcome::Skipped(SkipReason::AlreadyDone))
        );
        // Only FFA_RUN launches again.
        assert_eq!(
            harness.launcher.labels(),
            vec!["EXTRACT", "RFI_FILTER", "FFA_RUN", "FFA_RUN"]
        );

        let status = std::fs::read_to_string(&ctx.layout.status_path).unwrap();
        assert_eq!(status.lines().count(), 10);
    }

    #[tokio::test]
    async fn test_missing_summaries_skip_remote_stages() {
        let harness = Harness::new(&["n1"]);
        let ctx = harness.context("scan_002");

        let report = run_scan(&ctx).await.unwrap();
        assert!(!report.failed());
        assert_eq!(report.state, ScanState::Done);
        assert!(matches!(
            report.outcome(Stage::CandidateFilter),
            Some(StageOutcome::Skipped(SkipReason::NoInput(_)))
        ));
        assert!(matches!(
            report.outcome(Stage::Classify),
            Some(StageOutcome::Skipped(SkipReason::NoInput(_)))
        ));
        assert!(harness.remote.calls().is_empty());

        let status = std::fs::read_to_string(&ctx.layout.status_path).unwrap();
        assert!(!status.contains("FAILED"));
    }

    #[tokio::test]
    async fn test_extract_failure_ends_scan() {
        let harness = Harness::new(&["n1"]);
        harness.launcher.fail("EXTRACT", 1);
        let ctx = harness.context("scan_003");

        let report = run_scan(&ctx).await.unwrap();
        assert!(report.failed());
        assert_eq!(report.failure(), Some((Stage::Extract, 1)));
        assert_eq!(harness.launcher.labels(), vec!["EXTRACT"]);
        assert!(!ctx.layout.filterbank_dir.exists());
    }
}
