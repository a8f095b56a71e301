//! Run, observation and scan summaries.

use std::path::PathBuf;

use ulid::Ulid;

use crate::observation::SkippedEntry;
use crate::pipeline::{ScanReport, ScanState, Stage};

#[derive(Debug, Clone)]
pub struct ScanSummary {
    pub scan: String,
    pub state: ScanState,
    pub failure: Option<(Stage, i32)>,
}

impl ScanSummary {
    pub fn from_report(scan: String, report: &ScanReport) -> Self {
        Self {
            scan,
            state: report.state,
            failure: report.failure(),
        }
    }

    pub fn failed(&self) -> bool {
        self.state == ScanState::Failed
    }

    pub fn verdict(&self) -> String {
        match self.failure {
            Some((stage, exit_code)) => format!("FAILED at {} (exit {})", stage, exit_code),
            None => format!("SUCCESS ({})", self.state),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObservationReport {
    pub path: PathBuf,
    pub scans: Vec<ScanSummary>,
    /// Set when the observation could not be processed at all.
    pub error: Option<String>,
}

impl ObservationReport {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            scans: Vec::new(),
            error: None,
        }
    }

    pub fn failed_scans(&self) -> usize {
        self.scans.iter().filter(|s| s.failed()).count()
    }

    /// Fails if it could not be processed or any scan failed.
    pub fn failed(&self) -> bool {
        self.error.is_some() || self.failed_scans() > 0
    }

    pub fn verdict(&self) -> String {
        if let Some(error) = &self.error {
            return format!("FAILED ({})", error);
        }
        let failed = self.failed_scans();
        if failed > 0 {
            format!("FAILED ({} of {} scans failed)", failed, self.scans.len())
        } else {
            format!("SUCCESS ({} scans)", self.scans.len())
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Ulid,
    pub observations: Vec<ObservationReport>,
    pub skipped_entries: Vec<SkippedEntry>,
}

impl RunSummary {
    pub fn failed_observations(&self) -> usize {
        self.observations.iter().filter(|o| o.failed()).count()
    }
}
