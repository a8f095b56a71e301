//! Status artifacts.
//!
//! Append-only logs that record what the controller did, for operators.
//! The controller never reads them back, so a failed write is logged and
//! otherwise ignored.
//!
//! Every log line has the form `YYYY-mm-dd HH:MM:SS || <subject> || <detail>`.

mod run_status;

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use ulid::Ulid;

use crate::pipeline::{Stage, StageOutcome, StatusSink};

pub use run_status::{RunStatusFile, RunStatusGuard};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format one status line stamped with `at`.
pub fn format_line_at(at: DateTime<Local>, subject: &str, detail: &str) -> String {
    format!("{} || {} || {}\n", at.format(TIMESTAMP_FORMAT), subject, detail)
}

/// Format one status line stamped with the current local time.
pub fn format_line(subject: &str, detail: &str) -> String {
    format_line_at(Local::now(), subject, detail)
}

/// Append `line` to `path`, creating parent directories as needed.
pub(crate) fn append_line(path: &Path, line: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())
}

fn append_or_warn(path: &Path, line: &str) {
    if let Err(e) = append_line(path, line) {
        tracing::warn!(path = %path.display(), error = %e, "Failed to append status line");
    }
}

/// Per-scan stage log: one line per stage outcome.
#[derive(Debug, Clone)]
pub struct ScanStatusLog {
    path: PathBuf,
}

impl ScanStatusLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatusSink for ScanStatusLog {
    fn record(&self, stage: Stage, outcome: &StageOutcome) {
        append_or_warn(&self.path, &format_line(stage.name(), &outcome.to_string()));
    }
}

/// Per-observation log: one line per scan plus the observation verdict.
#[derive(Debug, Clone)]
pub struct ObservationLog {
    path: PathBuf,
}

impl ObservationLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn record(&self, subject: &str, detail: &str) {
        append_or_warn(&self.path, &format_line(subject, detail));
    }
}

/// Durable run-wide log: one line per processed observation.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
    run_id: Ulid,
}

impl AuditLog {
    pub fn new(path: PathBuf, run_id: Ulid) -> Self {
        Self { path, run_id }
    }

    pub fn record(&self, observation: &Path, detail: &str) {
        let detail = format!("run {} || {}", self.run_id, detail);
        append_or_warn(
            &self.path,
            &format_line(&observation.display().to_string(), &detail),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_line_format() {
        let at = Local.with_ymd_and_hms(2025, 8, 24, 11, 13, 36).unwrap();
        assert_eq!(
            format_line_at(at, "scan_001", "SUCCESS"),
            "2025-08-24 11:13:36 || scan_001 || SUCCESS\n"
        );
    }

    #[test]
    fn test_scan_status_log_appends() {
        let temp = TempDir::new().unwrap();
        let log = ScanStatusLog::new(temp.path().join("status").join("scan_001.status"));

        log.record(Stage::Extract, &StageOutcome::Succeeded);
        log.record(Stage::RfiFilter, &StageOutcome::Failed { exit_code: 2 });

        let text = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" || EXTRACT || SUCCESS"));
        assert!(lines[1].ends_with(" || RFI_FILTER || FAILED (exit 2)"));
    }

    #[test]
    fn test_unwritable_log_does_not_panic() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, b"file").unwrap();
        let log = ObservationLog::new(blocker.join("observation.log"));
        log.record("scan_001", "SUCCESS");
        assert!(!blocker.join("observation.log").exists());
    }

    #[test]
    fn test_audit_log_carries_run_id() {
        let temp = TempDir::new().unwrap();
        let run_id = Ulid::new();
        let log = AuditLog::new(temp.path().join("audit.log"), run_id);
        log.record(Path::new("/data/obs1"), "SUCCESS");

        let text = fs::read_to_string(temp.path().join("audit.log")).unwrap();
        assert!(text.contains(" || /data/obs1 || "));
        assert!(text.contains(&run_id.to_string()));
        assert!(text.trim_end().ends_with("|| SUCCESS"));
    }
}
