//! Filesystem layouts.
//!
//! ```text
//! <state_home>/                    FilesystemLayout
//!   hostfile, rankfile             placement artifacts
//!   run_status                     ON/OFF marker
//!   audit.log                      one line per observation
//!   logs/ffaflow.log
//!
//! <output_root>/                   ObservationLayout
//!   status/observation.log
//!   status/<scan>.status           per-scan stage log
//!   BeamFils/<scan>/               ScanLayout::filterbank_dir
//!     BM<n>.down.fil
//!     BM<n>.down_RFI_Mitigated_01.fil
//!     headers/<host>.ahdr
//!   state/<scan>/                  ScanLayout::state_dir
//!     ffa_config.json
//!     BM<n>.../candidates/summary.csv
//!     combined_candidates.csv
//! ```

use std::path::{Path, PathBuf};

use crate::errors::{FfaError, FfaResult};
use crate::runtime::constants::{dirs, filenames};

/// Process-wide state directory.
#[derive(Debug, Clone)]
pub struct FilesystemLayout {
    home_dir: PathBuf,
}

impl FilesystemLayout {
    pub fn new(home_dir: PathBuf) -> Self {
        Self { home_dir }
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::LOGS)
    }

    pub fn run_status_path(&self) -> PathBuf {
        self.home_dir.join(filenames::RUN_STATUS)
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.home_dir.join(filenames::AUDIT_LOG)
    }

    /// Create the state home and its log directory.
    pub fn prepare(&self) -> FfaResult<()> {
        std::fs::create_dir_all(self.logs_dir()).map_err(|e| {
            FfaError::Storage(format!(
                "Failed to create state home {}: {}",
                self.home_dir.display(),
                e
            ))
        })
    }
}

/// Output root of one observation.
#[derive(Debug, Clone)]
pub struct ObservationLayout {
    root: PathBuf,
}

impl ObservationLayout {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn status_dir(&self) -> PathBuf {
        self.root.join(dirs::STATUS)
    }

    pub fn observation_log_path(&self) -> PathBuf {
        self.status_dir().join(filenames::OBSERVATION_LOG)
    }

    /// Layout for one scan of this observation.
    pub fn scan(&self, scan_name: &str) -> ScanLayout {
        ScanLayout {
            filterbank_dir: self.root.join(dirs::FILTERBANKS).join(scan_name),
            state_dir: self.root.join(dirs::STATE).join(scan_name),
            status_path: self
                .status_dir()
                .join(format!("{}.{}", scan_name, filenames::SCAN_STATUS_EXT)),
        }
    }

    pub fn prepare(&self) -> FfaResult<()> {
        std::fs::create_dir_all(self.status_dir()).map_err(|e| {
            FfaError::Storage(format!(
                "Failed to create output root {}: {}",
                self.root.display(),
                e
            ))
        })
    }
}

/// Paths owned by one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanLayout {
    /// Extraction and RFI output. Removed when extraction fails.
    pub filterbank_dir: PathBuf,
    /// FFA search state and candidate tables.
    pub state_dir: PathBuf,
    /// Append-only stage log. Lives outside both directories above.
    pub status_path: PathBuf,
}

impl ScanLayout {
    pub fn headers_dir(&self) -> PathBuf {
        self.filterbank_dir.join(dirs::HEADERS)
    }

    pub fn header_path(&self, host: &str) -> PathBuf {
        self.headers_dir()
            .join(format!("{}.{}", host, filenames::HEADER_EXT))
    }

    pub fn ffa_config_path(&self) -> PathBuf {
        self.state_dir.join(filenames::FFA_CONFIG)
    }

    pub fn combined_candidates_path(&self) -> PathBuf {
        self.state_dir.join(filenames::COMBINED_CANDIDATES)
    }

    /// Remove the filterbank directory and everything in it.
    pub fn cleanup_filterbanks(&self) -> std::io::Result<()> {
        match std::fs::remove_dir_all(&self.filterbank_dir) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}
