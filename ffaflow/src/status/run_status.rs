//! Run-status marker.
//!
//! ```text
//! ON                 ← line 1: ON while a run is active, OFF afterwards
//! node01 node02      ← line 2: node list
//! 01J...             ← line 3: run id
//! ```
//!
//! Last writer wins. Only monitoring tools read it.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use ulid::Ulid;

use crate::errors::{FfaError, FfaResult};

#[derive(Debug, Clone)]
pub struct RunStatusFile {
    path: PathBuf,
}

impl RunStatusFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, active: bool, hosts: &[String], run_id: Ulid) -> FfaResult<()> {
        let contents = format!(
            "{}\n{}\n{}\n",
            if active { "ON" } else { "OFF" },
            hosts.join(" "),
            run_id
        );
        let tmp = self.path.with_extension("tmp");
        let result = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(contents.as_bytes())?;
            fs::rename(&tmp, &self.path)
        })();
        result.map_err(|e| {
            let _ = fs::remove_file(&tmp);
            FfaError::Storage(format!(
                "failed to write run status {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

/// Holds the marker at ON; writes OFF when finished or dropped.
pub struct RunStatusGuard {
    file: RunStatusFile,
    hosts: Vec<String>,
    run_id: Ulid,
    active: bool,
}

impl RunStatusGuard {
    /// Mark the run ON.
    pub fn begin(file: RunStatusFile, hosts: Vec<String>, run_id: Ulid) -> Self {
        if let Err(e) = file.write(true, &hosts, run_id) {
            tracing::warn!(error = %e, "Failed to mark run ON");
        }
        Self {
            file,
            hosts,
            run_id,
            active: true,
        }
    }

    /// Mark the run OFF.
    pub fn finish(mut self) {
        self.mark_off();
    }

    fn mark_off(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        match self.file.write(false, &self.hosts, self.run_id) {
            Ok(()) => tracing::debug!(run_id = %self.run_id, "Run marked OFF"),
            Err(e) => tracing::warn!(error = %e, "Failed to mark run OFF"),
        }
    }
}

impl Drop for RunStatusGuard {
    fn drop(&mut self) {
        if self.active {
            tracing::warn!(run_id = %self.run_id, "Run ended abnormally, marking OFF");
            self.mark_off();
        }
    }
}
