//! Observations and scan discovery.
//!
//! An observation is a directory; its raw beam data lives under
//! `<observation>/<beam_data_dir>/`. Each distinct prefix before the
//! backend's raw marker (`<scan>.raw.0`, `<scan>.raw.1`, … or `<scan>.fil`
//! for simulated data) is one scan.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::errors::{FfaError, FfaResult};
use crate::runtime::{Backend, ObservationLayout, OutputTarget};
use crate::util::list_entries;

/// Why an observation list entry was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipCause {
    Duplicate,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// 1-based line in the observation list.
    pub line: usize,
    pub path: PathBuf,
    pub cause: SkipCause,
}

/// Validated, deduplicated observation directories in list order.
#[derive(Debug, Clone, Default)]
pub struct ObservationList {
    pub observations: Vec<PathBuf>,
    pub skipped: Vec<SkippedEntry>,
}

impl ObservationList {
    /// Parse a list. Duplicates and paths that are not directories are
    /// skipped, each with one logged error.
    ///
    /// Duplicates are detected on the resolved path, so `obs`, `./obs` and a
    /// symlink to it are one observation. Kept entries stay as written.
    pub fn parse(text: &str) -> Self {
        let mut list = ObservationList::default();
        let mut seen = HashSet::new();
        for (line, entry) in list_entries(text) {
            let path = PathBuf::from(entry);
            let key = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
            let cause = if seen.contains(&key) {
                Some(SkipCause::Duplicate)
            } else if !path.is_dir() {
                Some(SkipCause::Missing)
            } else {
                None
            };

            match cause {
                Some(cause) => {
                    tracing::error!(
                        line,
                        path = %path.display(),
                        cause = ?cause,
                        "Skipping observation list entry"
                    );
                    list.skipped.push(SkippedEntry { line, path, cause });
                }
                None => {
                    seen.insert(key);
                    list.observations.push(path);
                }
            }
        }
        list
    }

    pub fn load(path: &Path) -> FfaResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            FfaError::Config(format!(
                "failed to read observation list {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::parse(&text))
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// One observation directory and where its output goes.
#[derive(Debug, Clone)]
pub struct Observation {
    pub path: PathBuf,
    pub raw_dir: PathBuf,
    pub output: ObservationLayout,
}

impl Observation {
    pub fn new(path: PathBuf, target: &OutputTarget, beam_data_dir: &str) -> Self {
        let raw_dir = path.join(beam_data_dir);
        let output = ObservationLayout::new(target.output_root(&path));
        Self {
            path,
            raw_dir,
            output,
        }
    }

    /// Scan names under the raw data directory, sorted.
    pub fn discover_scans(&self, backend: Backend) -> io::Result<Vec<String>> {
        let marker = backend.raw_marker();
        let mut scans = BTreeSet::new();
        for entry in fs::read_dir(&self.raw_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            if let Some(scan) = scan_name(&file_name.to_string_lossy(), marker) {
                scans.insert(scan.to_string());
            }
        }
        Ok(scans.into_iter().collect())
    }
}

/// Scan name of a raw file: everything before the first `marker`.
pub fn scan_name<'a>(file_name: &'a str, marker: &str) -> Option<&'a str> {
    let idx = file_name.find(marker)?;
    let rest = &file_name[idx + marker.len()..];
    // `.raw` must end the name or be followed by a part separator.
    if !(rest.is_empty() || rest.starts_with('.')) {
        return None;
    }
    let name = &file_name[..idx];
    (!name.is_empty()).then_some(name)
}

/// All scans, or only the latest one.
pub fn select_scans(mut scans: Vec<String>, all_scans: bool) -> Vec<String> {
    if all_scans {
        return scans;
    }
    scans.pop().into_iter().collect()
}
