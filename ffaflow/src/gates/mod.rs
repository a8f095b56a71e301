//! Stage gates.
//!
//! A gate inspects on-disk artifacts and decides whether a stage must run.
//! Gates never modify anything, so a rerun over a finished scan only reads.
//!
//! | Stage            | Complete when                                     | NoInput when                    |
//! |------------------|---------------------------------------------------|---------------------------------|
//! | EXTRACT          | `expected` valid `BM<n>.down.fil` + every header  | never                           |
//! | RFI_FILTER       | `expected` valid `BM<n>.down_RFI_Mitigated_01.fil`| never                           |
//! | FFA_RUN          | never                                             | never                           |
//! | CANDIDATE_FILTER | never                                             | no `summary.csv` under state    |
//! | CLASSIFY         | never                                             | no `combined_candidates.csv`    |

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::runtime::ScanLayout;
use crate::runtime::constants::{artifacts, filenames};

/// A regular file seen in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    pub name: String,
    pub size: u64,
}

/// Read-only view of the artifacts gates look at.
pub trait ArtifactProbe: Send + Sync {
    /// Regular files directly inside `dir`. A missing directory is empty.
    fn list_files(&self, dir: &Path) -> Vec<ArtifactEntry>;

    fn exists(&self, path: &Path) -> bool;

    /// Number of files named `file_name` anywhere below `root`.
    fn count_named(&self, root: &Path, file_name: &str) -> usize;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl ArtifactProbe for FsProbe {
    fn list_files(&self, dir: &Path) -> Vec<ArtifactEntry> {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter_map(|entry| {
                let meta = entry.metadata().ok()?;
                if !meta.is_file() {
                    return None;
                }
                Some(ArtifactEntry {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    size: meta.len(),
                })
            })
            .collect()
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn count_named(&self, root: &Path, file_name: &str) -> usize {
        WalkDir::new(root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file() && e.file_name() == file_name)
            .count()
    }
}

/// What a gate decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateVerdict {
    /// Output already present; skip.
    Complete,
    /// Nothing to work on; skip with a warning.
    NoInput(String),
    /// Run the stage.
    Pending,
}

impl GateVerdict {
    pub fn is_pending(&self) -> bool {
        matches!(self, GateVerdict::Pending)
    }
}

/// `BM<digits><suffix>` with a non-empty body.
pub fn is_valid_beam_file(entry: &ArtifactEntry, suffix: &str) -> bool {
    if entry.size == 0 {
        return false;
    }
    entry
        .name
        .strip_prefix(artifacts::BEAM_PREFIX)
        .and_then(|rest| rest.strip_suffix(suffix))
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Count valid beam files with `suffix` directly in `dir`.
pub fn count_beam_files(probe: &dyn ArtifactProbe, dir: &Path, suffix: &str) -> usize {
    probe
        .list_files(dir)
        .iter()
        .filter(|e| is_valid_beam_file(e, suffix))
        .count()
}

/// EXTRACT: every expected beam and every per-host header present.
pub fn extract_gate(
    probe: &dyn ArtifactProbe,
    layout: &ScanLayout,
    expected: usize,
    hosts: &[String],
) -> GateVerdict {
    let found = count_beam_files(probe, &layout.filterbank_dir, artifacts::EXTRACT_SUFFIX);
    if found != expected {
        tracing::debug!(found, expected, "Extraction output incomplete");
        return GateVerdict::Pending;
    }
    let missing: Vec<PathBuf> = hosts
        .iter()
        .map(|h| layout.header_path(h))
        .filter(|p| !probe.exists(p))
        .collect();
    if !missing.is_empty() {
        tracing::debug!(missing = missing.len(), "Extraction headers missing");
        return GateVerdict::Pending;
    }
    GateVerdict::Complete
}

/// RFI_FILTER: every expected mitigated beam present.
pub fn rfi_gate(probe: &dyn ArtifactProbe, layout: &ScanLayout, expected: usize) -> GateVerdict {
    let found = count_beam_files(probe, &layout.filterbank_dir, artifacts::RFI_SUFFIX);
    if found == expected {
        GateVerdict::Complete
    } else {
        tracing::debug!(found, expected, "RFI output incomplete");
        GateVerdict::Pending
    }
}

/// FFA_RUN always runs; the search resumes from its own state.
pub fn ffa_gate() -> GateVerdict {
    GateVerdict::Pending
}

/// CANDIDATE_FILTER needs at least one per-beam candidate summary.
pub fn cand_filter_gate(probe: &dyn ArtifactProbe, layout: &ScanLayout) -> GateVerdict {
    let summaries = probe.count_named(&layout.state_dir, filenames::CANDIDATE_SUMMARY);
    if summaries == 0 {
        GateVerdict::NoInput(format!(
            "no {} under {}",
            filenames::CANDIDATE_SUMMARY,
            layout.state_dir.display()
        ))
    } else {
        GateVerdict::Pending
    }
}

/// CLASSIFY needs the combined candidate table.
pub fn classify_gate(probe: &dyn ArtifactProbe, layout: &ScanLayout) -> GateVerdict {
    let combined = layout.combined_candidates_path();
    if probe.exists(&combined) {
        GateVerdict::Pending
    } else {
        GateVerdict::NoInput(format!("{} not found", combined.display()))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// In-memory probe: a map of file path → size.
    #[derive(Default)]
    pub struct MemProbe {
        files: Mutex<BTreeMap<PathBuf, u64>>,
    }

    impl MemProbe {
        pub fn add(&self, path: impl Into<PathBuf>, size: u64) {
            self.files.lock().unwrap().insert(path.into(), size);
        }
    }

    impl ArtifactProbe for MemProbe {
        fn list_files(&self, dir: &Path) -> Vec<ArtifactEntry> {
            self.files
                .lock()
                .unwrap()
                .iter()
                .filter(|(p, _)| p.parent() == Some(dir))
                .map(|(p, size)| ArtifactEntry {
                    name: p.file_name().unwrap().to_string_lossy().into_owned(),
                    size: *size,
                })
                .collect()
        }

        fn exists(&self, path: &Path) -> bool {
            self.files.lock().unwrap().contains_key(path)
        }

        fn count_named(&self, root: &Path, file_name: &str) -> usize {
            self.files
                .lock()
                .unwrap()
                .keys()
                .filter(|p| p.starts_with(root) && p.file_name().is_some_and(|n| n == file_name))
                .count()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemProbe;
    use super::*;
    use crate::runtime::ObservationLayout;
    use tempfile::TempDir;

    fn layout() -> ScanLayout {
        ObservationLayout::new(PathBuf::from("/out")).scan("scan_001")
    }

    fn hosts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("node{:02}", i)).collect()
    }

    fn populate(probe: &MemProbe, layout: &ScanLayout, suffix: &str, count: usize) {
        for beam in 0..count {
            probe.add(
                layout.filterbank_dir.join(format!("BM{}{}", beam, suffix)),
                1024,
            );
        }
    }

    fn add_headers(probe: &MemProbe, layout: &ScanLayout, hosts: &[String]) {
        for host in hosts {
            probe.add(layout.header_path(host), 64);
        }
    }

    #[test]
    fn test_beam_file_validity() {
        let entry = |name: &str, size| ArtifactEntry {
            name: name.to_string(),
            size,
        };
        let sfx = artifacts::EXTRACT_SUFFIX;
        assert!(is_valid_beam_file(&entry("BM12.down.fil", 10), sfx));
        assert!(!is_valid_beam_file(&entry("BM12.down.fil", 0), sfx));
        assert!(!is_valid_beam_file(&entry("BM.down.fil", 10), sfx));
        assert!(!is_valid_beam_file(&entry("BMx1.down.fil", 10), sfx));
        assert!(!is_valid_beam_file(&entry("XX1.down.fil", 10), sfx));
        assert!(!is_valid_beam_file(&entry("BM1.down_RFI_Mitigated_01.fil", 10), sfx));
        assert!(is_valid_beam_file(
            &entry("BM1.down_RFI_Mitigated_01.fil", 10),
            artifacts::RFI_SUFFIX
        ));
    }

    #[test]
    fn test_extract_gate_exact_count() {
        let layout = layout();
        let hosts = hosts(16);

        let probe = MemProbe::default();
        populate(&probe, &layout, artifacts::EXTRACT_SUFFIX, 160);
        add_headers(&probe, &layout, &hosts);
        assert_eq!(extract_gate(&probe, &layout, 160, &hosts), GateVerdict::Complete);

        let probe = MemProbe::default();
        populate(&probe, &layout, artifacts::EXTRACT_SUFFIX, 159);
        add_headers(&probe, &layout, &hosts);
        assert_eq!(extract_gate(&probe, &layout, 160, &hosts), GateVerdict::Pending);

        let probe = MemProbe::default();
        populate(&probe, &layout, artifacts::EXTRACT_SUFFIX, 161);
        add_headers(&probe, &layout, &hosts);
        assert_eq!(extract_gate(&probe, &layout, 160, &hosts), GateVerdict::Pending);
    }

    #[test]
    fn test_extract_gate_missing_header() {
        let layout = layout();
        let hosts = hosts(16);
        let probe = MemProbe::default();
        populate(&probe, &layout, artifacts::EXTRACT_SUFFIX, 160);
        add_headers(&probe, &layout, &hosts[1..]);
        assert_eq!(extract_gate(&probe, &layout, 160, &hosts), GateVerdict::Pending);
    }

    #[test]
    fn test_extract_gate_ignores_empty_files() {
        let layout = layout();
        let hosts = hosts(1);
        let probe = MemProbe::default();
        populate(&probe, &layout, artifacts::EXTRACT_SUFFIX, 9);
        probe.add(layout.filterbank_dir.join("BM9.down.fil"), 0);
        add_headers(&probe, &layout, &hosts);
        assert_eq!(extract_gate(&probe, &layout, 10, &hosts), GateVerdict::Pending);
    }

    #[test]
    fn test_rfi_gate() {
        let layout = layout();
        let probe = MemProbe::default();
        populate(&probe, &layout, artifacts::EXTRACT_SUFFIX, 20);
        populate(&probe, &layout, artifacts::RFI_SUFFIX, 19);
        assert_eq!(rfi_gate(&probe, &layout, 20), GateVerdict::Pending);
        probe.add(layout.filterbank_dir.join("BM19.down_RFI_Mitigated_01.fil"), 8);
        assert_eq!(rfi_gate(&probe, &layout, 20), GateVerdict::Complete);
    }

    #[test]
    fn test_ffa_gate_always_runs() {
        assert!(ffa_gate().is_pending());
    }

    #[test]
    fn test_cand_filter_gate() {
        let layout = layout();
        let probe = MemProbe::default();
        assert!(matches!(
            cand_filter_gate(&probe, &layout),
            GateVerdict::NoInput(_)
        ));
        probe.add(layout.state_dir.join("BM3").join("candidates").join("summary.csv"), 10);
        assert_eq!(cand_filter_gate(&probe, &layout), GateVerdict::Pending);
    }

    #[test]
    fn test_classify_gate() {
        let layout = layout();
        let probe = MemProbe::default();
        assert!(matches!(classify_gate(&probe, &layout), GateVerdict::NoInput(_)));
        probe.add(layout.combined_candidates_path(), 10);
        assert_eq!(classify_gate(&probe, &layout), GateVerdict::Pending);
    }

    #[test]
    fn test_fs_probe() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("fil");
        assert!(FsProbe.list_files(&dir).is_empty());

        std::fs::create_dir_all(dir.join("sub").join("candidates")).unwrap();
        std::fs::write(dir.join("BM0.down.fil"), b"data").unwrap();
        std::fs::write(dir.join("BM1.down.fil"), b"").unwrap();
        std::fs::write(dir.join("sub").join("candidates").join("summary.csv"), b"x").unwrap();

        let mut entries = FsProbe.list_files(&dir);
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(
            entries,
            vec![
                ArtifactEntry {
                    name: "BM0.down.fil".into(),
                    size: 4
                },
                ArtifactEntry {
                    name: "BM1.down.fil".into(),
                    size: 0
                },
            ]
        );
        assert_eq!(count_beam_files(&FsProbe, &dir, artifacts::EXTRACT_SUFFIX), 1);
        assert_eq!(FsProbe.count_named(&dir, "summary.csv"), 1);
        assert!(FsProbe.exists(&dir.join("BM0.down.fil")));
    }
}
