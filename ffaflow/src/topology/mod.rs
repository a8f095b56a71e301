//! Rank placement for distributed stages.
//!
//! ```text
//! node list file ──→ NodeList ──→ RankMapping ──→ hostfile + rankfile
//!                    (rank = line order, one slot per host)
//! ```
//!
//! Placement is generated once at boot. A placement that cannot be written
//! and read back non-empty is fatal; nothing downstream can run without it.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::{FfaError, FfaResult};
use crate::runtime::constants::filenames;
use crate::util::list_entries;

/// Ordered, unique host identifiers. Rank `i` runs on `hosts()[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeList {
    hosts: Vec<String>,
}

impl NodeList {
    /// Parse a node list. Empty lists and duplicate hosts are rejected.
    pub fn parse(text: &str) -> FfaResult<Self> {
        let mut hosts: Vec<String> = Vec::new();
        for (line_no, host) in list_entries(text) {
            if hosts.iter().any(|h| h == host) {
                return Err(FfaError::Config(format!(
                    "duplicate host '{}' in node list (line {})",
                    host, line_no
                )));
            }
            hosts.push(host.to_string());
        }
        Self::new(hosts)
    }

    pub fn new(hosts: Vec<String>) -> FfaResult<Self> {
        if hosts.is_empty() {
            return Err(FfaError::Config("node list is empty".into()));
        }
        Ok(Self { hosts })
    }

    pub fn load(path: &Path) -> FfaResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            FfaError::Config(format!(
                "failed to read node list {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&text)
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// First host; runs single-host stages unless configured otherwise.
    pub fn head(&self) -> &str {
        &self.hosts[0]
    }
}

/// One rank's placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankSlot {
    pub rank: usize,
    pub host: String,
    pub slot: usize,
}

/// Rank → (host, slot). Ranks are contiguous from 0, one per host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankMapping {
    slots: Vec<RankSlot>,
}

impl RankMapping {
    pub fn from_nodes(nodes: &NodeList) -> Self {
        let slots = nodes
            .hosts()
            .iter()
            .enumerate()
            .map(|(rank, host)| RankSlot {
                rank,
                host: host.clone(),
                slot: 0,
            })
            .collect();
        Self { slots }
    }

    pub fn slots(&self) -> &[RankSlot] {
        &self.slots
    }

    pub fn rank_count(&self) -> usize {
        self.slots.len()
    }

    pub fn host_of(&self, rank: usize) -> Option<&str> {
        self.slots.get(rank).map(|s| s.host.as_str())
    }

    /// `<host> slots=1` per rank, in rank order.
    pub fn host_weight_listing(&self) -> String {
        self.slots
            .iter()
            .map(|s| format!("{} slots=1\n", s.host))
            .collect()
    }

    /// `rank <i>=<host> slot=<slot>` per rank, in rank order.
    pub fn rank_listing(&self) -> String {
        self.slots
            .iter()
            .map(|s| format!("rank {}={} slot={}\n", s.rank, s.host, s.slot))
            .collect()
    }
}

/// Locations of the generated placement artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementFiles {
    pub hostfile: PathBuf,
    pub rankfile: PathBuf,
}

/// Write the hostfile and rankfile into `dir` and verify both.
///
/// Each file is written to a temporary sibling and renamed into place, so a
/// reader sees either the previous file or the complete new one.
pub fn write_placement(mapping: &RankMapping, dir: &Path) -> FfaResult<PlacementFiles> {
    fs::create_dir_all(dir).map_err(|e| {
        FfaError::Topology(format!(
            "failed to create placement directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let files = PlacementFiles {
        hostfile: dir.join(filenames::HOSTFILE),
        rankfile: dir.join(filenames::RANKFILE),
    };

    write_atomic(&files.hostfile, &mapping.host_weight_listing())?;
    write_atomic(&files.rankfile, &mapping.rank_listing())?;

    verify_non_empty(&files.hostfile)?;
    verify_non_empty(&files.rankfile)?;

    tracing::info!(
        ranks = mapping.rank_count(),
        hostfile = %files.hostfile.display(),
        rankfile = %files.rankfile.display(),
        "Wrote rank placement"
    );

    Ok(files)
}

fn write_atomic(path: &Path, contents: &str) -> FfaResult<()> {
    let tmp = path.with_extension("tmp");
    let result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();
    result.map_err(|e| {
        let _ = fs::remove_file(&tmp);
        FfaError::Topology(format!("failed to write {}: {}", path.display(), e))
    })
}

fn verify_non_empty(path: &Path) -> FfaResult<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(FfaError::Topology(format!(
            "placement file {} is empty",
            path.display()
        ))),
        Err(e) => Err(FfaError::Topology(format!(
            "placement file {} is unreadable: {}",
            path.display(),
            e
        ))),
    }
}

/// Node list, derived mapping and the files describing it.
#[derive(Debug, Clone)]
pub struct Topology {
    pub nodes: NodeList,
    pub mapping: RankMapping,
    pub placement: PlacementFiles,
}

impl Topology {
    /// Derive the mapping from `nodes` and write placement files into `dir`.
    pub fn build(nodes: NodeList, dir: &Path) -> FfaResult<Self> {
        let mapping = RankMapping::from_nodes(&nodes);
        let placement = write_placement(&mapping, dir)?;
        Ok(Self {
            nodes,
            mapping,
            placement,
        })
    }

    pub fn host_count(&self) -> usize {
        self.nodes.len()
    }
}
