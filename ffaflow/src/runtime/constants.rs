//! Names of files, directories and environment variables shared between
//! ffaflow and the external pipeline programs.

/// File names.
pub mod filenames {
    /// Host-weight placement listing (`host slots=1`).
    pub const HOSTFILE: &str = "hostfile";
    /// Rank placement listing (`rank i=host slot=0`).
    pub const RANKFILE: &str = "rankfile";
    /// Process-wide ON/OFF marker.
    pub const RUN_STATUS: &str = "run_status";
    /// One line per processed observation, across all runs.
    pub const AUDIT_LOG: &str = "audit.log";
    /// Per-observation append-only log.
    pub const OBSERVATION_LOG: &str = "observation.log";
    /// Extension of per-scan status logs.
    pub const SCAN_STATUS_EXT: &str = "status";
    /// Per-scan run configuration handed to the FFA stage.
    pub const FFA_CONFIG: &str = "ffa_config.json";
    /// Per-beam candidate summary written by the FFA stage.
    pub const CANDIDATE_SUMMARY: &str = "summary.csv";
    /// Cross-beam candidate table written by the candidate filter.
    pub const COMBINED_CANDIDATES: &str = "combined_candidates.csv";
    /// Extension of per-host header artifacts written by extraction.
    pub const HEADER_EXT: &str = "ahdr";
}

/// Directory names.
pub mod dirs {
    /// Output subdirectory used when `-o auto` is given.
    pub const AUTO_OUTPUT: &str = "FFAPipeData";
    /// Extracted and RFI-mitigated filterbanks, one subdirectory per scan.
    pub const FILTERBANKS: &str = "BeamFils";
    /// FFA search state, one subdirectory per scan.
    pub const STATE: &str = "state";
    /// Status logs inside an output root.
    pub const STATUS: &str = "status";
    /// Header artifacts inside a scan's filterbank directory.
    pub const HEADERS: &str = "headers";
    /// Application logs inside the state home.
    pub const LOGS: &str = "logs";
}

/// Artifact naming produced by the external stages.
pub mod artifacts {
    /// Every beam artifact starts with `BM<beam number>`.
    pub const BEAM_PREFIX: &str = "BM";
    /// Suffix of an extracted, downsampled filterbank.
    pub const EXTRACT_SUFFIX: &str = ".down.fil";
    /// Suffix of an RFI-mitigated filterbank.
    pub const RFI_SUFFIX: &str = ".down_RFI_Mitigated_01.fil";
    /// Raw data marker in raw file names (`<scan>.raw.<n>`).
    pub const RAW_MARKER: &str = ".raw";
    /// Filterbank marker for backends that already deliver filterbanks.
    pub const FIL_MARKER: &str = ".fil";
}

/// Environment variables exported to every rank by the fan-out launcher.
pub mod env {
    pub const RANK: &str = "FFAFLOW_RANK";
    pub const NRANKS: &str = "FFAFLOW_NRANKS";
    pub const HOST: &str = "FFAFLOW_HOST";
}

/// Marker echoed after a remote command batch to carry the last exit status.
pub const EXIT_MARKER: &str = "__FFAFLOW_EXIT__:";
