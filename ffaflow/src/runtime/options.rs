//! Run options and pipeline configuration.
//!
//! Two layers:
//! - [`RunOptions`]: what to process in this invocation (from the CLI)
//! - [`PipelineConfig`]: how to run the stages (from an optional JSON file)
//!
//! Both are immutable once the coordinator starts. Nothing here is written
//! back to disk; per-invocation values reach the stages through
//! [`crate::launcher::LaunchSpec`].

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{FfaError, FfaResult};

/// Raw-data source that produced the observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum Backend {
    /// GMRT Software Backend.
    #[value(name = "GSB")]
    #[serde(rename = "GSB")]
    Gsb,
    /// GMRT Wideband Backend.
    #[value(name = "GWB")]
    #[serde(rename = "GWB")]
    Gwb,
    /// SPOTLIGHT multi-beam backend.
    #[default]
    #[value(name = "SPOTLIGHT")]
    #[serde(rename = "SPOTLIGHT")]
    Spotlight,
    /// Simulated GWB data, delivered as filterbanks.
    #[value(name = "SIM")]
    #[serde(rename = "SIM")]
    Sim,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Gsb => "GSB",
            Backend::Gwb => "GWB",
            Backend::Spotlight => "SPOTLIGHT",
            Backend::Sim => "SIM",
        }
    }

    /// Marker that identifies raw data files of this backend.
    pub fn raw_marker(&self) -> &'static str {
        use crate::runtime::constants::artifacts;
        match self {
            Backend::Sim => artifacts::FIL_MARKER,
            _ => artifacts::RAW_MARKER,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where output roots are placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// `<observation>/FFAPipeData`
    Auto,
    /// `<dir>/<observation basename>`
    Directory(PathBuf),
}

impl OutputTarget {
    pub fn parse(value: &str) -> FfaResult<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(FfaError::Config("output directory must not be empty".into()));
        }
        if value.eq_ignore_ascii_case("auto") {
            Ok(OutputTarget::Auto)
        } else {
            Ok(OutputTarget::Directory(PathBuf::from(value)))
        }
    }

    /// Output root for one observation.
    pub fn output_root(&self, observation: &Path) -> PathBuf {
        use crate::runtime::constants::dirs;
        match self {
            OutputTarget::Auto => observation.join(dirs::AUTO_OUTPUT),
            OutputTarget::Directory(dir) => match observation.file_name() {
                Some(name) => dir.join(name),
                None => dir.join(dirs::AUTO_OUTPUT),
            },
        }
    }
}

/// Options for one coordinator run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// File listing observation directories.
    pub input_list: PathBuf,
    pub output: OutputTarget,
    /// File listing compute hosts, one per rank.
    pub node_list: PathBuf,
    pub backend: Backend,
    /// Process every scan of an observation instead of only the latest.
    pub all_scans: bool,
    /// Time binning factor handed to extraction.
    pub time_bin: u32,
    /// Frequency binning factor handed to extraction.
    pub freq_bin: u32,
    /// Parallel extraction jobs per rank.
    pub jobs: u32,
    /// Beam offset handed to extraction.
    pub offset: i32,
    /// Optional pipeline configuration file.
    pub config: Option<PathBuf>,
}

impl RunOptions {
    /// Validate options before any work starts.
    pub fn sanitize(&self) -> FfaResult<()> {
        if self.jobs == 0 {
            return Err(FfaError::Config(
                "parallel job count (-j) must be a positive integer".into(),
            ));
        }
        if !self.input_list.is_file() {
            return Err(FfaError::Config(format!(
                "observation list not found: {}",
                self.input_list.display()
            )));
        }
        if !self.node_list.is_file() {
            return Err(FfaError::Config(format!(
                "node list not found: {}",
                self.node_list.display()
            )));
        }
        if let Some(config) = &self.config
            && !config.is_file()
        {
            return Err(FfaError::Config(format!(
                "pipeline config not found: {}",
                config.display()
            )));
        }
        Ok(())
    }
}

/// A program plus fixed leading arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandTemplate {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Fixed arguments followed by `extra`.
    pub fn args_with<I, S>(&self, extra: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args
            .iter()
            .cloned()
            .chain(extra.into_iter().map(Into::into))
            .collect()
    }

    /// Full command line as words.
    pub fn command_line<I, S>(&self, extra: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        std::iter::once(self.program.clone())
            .chain(self.args_with(extra))
            .collect()
    }
}

/// External programs run by each stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagePrograms {
    pub extract: CommandTemplate,
    pub rfi_filter: CommandTemplate,
    pub ffa_run: CommandTemplate,
    pub cand_filter: CommandTemplate,
    pub classify: CommandTemplate,
}

impl Default for StagePrograms {
    fn default() -> Self {
        Self {
            extract: CommandTemplate::new("python3", &["src_scripts/raw_to_fil.py"]),
            rfi_filter: CommandTemplate::new("python3", &["src_scripts/rfi_filter_filtool.py"]),
            ffa_run: CommandTemplate::new("python3", &["multi_config.py"]),
            cand_filter: CommandTemplate::new("python3", &["src_scripts/cand_filter.py"]),
            classify: CommandTemplate::new("python3", &["src_scripts/classify.py"]),
        }
    }
}

/// How distributed stages are started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LauncherKind {
    /// `mpirun` with generated hostfile and rankfile.
    #[default]
    Mpi,
    /// One remote command per rank over the remote channel.
    Ssh,
}

/// Transport for remote command batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    /// `ssh <host> bash -s` on every host.
    #[default]
    Ssh,
    /// `sh -s` on this machine, whatever the host name. For single-host runs.
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    pub program: String,
    pub options: Vec<String>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            program: "ssh".to_string(),
            options: vec![
                "-o".to_string(),
                "BatchMode=yes".to_string(),
                "-o".to_string(),
                "ConnectTimeout=10".to_string(),
            ],
        }
    }
}

/// Pipeline configuration, loaded from JSON. Every field has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Beams each host extracts per scan.
    pub beams_per_host: u32,
    pub launcher: LauncherKind,
    pub remote: RemoteKind,
    /// `mpirun` executable.
    pub mpirun: String,
    pub ssh: SshSettings,
    /// Directory for placement files, run status, audit log and logs.
    pub state_home: PathBuf,
    /// Subdirectory of an observation holding raw beam data.
    pub beam_data_dir: String,
    /// Host that runs the candidate filter. Defaults to the first node.
    pub head_host: Option<String>,
    /// Host that runs the classifier. Defaults to the head host.
    pub classify_host: Option<String>,
    pub programs: StagePrograms,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            beams_per_host: 10,
            launcher: LauncherKind::Mpi,
            remote: RemoteKind::Ssh,
            mpirun: "mpirun".to_string(),
            ssh: SshSettings::default(),
            state_home: PathBuf::from(".ffaflow"),
            beam_data_dir: "BeamData".to_string(),
            head_host: None,
            classify_host: None,
            programs: StagePrograms::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file.
    pub fn load(path: &Path) -> FfaResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            FfaError::Config(format!(
                "failed to read pipeline config {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: PipelineConfig = serde_json::from_str(&text).map_err(|e| {
            FfaError::Config(format!(
                "invalid pipeline config {}: {}",
                path.display(),
                e
            ))
        })?;
        config.sanitize()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> FfaResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn sanitize(&self) -> FfaResult<()> {
        if self.beams_per_host == 0 {
            return Err(FfaError::Config("beams_per_host must be at least 1".into()));
        }
        if self.beam_data_dir.trim().is_empty() {
            return Err(FfaError::Config("beam_data_dir must not be empty".into()));
        }
        Ok(())
    }
}
