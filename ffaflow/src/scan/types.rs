//! Scan context types.

use std::path::PathBuf;
use std::sync::Arc;

use crate::gates::ArtifactProbe;
use crate::launcher::DistributedLauncher;
use crate::remote::RemoteExec;
use crate::runtime::{Backend, PipelineConfig, RunOptions, ScanLayout, StagePrograms};
use crate::topology::Topology;

/// Stage parameters that are the same for every scan of a run.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub backend: Backend,
    pub beams_per_host: u32,
    pub time_bin: u32,
    pub freq_bin: u32,
    pub jobs: u32,
    pub offset: i32,
    pub programs: StagePrograms,
    /// Runs the candidate filter.
    pub head_host: String,
    /// Runs the classifier.
    pub classify_host: String,
}

impl ScanSettings {
    pub fn from_run(options: &RunOptions, config: &PipelineConfig, topology: &Topology) -> Self {
        let head_host = config
            .head_host
            .clone()
            .unwrap_or_else(|| topology.nodes.head().to_string());
        let classify_host = config
            .classify_host
            .clone()
            .unwrap_or_else(|| head_host.clone());
        Self {
            backend: options.backend,
            beams_per_host: config.beams_per_host,
            time_bin: options.time_bin,
            freq_bin: options.freq_bin,
            jobs: options.jobs,
            offset: options.offset,
            programs: config.programs.clone(),
            head_host,
            classify_host,
        }
    }
}

/// Collaborators shared by every scan of a run.
#[derive(Clone)]
pub struct ScanServices {
    pub settings: Arc<ScanSettings>,
    pub topology: Arc<Topology>,
    pub launcher: Arc<dyn DistributedLauncher>,
    pub remote: Arc<dyn RemoteExec>,
    pub probe: Arc<dyn ArtifactProbe>,
}

/// Everything a stage task needs to work on one scan.
pub struct ScanContext {
    pub scan: String,
    /// Raw beam data of the observation.
    pub raw_dir: PathBuf,
    pub layout: ScanLayout,
    pub services: ScanServices,
}

impl ScanContext {
    pub fn new(scan: String, raw_dir: PathBuf, layout: ScanLayout, services: ScanServices) -> Self {
        Self {
            scan,
            raw_dir,
            layout,
            services,
        }
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.services.settings
    }

    pub fn topology(&self) -> &Topology {
        &self.services.topology
    }

    /// Beams the extraction and RFI stages must produce for this scan.
    pub fn expected_beams(&self) -> usize {
        self.settings().beams_per_host as usize * self.topology().host_count()
    }
}
