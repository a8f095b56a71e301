//! Observation/run coordinator.
//!
//! ```text
//! prepare:  node list → Topology (placement files) → remote channel + launcher
//! run:      run_status ON
//!           for observation in list:        (sequential)
//!               for scan in selected scans: (sequential)
//!                   scan::run_scan
//!               observation.log + audit.log
//!           run_status OFF
//! ```
//!
//! Scan and observation failures are recorded and the loop continues. Only
//! configuration, topology, connection, launcher and cancellation errors
//! leave the loop; the run-status guard still marks the run OFF.

mod report;

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use ulid::Ulid;

use crate::errors::FfaResult;
use crate::gates::{ArtifactProbe, FsProbe};
use crate::launcher::{DistributedLauncher, MpiLauncher, RankFanoutLauncher};
use crate::observation::{Observation, ObservationList, select_scans};
use crate::remote::{self, RemoteExec};
use crate::runtime::{FilesystemLayout, LauncherKind, PipelineConfig, RunOptions};
use crate::scan::{self, ScanContext, ScanServices, ScanSettings};
use crate::status::{AuditLog, ObservationLog, RunStatusFile, RunStatusGuard};
use crate::topology::{NodeList, Topology};

pub use report::{ObservationReport, RunSummary, ScanSummary};

/// Subject used for the observation-level line in `observation.log`.
const OBSERVATION_SUBJECT: &str = "OBSERVATION";

pub struct Coordinator {
    options: RunOptions,
    config: PipelineConfig,
    layout: FilesystemLayout,
    services: ScanServices,
    run_id: Ulid,
}

impl Coordinator {
    /// Validate inputs, build the topology and connect the real collaborators.
    pub fn prepare(
        options: RunOptions,
        config: PipelineConfig,
        cancel: CancellationToken,
    ) -> FfaResult<Self> {
        options.sanitize()?;
        config.sanitize()?;

        let layout = FilesystemLayout::new(config.state_home.clone());
        layout.prepare()?;

        let nodes = NodeList::load(&options.node_list)?;
        let topology = Arc::new(Topology::build(nodes, layout.home_dir())?);

        let remote = remote::channel_for(config.remote, &config.ssh, cancel.clone());
        let launcher: Arc<dyn DistributedLauncher> = match config.launcher {
            LauncherKind::Mpi => Arc::new(MpiLauncher::new(
                config.mpirun.clone(),
                topology.placement.clone(),
                cancel,
            )),
            LauncherKind::Ssh => Arc::new(RankFanoutLauncher::new(Arc::clone(&remote))),
        };

        Ok(Self::with_collaborators(
            options,
            config,
            topology,
            launcher,
            remote,
            Arc::new(FsProbe),
        ))
    }

    /// Assemble a coordinator from already-built parts.
    pub fn with_collaborators(
        options: RunOptions,
        config: PipelineConfig,
        topology: Arc<Topology>,
        launcher: Arc<dyn DistributedLauncher>,
        remote: Arc<dyn RemoteExec>,
        probe: Arc<dyn ArtifactProbe>,
    ) -> Self {
        let layout = FilesystemLayout::new(config.state_home.clone());
        let settings = Arc::new(ScanSettings::from_run(&options, &config, &topology));
        let run_id = Ulid::new();
        tracing::debug!(run_id = %run_id, hosts = topology.host_count(), "Coordinator ready");
        Self {
            options,
            config,
            layout,
            services: ScanServices {
                settings,
                topology,
                launcher,
                remote,
                probe,
            },
            run_id,
        }
    }

    pub fn run_id(&self) -> Ulid {
        self.run_id
    }

    /// Process every observation in the input list.
    pub async fn run(&self) -> FfaResult<RunSummary> {
        let list = ObservationList::load(&self.options.input_list)?;

        let all_scans = if list.len() > 1 && !self.options.all_scans {
            tracing::warn!(
                observations = list.len(),
                "Several observations listed, processing all scans of each"
            );
            true
        } else {
            self.options.all_scans
        };

        let hosts = self.services.topology.nodes.hosts().to_vec();
        let status = RunStatusGuard::begin(
            RunStatusFile::new(self.layout.run_status_path()),
            hosts,
            self.run_id,
        );
        let audit = AuditLog::new(self.layout.audit_log_path(), self.run_id);

        tracing::info!(
            run_id = %self.run_id,
            observations = list.len(),
            skipped = list.skipped.len(),
            all_scans,
            "Run started"
        );

        let mut summary = RunSummary {
            run_id: self.run_id,
            observations: Vec::new(),
            skipped_entries: list.skipped.clone(),
        };

        for path in &list.observations {
            let report = self.run_observation(path.clone(), all_scans).await?;
            audit.record(path, &report.verdict());
            summary.observations.push(report);
        }

        status.finish();
        tracing::info!(
            run_id = %self.run_id,
            processed = summary.observations.len(),
            failed = summary.failed_observations(),
            "Run finished"
        );
        Ok(summary)
    }

    async fn run_observation(
        &self,
        path: PathBuf,
        all_scans: bool,
    ) -> FfaResult<ObservationReport> {
        let observation = Observation::new(
            path.clone(),
            &self.options.output,
            &self.config.beam_data_dir,
        );
        let mut report = ObservationReport::new(path);

        tracing::info!(
            observation = %observation.path.display(),
            output = %observation.output.root().display(),
            "Processing observation"
        );

        if let Err(e) = observation.output.prepare() {
            tracing::error!(
                observation = %observation.path.display(),
                error = %e,
                "Cannot prepare output root"
            );
            report.error = Some(e.to_string());
            return Ok(report);
        }
        let log = ObservationLog::new(observation.output.observation_log_path());

        let scans = match observation.discover_scans(self.options.backend) {
            Ok(scans) => scans,
            Err(e) => {
                let error = format!(
                    "cannot read raw data directory {}: {}",
                    observation.raw_dir.display(),
                    e
                );
                tracing::error!(observation = %observation.path.display(), "{}", error);
                report.error = Some(error);
                log.record(OBSERVATION_SUBJECT, &report.verdict());
                return Ok(report);
            }
        };
        if scans.is_empty() {
            tracing::warn!(raw_dir = %observation.raw_dir.display(), "No scans found");
        }

        for scan_name in select_scans(scans, all_scans) {
            let ctx = ScanContext::new(
                scan_name.clone(),
                observation.raw_dir.clone(),
                observation.output.scan(&scan_name),
                self.services.clone(),
            );
            let scan_report = scan::run_scan(&ctx).await?;
            let summary = ScanSummary::from_report(scan_name, &scan_report);
            log.record(&summary.scan, &summary.verdict());
            report.scans.push(summary);
        }

        log.record(OBSERVATION_SUBJECT, &report.verdict());
        let verdict = report.verdict();
        if report.failed() {
            tracing::error!(observation = %report.path.display(), %verdict, "Observation failed");
        } else {
            tracing::info!(observation = %report.path.display(), %verdict, "Observation finished");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FfaError;
    use crate::observation::SkipCause;
    use crate::runtime::{Backend, OutputTarget};
    use crate::scan::testing::{FakeLauncher, FakeRemote, combined_producer, output_producer};
    use std::fs;
    use std::io;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const HOSTS: [&str; 2] = ["n1", "n2"];

    struct Fixture {
        temp: TempDir,
        launcher: Arc<FakeLauncher>,
        remote: Arc<FakeRemote>,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            fs::write(temp.path().join("nodes.txt"), HOSTS.join("\n")).unwrap();
            Self {
                temp,
                launcher: Arc::new(FakeLauncher::default()),
                remote: Arc::new(FakeRemote::default()),
            }
        }

        /// Observation directory with one raw file per scan name.
        fn observation(&self, name: &str, scans: &[&str]) -> PathBuf {
            let dir = self.temp.path().join("data").join(name);
            let raw = dir.join("BeamData");
            fs::create_dir_all(&raw).unwrap();
            for scan in scans {
                fs::write(raw.join(format!("{}.raw.0", scan)), b"raw").unwrap();
            }
            dir
        }

        fn write_list(&self, entries: &[&Path]) -> PathBuf {
            let text: Vec<String> = entries.iter().map(|p| p.display().to_string()).collect();
            let path = self.temp.path().join("observations.txt");
            fs::write(&path, text.join("\n")).unwrap();
            path
        }

        fn state_home(&self) -> PathBuf {
            self.temp.path().join("state_home")
        }

        fn coordinator(&self, input_list: PathBuf, all_scans: bool) -> Coordinator {
            let options = RunOptions {
                input_list,
                output: OutputTarget::Directory(self.temp.path().join("out")),
                node_list: self.temp.path().join("nodes.txt"),
                backend: Backend::Gwb,
                all_scans,
                time_bin: 1,
                freq_bin: 1,
                jobs: 1,
                offset: 0,
                config: None,
            };
            let config = PipelineConfig {
                state_home: self.state_home(),
                ..Default::default()
            };
            let nodes = NodeList::load(&options.node_list).unwrap();
            let topology = Arc::new(Topology::build(nodes, &self.state_home()).unwrap());
            Coordinator::with_collaborators(
                options,
                config,
                topology,
                self.launcher.clone(),
                self.remote.clone(),
                Arc::new(FsProbe),
            )
        }

        fn hosts(&self) -> Vec<String> {
            HOSTS.iter().map(|h| h.to_string()).collect()
        }

        fn run_status(&self) -> String {
            fs::read_to_string(self.state_home().join("run_status")).unwrap()
        }

        fn audit_lines(&self) -> usize {
            fs::read_to_string(self.state_home().join("audit.log"))
                .unwrap()
                .lines()
                .count()
        }
    }

    #[tokio::test]
    async fn test_missing_observation_is_skipped() {
        let fx = Fixture::new();
        let a = fx.observation("obs_a", &["s1"]);
        let b = fx.observation("obs_b", &["s1"]);
        let c = fx.observation("obs_c", &["s1"]);
        let missing = fx.temp.path().join("data").join("obs_missing");
        let list = fx.write_list(&[&a, &missing, &b, &c]);

        let summary = fx.coordinator(list, true).run().await.unwrap();

        assert_eq!(summary.observations.len(), 3);
        assert_eq!(summary.skipped_entries.len(), 1);
        assert_eq!(summary.skipped_entries[0].cause, SkipCause::Missing);
        assert_eq!(summary.skipped_entries[0].line, 2);
        assert_eq!(fx.audit_lines(), 3);
        assert!(fx.run_status().starts_with("OFF\nn1 n2\n"));
    }

    /// Shared in-memory sink for formatted log output.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[tokio::test]
    async fn test_missing_observation_logs_one_error() {
        let fx = Fixture::new();
        fx.launcher.on_launch(output_producer(fx.hosts(), 10));
        fx.remote.on_run(combined_producer);
        let a = fx.observation("obs_a", &["s1"]);
        let missing = fx.temp.path().join("data").join("obs_missing");
        let list = fx.write_list(&[&a, &missing]);

        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _default = tracing::subscriber::set_default(subscriber);

        let summary = fx.coordinator(list, true).run().await.unwrap();
        assert_eq!(summary.skipped_entries.len(), 1);
        assert_eq!(summary.failed_observations(), 0);

        let output = logs.contents();
        let errors: Vec<&str> = output.lines().filter(|l| l.contains("ERROR")).collect();
        assert_eq!(errors.len(), 1, "unexpected error lines: {errors:?}");
        assert!(errors[0].contains("Skipping observation list entry"));
        assert!(errors[0].contains("obs_missing"));
    }

    #[tokio::test]
    async fn test_prepare_with_local_transport() {
        let fx = Fixture::new();
        let a = fx.observation("obs_a", &[]);
        let list = fx.write_list(&[&a]);
        let options = RunOptions {
            input_list: list,
            output: OutputTarget::Auto,
            node_list: fx.temp.path().join("nodes.txt"),
            backend: Backend::Gwb,
            all_scans: false,
            time_bin: 1,
            freq_bin: 1,
            jobs: 1,
            offset: 0,
            config: None,
        };
        let config = PipelineConfig {
            state_home: fx.state_home(),
            launcher: LauncherKind::Ssh,
            remote: crate::runtime::RemoteKind::Local,
            ..Default::default()
        };

        let coordinator = Coordinator::prepare(options, config, CancellationToken::new()).unwrap();
        let capture = coordinator
            .services
            .remote
            .run("n2", &["echo reached".to_string()])
            .await
            .unwrap();
        assert_eq!(capture.stdout, "reached\n");

        let summary = coordinator.run().await.unwrap();
        assert_eq!(summary.failed_observations(), 0);
        assert!(fx.state_home().join("hostfile").is_file());
    }

    #[tokio::test]
    async fn test_connection_failure_aborts_and_marks_off() {
        let fx = Fixture::new();
        fx.launcher.on_launch(output_producer(fx.hosts(), 10));
        fx.remote.unreachable("n1");
        let a = fx.observation("obs_a", &["s1"]);
        let b = fx.observation("obs_b", &["s1"]);
        let list = fx.write_list(&[&a, &b]);

        let err = fx.coordinator(list, true).run().await.unwrap_err();

        assert!(matches!(err, FfaError::Connection { .. }));
        assert_eq!(err.exit_code(), 255);
        assert!(fx.run_status().starts_with("OFF\n"));
        // The first observation was aborted before its audit line.
        assert!(!fx.state_home().join("audit.log").exists());
        // Nothing from the second observation was launched.
        assert_eq!(
            fx.launcher.labels(),
            vec!["EXTRACT", "RFI_FILTER", "FFA_RUN"]
        );
    }

    #[tokio::test]
    async fn test_rerun_launches_nothing_for_finished_stages() {
        let fx = Fixture::new();
        fx.launcher.on_launch(output_producer(fx.hosts(), 10));
        fx.remote.on_run(combined_producer);
        let a = fx.observation("obs_a", &["s1"]);
        let list = fx.write_list(&[&a]);

        let first = fx.coordinator(list.clone(), false).run().await.unwrap();
        assert_eq!(first.failed_observations(), 0);
        let after_first = fx.launcher.labels().len();

        let second = fx.coordinator(list, false).run().await.unwrap();
        assert_eq!(second.failed_observations(), 0);
        let rerun: Vec<String> = fx.launcher.labels()[after_first..].to_vec();
        assert_eq!(rerun, vec!["FFA_RUN"]);
        assert_ne!(first.run_id, second.run_id);
        assert_eq!(fx.audit_lines(), 2);
    }

    #[tokio::test]
    async fn test_extract_failure_fails_observation_and_continues() {
        let fx = Fixture::new();
        fx.launcher.fail("EXTRACT", 1);
        let a = fx.observation("obs_a", &["s1"]);
        let b = fx.observation("obs_b", &["s1"]);
        let list = fx.write_list(&[&a, &b]);

        let summary = fx.coordinator(list, true).run().await.unwrap();

        assert_eq!(summary.failed_observations(), 2);
        assert_eq!(fx.launcher.labels(), vec!["EXTRACT", "EXTRACT"]);
        let out = fx.temp.path().join("out").join("obs_a");
        assert!(!out.join("BeamFils").join("s1").exists());

        let obs_log = fs::read_to_string(out.join("status").join("observation.log")).unwrap();
        assert!(obs_log.contains("|| s1 || FAILED at EXTRACT (exit 1)"));
        assert!(obs_log.contains("|| OBSERVATION || FAILED (1 of 1 scans failed)"));
    }

    #[tokio::test]
    async fn test_no_summaries_is_not_a_failure() {
        let fx = Fixture::new();
        let a = fx.observation("obs_a", &["s1"]);
        let list = fx.write_list(&[&a]);

        let summary = fx.coordinator(list, false).run().await.unwrap();

        assert_eq!(summary.failed_observations(), 0);
        assert!(fx.remote.calls().is_empty());
        let status = fs::read_to_string(
            fx.temp.path().join("out").join("obs_a").join("status").join("s1.status"),
        )
        .unwrap();
        assert!(status.contains("CANDIDATE_FILTER || SKIPPED (no input"));
        assert!(!status.contains("FAILED"));
    }

    #[tokio::test]
    async fn test_latest_scan_only_unless_several_observations() {
        let fx = Fixture::new();
        let a = fx.observation("obs_a", &["s1", "s2"]);
        let list = fx.write_list(&[&a]);
        let summary = fx.coordinator(list, false).run().await.unwrap();
        let scans: Vec<&str> = summary.observations[0]
            .scans
            .iter()
            .map(|s| s.scan.as_str())
            .collect();
        assert_eq!(scans, vec!["s2"]);

        let fx = Fixture::new();
        let a = fx.observation("obs_a", &["s1", "s2"]);
        let b = fx.observation("obs_b", &["s3"]);
        let list = fx.write_list(&[&a, &b]);
        let summary = fx.coordinator(list, false).run().await.unwrap();
        assert_eq!(summary.observations[0].scans.len(), 2);
        assert_eq!(summary.observations[1].scans.len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_raw_dir_fails_observation_only() {
        let fx = Fixture::new();
        let a = fx.temp.path().join("data").join("obs_empty");
        fs::create_dir_all(&a).unwrap();
        let b = fx.observation("obs_b", &["s1"]);
        let list = fx.write_list(&[&a, &b]);

        let summary = fx.coordinator(list, true).run().await.unwrap();
        assert!(summary.observations[0].failed());
        assert!(summary.observations[0].error.is_some());
        assert!(!summary.observations[1].failed());
    }
}
