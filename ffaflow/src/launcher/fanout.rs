//! Launcher that starts each rank over the remote command channel.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use super::{DistributedLauncher, LaunchSpec};
use crate::errors::FfaResult;
use crate::remote::RemoteExec;
use crate::runtime::constants::env;
use crate::topology::{RankMapping, RankSlot};
use crate::util::shell;

/// One remote command per rank, all in flight at once.
///
/// Every rank gets `FFAFLOW_RANK`, `FFAFLOW_NRANKS` and `FFAFLOW_HOST` so
/// the worker can pick its share of the work. Ranks are not killed when a
/// sibling fails; the aggregate is decided once all have returned.
pub struct RankFanoutLauncher {
    remote: Arc<dyn RemoteExec>,
}

impl RankFanoutLauncher {
    pub fn new(remote: Arc<dyn RemoteExec>) -> Self {
        Self { remote }
    }

    /// Shell command line for one rank.
    pub fn rank_command(slot: &RankSlot, nranks: usize, spec: &LaunchSpec) -> String {
        let mut words = vec![
            format!("{}={}", env::RANK, slot.rank),
            format!("{}={}", env::NRANKS, nranks),
            format!("{}={}", env::HOST, shell::quote(&slot.host)),
        ];
        for (key, value) in &spec.env {
            words.push(format!("{}={}", key, shell::quote(value)));
        }
        words.push(shell::quote(&spec.program));
        words.extend(spec.args.iter().map(|a| shell::quote(a)));
        let command = words.join(" ");

        match &spec.workdir {
            Some(dir) => format!(
                "cd {} && {}",
                shell::quote(&dir.display().to_string()),
                command
            ),
            None => command,
        }
    }
}

#[async_trait]
impl DistributedLauncher for RankFanoutLauncher {
    async fn launch(&self, mapping: &RankMapping, spec: &LaunchSpec) -> FfaResult<i32> {
        let nranks = mapping.rank_count();
        tracing::info!(
            stage = %spec.label,
            ranks = nranks,
            program = %spec.program,
            "Launching ranks over remote channel"
        );

        let runs = mapping.slots().iter().map(|slot| {
            let command = vec![Self::rank_command(slot, nranks, spec)];
            let remote = Arc::clone(&self.remote);
            async move { remote.run(&slot.host, &command).await }
        });
        let results = join_all(runs).await;

        let mut aggregate = 0;
        for (slot, result) in mapping.slots().iter().zip(results) {
            let capture = result?;
            tracing::debug!(
                stage = %spec.label,
                rank = slot.rank,
                host = %slot.host,
                exit_code = capture.exit_code,
                "Rank finished"
            );
            if capture.exit_code != 0 && aggregate == 0 {
                aggregate = capture.exit_code;
            }
        }

        if aggregate != 0 {
            tracing::warn!(stage = %spec.label, exit_code = aggregate, "Distributed job failed");
        }
        Ok(aggregate)
    }
}
