//! Remote command channel.
//!
//! Runs a newline-delimited batch of shell commands on one host and reports
//! the exit status of the *last* command. Remote-exec transports only report
//! a status for the whole session, so every batch ends with a trailer that
//! saves `$?`, breaks the line and echoes a marker; the marker is parsed back
//! out of stdout and removed.
//!
//! ```text
//! commands ──→ "<cmd 1>\n<cmd 2>\n<trailer>" ──→ ssh host bash -s
//!                                             │
//! ExecCapture { exit_code, stdout, stderr } ←── parse last marker ──┘
//! ```
//!
//! A transport failure (ssh exits 255 without printing the marker) is
//! returned as [`FfaError::Connection`], which aborts the run.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::errors::{CONNECTION_FAILURE_EXIT, FfaError, FfaResult};
use crate::runtime::{RemoteKind, SshSettings};
use crate::runtime::constants::EXIT_MARKER;
use crate::util::process::{ChildError, exit_code, run_child};

/// Result of a command batch that reached its host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecCapture {
    /// Exit status of the last command in the batch.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecCapture {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes command batches on a named host.
///
/// Calls block the caller until the batch finishes. Implementations must
/// return [`FfaError::Connection`] when the host cannot be reached and
/// [`FfaError::Cancelled`] when the run is cancelled.
#[async_trait]
pub trait RemoteExec: Send + Sync {
    async fn run(&self, host: &str, commands: &[String]) -> FfaResult<ExecCapture>;
}

/// Remote execution over `ssh <options> <host> bash -s`.
#[derive(Debug, Clone)]
pub struct SshChannel {
    settings: SshSettings,
    cancel: CancellationToken,
}

impl SshChannel {
    pub fn new(settings: SshSettings, cancel: CancellationToken) -> Self {
        Self { settings, cancel }
    }
}

#[async_trait]
impl RemoteExec for SshChannel {
    async fn run(&self, host: &str, commands: &[String]) -> FfaResult<ExecCapture> {
        let script = build_script(commands);
        let mut cmd = Command::new(&self.settings.program);
        cmd.args(&self.settings.options).arg(host).arg("bash").arg("-s");

        tracing::debug!(host, lines = commands.len(), "Dispatching remote batch");

        let output = run_child(cmd, Some(&script), &self.cancel)
            .await
            .map_err(|e| child_error(host, &self.settings.program, e))?;

        interpret_output(host, &output, true)
    }
}

/// The same channel for the local machine, via `sh -s`.
#[derive(Debug, Clone)]
pub struct LocalShell {
    cancel: CancellationToken,
}

impl LocalShell {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }
}

#[async_trait]
impl RemoteExec for LocalShell {
    async fn run(&self, host: &str, commands: &[String]) -> FfaResult<ExecCapture> {
        let script = build_script(commands);
        let mut cmd = Command::new("sh");
        cmd.arg("-s");

        let output = run_child(cmd, Some(&script), &self.cancel)
            .await
            .map_err(|e| child_error(host, "sh", e))?;

        interpret_output(host, &output, false)
    }
}

/// Build the channel selected by the pipeline configuration.
pub fn channel_for(
    kind: RemoteKind,
    ssh: &SshSettings,
    cancel: CancellationToken,
) -> Arc<dyn RemoteExec> {
    match kind {
        RemoteKind::Ssh => Arc::new(SshChannel::new(ssh.clone(), cancel)),
        RemoteKind::Local => {
            tracing::info!("Remote batches run on the local machine");
            Arc::new(LocalShell::new(cancel))
        }
    }
}

fn child_error(host: &str, program: &str, err: ChildError) -> FfaError {
    match err {
        ChildError::Spawn(e) => {
            FfaError::Config(format!("cannot start remote transport '{}': {}", program, e))
        }
        ChildError::Wait(e) => FfaError::Connection {
            host: host.to_string(),
            detail: format!("transport I/O failed: {}", e),
        },
        ChildError::Cancelled => FfaError::Cancelled,
    }
}

/// Shell variable holding the last command's status while the trailer runs.
const STATUS_VAR: &str = "__ffaflow_rc";

/// Append the exit-status trailer to a command batch.
///
/// The bare `echo` puts the marker on its own line even when the last
/// command left the cursor mid-line.
pub fn build_script(commands: &[String]) -> String {
    let mut script = String::new();
    for line in commands {
        script.push_str(line);
        script.push('\n');
    }
    script.push_str(&format!(
        "{var}=$?\necho\necho \"{marker}${var}\"\n",
        var = STATUS_VAR,
        marker = EXIT_MARKER
    ));
    script
}

/// Split captured stdout into the marker exit code (if the last non-empty
/// line carries one) and the remaining output.
///
/// With a marker, the line break forced by the trailer is removed as well, so
/// the returned stdout is exactly what the commands printed. CRLF line ends
/// added by the transport are normalised.
pub fn parse_marked_output(raw: &str) -> (Option<i32>, String) {
    let text = raw.replace("\r\n", "\n");
    let body = text.trim_end();
    let (before, last) = match body.rfind('\n') {
        Some(idx) => (&body[..=idx], &body[idx + 1..]),
        None => ("", body),
    };

    let code = last
        .trim()
        .strip_prefix(EXIT_MARKER)
        .and_then(|rest| rest.trim().parse::<i32>().ok());

    match code {
        Some(_) => {
            let stdout = before.strip_suffix('\n').unwrap_or(before);
            (code, stdout.to_string())
        }
        None => (None, text),
    }
}

fn interpret_output(
    host: &str,
    output: &std::process::Output,
    detect_transport_failure: bool,
) -> FfaResult<ExecCapture> {
    let raw_stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr).replace('\r', "");
    let session_code = exit_code(output.status);
    let (marker, stdout) = parse_marked_output(&raw_stdout);

    let exit_code = match marker {
        Some(code) => code,
        None if detect_transport_failure && session_code == CONNECTION_FAILURE_EXIT => {
            let detail = stderr.trim();
            tracing::error!(host, detail, "Remote transport failed");
            return Err(FfaError::Connection {
                host: host.to_string(),
                detail: if detail.is_empty() {
                    format!("transport exited with status {}", session_code)
                } else {
                    detail.to_string()
                },
            });
        }
        None => session_code,
    };

    tracing::debug!(host, exit_code, "Remote batch finished");

    Ok(ExecCapture {
        exit_code,
        stdout,
        stderr,
    })
}
