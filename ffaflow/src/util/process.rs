//! Child process utilities: spawning with cancellation, process-group
//! termination and exit status decoding.
//!
//! Two ways to run a child:
//! - [`run_child`] captures stdout and stderr, for short command batches
//! - [`run_logged`] forwards output line by line into `tracing`, for
//!   long-running jobs whose console output must not accumulate in memory

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Output, Stdio};

use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Why a child process did not produce an [`Output`].
#[derive(Debug)]
pub(crate) enum ChildError {
    /// The program could not be started at all.
    Spawn(io::Error),
    /// Feeding stdin or collecting output failed.
    Wait(io::Error),
    /// The cancellation token fired; the process group was terminated.
    Cancelled,
}

/// Run `cmd` to completion in its own process group, capturing stdout and
/// stderr.
///
/// When `stdin` is given it is written to the child and the pipe is closed.
/// If `cancel` fires first, the whole process group receives SIGTERM and the
/// leader is killed on drop.
pub(crate) async fn run_child(
    mut cmd: Command,
    stdin: Option<&str>,
    cancel: &CancellationToken,
) -> Result<Output, ChildError> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true)
    .process_group(0);

    let mut child = cmd.spawn().map_err(ChildError::Spawn)?;
    let pid = child.id();

    if let Some(input) = stdin {
        let mut pipe = child
            .stdin
            .take()
            .ok_or_else(|| ChildError::Wait(io::Error::other("child stdin was not captured")))?;
        // A child that exits before reading (e.g. ssh failing to connect)
        // closes its end early; its exit status tells the real story.
        if let Err(e) = pipe.write_all(input.as_bytes()).await
            && e.kind() != io::ErrorKind::BrokenPipe
        {
            return Err(ChildError::Wait(e));
        }
        drop(pipe);
    }

    tokio::select! {
        output = child.wait_with_output() => output.map_err(ChildError::Wait),
        _ = cancel.cancelled() => {
            if let Some(pid) = pid {
                terminate_process_group(pid);
            }
            Err(ChildError::Cancelled)
        }
    }
}

/// Run `cmd` to completion in its own process group, forwarding each line of
/// stdout and stderr to the log under `label`. Nothing is buffered beyond the
/// current line.
pub(crate) async fn run_logged(
    mut cmd: Command,
    label: &str,
    cancel: &CancellationToken,
) -> Result<ExitStatus, ChildError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .process_group(0);

    let mut child = cmd.spawn().map_err(ChildError::Spawn)?;
    let pid = child.id();

    let forwarders: Vec<JoinHandle<()>> = [
        child
            .stdout
            .take()
            .map(|out| forward_lines(out, label.to_string(), "stdout")),
        child
            .stderr
            .take()
            .map(|err| forward_lines(err, label.to_string(), "stderr")),
    ]
    .into_iter()
    .flatten()
    .collect();

    let status = tokio::select! {
        status = child.wait() => status.map_err(ChildError::Wait)?,
        _ = cancel.cancelled() => {
            if let Some(pid) = pid {
                terminate_process_group(pid);
            }
            return Err(ChildError::Cancelled);
        }
    };

    for handle in forwarders {
        let _ = handle.await;
    }
    Ok(status)
}

fn forward_lines<R>(reader: R, label: String, stream: &'static str) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::info!(stage = %label, stream, "{}", line.trim_end_matches('\r'));
        }
    })
}

/// Decode an exit status into a shell-style exit code (128 + signal for
/// signalled processes).
pub fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

/// Send SIGTERM to the process group led by `pid`.
///
/// # Returns
/// * `true` - Signal delivered or the group no longer exists
/// * `false` - Failed to signal (permission denied)
pub fn terminate_process_group(pid: u32) -> bool {
    let pgrp = Pid::from_raw(pid as i32);
    match killpg(pgrp, Signal::SIGTERM) {
        Ok(()) => true,
        Err(nix::errno::Errno::ESRCH) => true,
        Err(e) => {
            tracing::warn!(pid, error = %e, "Failed to terminate process group");
            false
        }
    }
}
