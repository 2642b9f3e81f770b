// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subprocess runner.
//
// stderr (and stdout, when the caller wants it) is drained by its own task
// while the caller awaits exit, so a tool that writes more than a pipe
// buffer cannot stall. Children
// are spawned with `kill_on_drop`, so dropping the future (caller
// disconnect) or hitting the deadline terminates the process.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::process::{ExitStatus, Stdio};

use blattwerk_core::config::ToolConfig;
use blattwerk_core::error::{BlattwerkError, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// How a tool run ended.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub status: ExitStatus,
    /// Everything the tool wrote to stderr (lossily decoded).
    pub stderr: String,
    /// Raw stdout; empty unless captured with [`run_tool_capturing`].
    pub stdout: Vec<u8>,
}

impl ToolOutcome {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, or `None` when the process was killed by a signal.
    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Run `tool` with `args` to completion.
///
/// A spawn failure is [`BlattwerkError::ToolUnavailable`]; exceeding
/// `tool.timeout_secs` kills the child and is [`BlattwerkError::Timeout`].
/// A non-zero exit is not an error here; callers decide what it means.
#[instrument(skip_all, fields(tool = %tool.display_name(), args = args.len()))]
pub async fn run_tool<S: AsRef<OsStr>>(tool: &ToolConfig, args: &[S]) -> Result<ToolOutcome> {
    run(tool, args, false).await
}

/// [`run_tool`], keeping what the tool writes to stdout.
#[instrument(skip_all, fields(tool = %tool.display_name(), args = args.len()))]
pub async fn run_tool_capturing<S: AsRef<OsStr>>(tool: &ToolConfig, args: &[S]) -> Result<ToolOutcome> {
    run(tool, args, true).await
}

async fn run<S: AsRef<OsStr>>(tool: &ToolConfig, args: &[S], capture_stdout: bool) -> Result<ToolOutcome> {
    let name = tool.display_name();
    info!(program = %tool.program.display(), "Running external tool");

    let mut child = Command::new(&tool.program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(if capture_stdout { Stdio::piped() } else { Stdio::null() })
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| BlattwerkError::ToolUnavailable {
            tool: name.clone(),
            reason: match err.kind() {
                ErrorKind::NotFound => format!("{} not found", tool.program.display()),
                ErrorKind::PermissionDenied => format!("{} is not executable", tool.program.display()),
                _ => err.to_string(),
            },
        })?;

    let drain = match child.stderr.take() {
        Some(stderr) => tokio::spawn(drain(stderr, name.clone())),
        None => tokio::spawn(async { String::new() }),
    };
    let output = child.stdout.take().map(|stdout| tokio::spawn(read_all(stdout, name.clone())));

    let status = match tool.timeout() {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!(tool = %name, after = ?limit, "Tool timed out, killing it");
                if let Err(err) = child.kill().await {
                    warn!(tool = %name, error = %err, "Failed to kill timed-out tool");
                }
                drain.abort();
                if let Some(output) = &output {
                    output.abort();
                }
                return Err(BlattwerkError::Timeout { tool: name, after: limit });
            }
        },
        None => child.wait().await?,
    };

    let stderr = collect(drain).await;
    let stdout = match output {
        Some(output) => output.await.unwrap_or_else(|err| {
            warn!(error = %err, "stdout reader task failed");
            Vec::new()
        }),
        None => Vec::new(),
    };
    debug!(%status, stderr_bytes = stderr.len(), stdout_bytes = stdout.len(), "Tool exited");
    Ok(ToolOutcome { status, stderr, stdout })
}

async fn read_all<R: AsyncRead + Unpin>(mut stream: R, tool: String) -> Vec<u8> {
    let mut captured = Vec::new();
    if let Err(err) = stream.read_to_end(&mut captured).await {
        warn!(tool = %tool, error = %err, "Failed reading tool stdout");
    }
    captured
}

/// Read a stream to its end, logging each line as it arrives.
async fn drain<R: AsyncRead + Unpin>(mut stream: R, tool: String) -> String {
    let mut captured = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut logged = 0;
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(read) => {
                captured.extend_from_slice(&chunk[..read]);
                while let Some(end) = captured[logged..].iter().position(|&b| b == b'\n') {
                    let line = String::from_utf8_lossy(&captured[logged..logged + end]);
                    debug!(tool = %tool, "stderr: {}", line.trim_end());
                    logged += end + 1;
                }
            }
            Err(err) => {
                warn!(tool = %tool, error = %err, "Failed reading tool stderr");
                break;
            }
        }
    }
    String::from_utf8_lossy(&captured).into_owned()
}

async fn collect(drain: JoinHandle<String>) -> String {
    match drain.await {
        Ok(stderr) => stderr,
        Err(err) => {
            warn!(error = %err, "stderr reader task failed");
            String::new()
        }
    }
}
