// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-runtime task executor.
//!
//! Dispatches by job kind (shell, binary, docker, executor_binary, or a
//! configured runtime), spawns via `tokio::process::Command`, tees
//! stdout/stderr into in-memory buffers while firing non-blocking chunk
//! updates, and binds a cancellable deadline when the job carries one.

mod runtime;

pub use runtime::RuntimeCache;

use borg_core::{JobKind, RuntimeSpec};
use borg_wire::TaskDescriptor;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Which stream a live chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStream {
    Stdout,
    Stderr,
}

/// One live output chunk, fired as the process writes.
#[derive(Debug, Clone)]
pub struct OutputChunk {
    pub stream: ChunkStream,
    pub data: Vec<u8>,
}

/// Final outcome of one task execution.
#[derive(Debug, Default)]
pub struct ExecOutcome {
    /// `None` means "no exit code available": launch failure, deadline
    /// fire, or cancellation.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub error: Option<String>,
}

impl ExecOutcome {
    fn failed(error: impl Into<String>) -> Self {
        Self { error: Some(error.into()), ..Self::default() }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0) && self.error.is_none()
    }
}

/// Errors preparing a command (the execution itself reports through
/// [`ExecOutcome`]).
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("docker not found in PATH")]
    DockerMissing,
    #[error("docker jobs require an image")]
    DockerImageMissing,
    #[error("executor binary not found in task directory")]
    ExecutorBinaryMissing,
    #[error("no runtime named {0:?} is configured")]
    UnknownRuntime(String),
    #[error("runtime fetch failed: {0}")]
    RuntimeFetch(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything the executor needs for one task.
pub struct ExecRequest<'a> {
    pub descriptor: &'a TaskDescriptor,
    pub task_dir: &'a Path,
    /// file_id → downloaded local path, in download order.
    pub files: &'a HashMap<String, PathBuf>,
}

/// Task executor with the runner's configured runtimes and their cache.
pub struct Executor {
    runtimes: Vec<RuntimeSpec>,
    cache: RuntimeCache,
}

impl Executor {
    pub fn new(runtimes: Vec<RuntimeSpec>, work_dir: &Path) -> Self {
        Self { runtimes, cache: RuntimeCache::new(work_dir) }
    }

    /// Run one task to completion (or deadline/cancel).
    pub async fn execute(
        &self,
        req: ExecRequest<'_>,
        chunk_tx: mpsc::UnboundedSender<OutputChunk>,
        cancel: CancellationToken,
    ) -> ExecOutcome {
        let command = match self.build_command(&req).await {
            Ok(cmd) => cmd,
            Err(e) => return ExecOutcome::failed(e.to_string()),
        };
        run_with_deadline(command, req.descriptor.timeout_seconds, chunk_tx, cancel).await
    }

    async fn build_command(&self, req: &ExecRequest<'_>) -> Result<tokio::process::Command, ExecError> {
        let desc = req.descriptor;
        let kind = JobKind::parse(&desc.kind);
        let cwd = working_dir(req.task_dir, &desc.working_directory);
        if !desc.working_directory.is_empty() {
            std::fs::create_dir_all(&cwd)?;
        }

        let mut command = match &kind {
            JobKind::Shell => shell_command(&desc.command),
            JobKind::Binary => binary_command(req)?,
            JobKind::Docker => docker_command(req)?,
            JobKind::ExecutorBinary => executor_binary_command(req)?,
            JobKind::Runtime(name) => {
                let spec = self
                    .runtimes
                    .iter()
                    .find(|r| &r.name == name)
                    .ok_or_else(|| ExecError::UnknownRuntime(name.clone()))?;
                let executable = self.cache.resolve(spec).await?;
                let mut cmd = tokio::process::Command::new(executable);
                cmd.arg(&desc.command);
                cmd.args(&desc.args);
                cmd
            }
        };

        // Docker runs in its own filesystem namespace; everything else
        // executes inside the task directory.
        if kind != JobKind::Docker {
            command.current_dir(&cwd);
        }
        // Inherit the host environment, overlay the job's.
        for (k, v) in &desc.env {
            command.env(k, v);
        }
        if kind == JobKind::ExecutorBinary {
            if let Some(data) = &desc.task_data {
                command.env("TASK_DATA_JSON", data.to_string());
            }
        }
        Ok(command)
    }
}

/// `task_dir/working_directory` when set, else the task dir itself.
fn working_dir(task_dir: &Path, suffix: &str) -> PathBuf {
    if suffix.is_empty() {
        task_dir.to_path_buf()
    } else {
        task_dir.join(suffix)
    }
}

/// System shell invocation: POSIX `sh -c` (PowerShell on Windows).
fn shell_command(command_line: &str) -> tokio::process::Command {
    #[cfg(not(windows))]
    {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(command_line);
        cmd
    }
    #[cfg(windows)]
    {
        let mut cmd = tokio::process::Command::new("powershell");
        cmd.arg("-Command").arg(command_line);
        cmd
    }
}

/// Binary jobs resolve `command` as a path inside the task directory.
fn binary_command(req: &ExecRequest<'_>) -> Result<tokio::process::Command, ExecError> {
    let desc = req.descriptor;
    let path = req.task_dir.join(&desc.command);
    make_executable(&path)?;
    let mut cmd = tokio::process::Command::new(path);
    cmd.args(&desc.args);
    Ok(cmd)
}

/// `docker run --rm -v TASKDIR:/work -w /work [...] IMAGE CMD ARGS`.
fn docker_command(req: &ExecRequest<'_>) -> Result<tokio::process::Command, ExecError> {
    let desc = req.descriptor;
    if desc.docker_image.is_empty() {
        return Err(ExecError::DockerImageMissing);
    }
    if !binary_in_path("docker") {
        return Err(ExecError::DockerMissing);
    }

    let mut cmd = tokio::process::Command::new("docker");
    cmd.arg("run").arg("--rm");
    cmd.arg("-v")
        .arg(format!("{}:/work", req.task_dir.to_string_lossy()));
    if desc.working_directory.is_empty() {
        cmd.arg("-w").arg("/work");
    } else {
        cmd.arg("-w").arg(format!("/work/{}", desc.working_directory));
    }
    for (k, v) in &desc.env {
        cmd.arg("-e").arg(format!("{k}={v}"));
    }
    if desc.privileged {
        cmd.arg("--privileged");
    }
    cmd.arg(&desc.docker_image);
    if !desc.command.is_empty() {
        cmd.arg(&desc.command);
    }
    cmd.args(&desc.args);
    Ok(cmd)
}

/// Locate the uploaded executor binary, write `task_data.json`, invoke.
fn executor_binary_command(req: &ExecRequest<'_>) -> Result<tokio::process::Command, ExecError> {
    let desc = req.descriptor;
    let binary = desc
        .executor_binary_id
        .as_ref()
        .and_then(|id| req.files.get(id.as_str()))
        .cloned()
        .ok_or(ExecError::ExecutorBinaryMissing)?;
    make_executable(&binary)?;

    if let Some(data) = &desc.task_data {
        let path = req.task_dir.join("task_data.json");
        std::fs::write(&path, data.to_string())?;
    }

    let mut cmd = tokio::process::Command::new(binary);
    cmd.args(&desc.args);
    Ok(cmd)
}

pub(crate) fn make_executable(path: &Path) -> Result<(), ExecError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = std::fs::metadata(path)?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(permissions.mode() | 0o755);
        std::fs::set_permissions(path, permissions)?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

pub(crate) fn binary_in_path(name: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| dir.join(name).is_file())
}

/// Spawn, tee output, and wait under an optional deadline.
async fn run_with_deadline(
    mut command: tokio::process::Command,
    timeout_seconds: i64,
    chunk_tx: mpsc::UnboundedSender<OutputChunk>,
    cancel: CancellationToken,
) -> ExecOutcome {
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    command.stdin(Stdio::null());
    command.kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => return ExecOutcome::failed(format!("spawn failed: {e}")),
    };

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_task = tee_stream(stdout, ChunkStream::Stdout, chunk_tx.clone());
    let stderr_task = tee_stream(stderr, ChunkStream::Stderr, chunk_tx);

    let deadline = async {
        if timeout_seconds > 0 {
            tokio::time::sleep(std::time::Duration::from_secs(timeout_seconds as u64)).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    let (exit_code, error) = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => (status.code(), None),
            Err(e) => (None, Some(format!("wait failed: {e}"))),
        },
        _ = deadline => {
            warn!(timeout_seconds, "task deadline fired, killing process");
            let _ = child.start_kill();
            let _ = child.wait().await;
            (None, Some(format!("timed out after {timeout_seconds}s")))
        }
        _ = cancel.cancelled() => {
            debug!("task cancelled, killing process");
            let _ = child.start_kill();
            let _ = child.wait().await;
            (None, Some("cancelled".to_string()))
        }
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    ExecOutcome { exit_code, stdout, stderr, error }
}

/// Read a child stream to EOF, buffering it and firing chunk updates.
fn tee_stream(
    stream: Option<impl tokio::io::AsyncRead + Unpin + Send + 'static>,
    which: ChunkStream,
    chunk_tx: mpsc::UnboundedSender<OutputChunk>,
) -> tokio::task::JoinHandle<Vec<u8>> {
    tokio::spawn(async move {
        let mut buffer = Vec::new();
        let Some(mut stream) = stream else {
            return buffer;
        };
        let mut chunk = vec![0u8; 8 * 1024];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    buffer.extend_from_slice(&chunk[..n]);
                    // Never blocks the reader; listeners that fell behind
                    // still get the full buffer in the final status.
                    let _ = chunk_tx.send(OutputChunk {
                        stream: which,
                        data: chunk[..n].to_vec(),
                    });
                }
            }
        }
        buffer
    })
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
