// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One task worker: stage files, execute, report, upload.

use borg_wire::{wire_exit_code, StatusUpdateRequest, TaskDescriptor};
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::executor::{ChunkStream, ExecOutcome, ExecRequest, Executor, OutputChunk};
use crate::transport::Transport;

/// Errors from the worker pipeline (execution and transport failures are
/// reported through the final status, not through this type).
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Dependencies shared by all task workers.
pub struct WorkerContext {
    pub transport: Arc<Transport>,
    pub executor: Executor,
    pub work_dir: PathBuf,
    pub max_concurrent_tasks: i32,
}

/// Run one task end to end.
pub async fn run_task(
    ctx: &WorkerContext,
    descriptor: TaskDescriptor,
    counter: u64,
    cancel: CancellationToken,
) -> Result<(), WorkerError> {
    let task_id = descriptor.task_id.clone();
    let task_dir = ctx.work_dir.join(format!("task_{}_{}", task_id, counter));
    tokio::fs::create_dir_all(&task_dir).await?;

    // Stage required files as file_<i> in descriptor order.
    let mut files: HashMap<String, PathBuf> = HashMap::new();
    for (i, file_id) in descriptor.required_files.iter().enumerate() {
        let dest = task_dir.join(format!("file_{i}"));
        if let Err(e) = ctx.transport.client().download_file(file_id, &dest).await {
            warn!(%task_id, %file_id, %e, "input download failed");
            report_final(
                ctx,
                &task_id,
                &ExecOutcome {
                    exit_code: None,
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                    error: Some(format!("failed to download file {file_id}: {e}")),
                },
            )
            .await;
            return Ok(());
        }
        files.insert(file_id.clone(), dest);
    }

    // Mark running before the process starts.
    let running = StatusUpdateRequest {
        status: "running".to_string(),
        timestamp: Utc::now().timestamp(),
        ..StatusUpdateRequest::default()
    };
    if let Err(e) = ctx.transport.send_status(&task_id, running).await {
        warn!(%task_id, %e, "cannot report running status");
    }

    // Forward live chunks as non-blocking status updates.
    let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
    let forwarder = spawn_chunk_forwarder(Arc::clone(&ctx.transport), task_id.clone(), chunk_rx);

    let outcome = ctx
        .executor
        .execute(
            ExecRequest { descriptor: &descriptor, task_dir: &task_dir, files: &files },
            chunk_tx,
            cancel,
        )
        .await;
    let _ = forwarder.await;

    // executor_binary jobs report a result document.
    if descriptor.kind == "executor_binary" {
        let result = read_result_json(&task_dir).unwrap_or_else(|| synthesized_result(&outcome));
        if let Err(e) = ctx.transport.client().upload_result(&task_id, &result).await {
            warn!(%task_id, %e, "result upload failed");
        }
    }

    upload_artifacts(ctx, &task_id, &task_dir).await;
    report_final(ctx, &task_id, &outcome).await;

    info!(%task_id, exit_code = ?outcome.exit_code, "task worker finished");
    Ok(())
}

fn spawn_chunk_forwarder(
    transport: Arc<Transport>,
    task_id: String,
    mut chunk_rx: mpsc::UnboundedReceiver<OutputChunk>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(chunk) = chunk_rx.recv().await {
            let mut update = StatusUpdateRequest {
                timestamp: Utc::now().timestamp(),
                ..StatusUpdateRequest::default()
            };
            match chunk.stream {
                ChunkStream::Stdout => update.stdout = chunk.data,
                ChunkStream::Stderr => update.stderr = chunk.data,
            }
            if let Err(e) = transport.send_status(&task_id, update).await {
                debug!(%task_id, %e, "chunk update dropped");
            }
        }
    })
}

/// `result.json` produced by the executor binary, if present.
fn read_result_json(task_dir: &Path) -> Option<serde_json::Value> {
    let text = std::fs::read_to_string(task_dir.join("result.json")).ok()?;
    serde_json::from_str(&text).ok()
}

fn synthesized_result(outcome: &ExecOutcome) -> serde_json::Value {
    serde_json::json!({
        "stdout": String::from_utf8_lossy(&outcome.stdout),
        "stderr": String::from_utf8_lossy(&outcome.stderr),
        "exit_code": wire_exit_code(outcome.exit_code),
    })
}

/// Walk `task_dir/artifacts/` and upload every file found.
async fn upload_artifacts(ctx: &WorkerContext, task_id: &str, task_dir: &Path) {
    let artifacts_dir = task_dir.join("artifacts");
    if !artifacts_dir.is_dir() {
        return;
    }

    let pattern = format!("{}/**/*", artifacts_dir.to_string_lossy());
    let paths: Vec<PathBuf> = match glob::glob(&pattern) {
        Ok(entries) => entries.filter_map(|e| e.ok()).filter(|p| p.is_file()).collect(),
        Err(e) => {
            warn!(%task_id, %e, "artifact walk failed");
            return;
        }
    };

    for path in paths {
        match ctx.transport.client().upload_artifact(task_id, &path).await {
            Ok(()) => info!(%task_id, path = %path.display(), "artifact uploaded"),
            Err(e) => warn!(%task_id, path = %path.display(), %e, "artifact upload failed"),
        }
    }
}

async fn report_final(ctx: &WorkerContext, task_id: &str, outcome: &ExecOutcome) {
    let status = if outcome.succeeded() { "completed" } else { "failed" };
    let update = StatusUpdateRequest {
        status: status.to_string(),
        exit_code: Some(wire_exit_code(outcome.exit_code)),
        error_message: outcome.error.clone().unwrap_or_default(),
        stdout: outcome.stdout.clone(),
        stderr: outcome.stderr.clone(),
        timestamp: Utc::now().timestamp(),
        ..StatusUpdateRequest::default()
    };
    if let Err(e) = ctx.transport.send_status(task_id, update).await {
        warn!(%task_id, %e, "final status report failed");
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
