// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg(unix)]

use super::*;
use crate::client::ApiClient;
use crate::executor::Executor;
use tempfile::TempDir;

fn worker_ctx() -> (WorkerContext, TempDir) {
    let dir = TempDir::new().unwrap();
    let client = ApiClient::new("http://127.0.0.1:1").unwrap();
    let ctx = WorkerContext {
        transport: Arc::new(Transport::new(client, "runner-1".to_string())),
        executor: Executor::new(Vec::new(), dir.path()),
        work_dir: dir.path().to_path_buf(),
        max_concurrent_tasks: 1,
    };
    (ctx, dir)
}

fn shell_descriptor(task_id: &str, command: &str) -> TaskDescriptor {
    TaskDescriptor {
        task_id: task_id.to_string(),
        job_id: "job-1".to_string(),
        kind: "shell".to_string(),
        command: command.to_string(),
        ..TaskDescriptor::default()
    }
}

#[tokio::test]
async fn worker_creates_numbered_task_dir() {
    let (ctx, dir) = worker_ctx();
    run_task(&ctx, shell_descriptor("t-1", "true"), 3, CancellationToken::new())
        .await
        .unwrap();

    assert!(dir.path().join("task_t-1_3").is_dir());
}

#[tokio::test]
async fn worker_survives_unreachable_mothership() {
    // Status reports fail (nothing listens), but execution still runs to
    // completion and the worker returns cleanly.
    let (ctx, dir) = worker_ctx();
    run_task(
        &ctx,
        shell_descriptor("t-2", "echo out > marker.txt"),
        0,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(dir.path().join("task_t-2_0").join("marker.txt").exists());
}

#[tokio::test]
async fn missing_required_file_short_circuits() {
    let (ctx, dir) = worker_ctx();
    let mut desc = shell_descriptor("t-3", "echo should-not-run > marker.txt");
    desc.required_files = vec!["file-x".to_string()];

    run_task(&ctx, desc, 0, CancellationToken::new()).await.unwrap();

    // Download failed, so the command never ran.
    assert!(!dir.path().join("task_t-3_0").join("marker.txt").exists());
}

#[test]
fn result_json_prefers_file_over_synthesis() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("result.json"), r#"{"answer": 42}"#).unwrap();

    let result = read_result_json(dir.path()).unwrap();
    assert_eq!(result["answer"], 42);
}

#[test]
fn malformed_result_json_is_ignored() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("result.json"), "{nope").unwrap();
    assert!(read_result_json(dir.path()).is_none());
}

#[test]
fn synthesized_result_shape() {
    let outcome = ExecOutcome {
        exit_code: Some(0),
        stdout: b"out".to_vec(),
        stderr: b"err".to_vec(),
        error: None,
    };
    let result = synthesized_result(&outcome);
    assert_eq!(result["stdout"], "out");
    assert_eq!(result["stderr"], "err");
    assert_eq!(result["exit_code"], 0);

    let no_code = ExecOutcome { exit_code: None, ..ExecOutcome::default() };
    assert_eq!(synthesized_result(&no_code)["exit_code"], -1);
}
