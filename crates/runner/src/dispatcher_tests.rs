// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::client::ApiClient;
use crate::executor::Executor;
use crate::transport::Transport;
use tempfile::TempDir;

fn worker_ctx(max_concurrent: i32) -> (Arc<WorkerContext>, TempDir) {
    let dir = TempDir::new().unwrap();
    // Unroutable mothership: status reports fail and are logged, which is
    // fine for dispatcher-level assertions.
    let client = ApiClient::new("http://127.0.0.1:1").unwrap();
    let ctx = Arc::new(WorkerContext {
        transport: Arc::new(Transport::new(client, "runner-1".to_string())),
        executor: Executor::new(Vec::new(), dir.path()),
        work_dir: dir.path().to_path_buf(),
        max_concurrent_tasks: max_concurrent,
    });
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

#[test]
fn cancel_registry_round_trip() {
    let registry = CancelRegistry::new();
    let root = CancellationToken::new();

    let token = registry.register("t-1", &root);
    assert_eq!(registry.in_flight(), 1);

    registry.cancel("t-1");
    assert!(token.is_cancelled());

    registry.complete("t-1");
    assert_eq!(registry.in_flight(), 0);
}

#[test]
fn cancel_unknown_task_is_noop() {
    let registry = CancelRegistry::new();
    registry.cancel("ghost");
    assert_eq!(registry.in_flight(), 0);
}

#[test]
fn shutdown_cancels_registered_tasks() {
    let registry = CancelRegistry::new();
    let root = CancellationToken::new();
    let token = registry.register("t-1", &root);

    root.cancel();
    assert!(token.is_cancelled());
}

#[test]
fn counters_track_start_and_finish() {
    let counters = TaskCounters::new();
    assert_eq!(counters.active(), 0);

    let first = counters.task_started();
    let second = counters.task_started();
    assert_eq!(first, 0);
    assert_eq!(second, 1);
    assert_eq!(counters.active(), 2);
    assert_eq!(counters.started(), 2);

    counters.task_finished();
    counters.task_finished();
    assert_eq!(counters.active(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn duplicate_descriptors_run_once() {
    let (ctx, _dir) = worker_ctx(2);
    let counters = Arc::new(TaskCounters::new());
    let cancels = Arc::new(CancelRegistry::new());
    let shutdown = CancellationToken::new();
    let (task_tx, task_rx) = mpsc::channel(8);

    let dispatcher = tokio::spawn(run(
        ctx,
        task_rx,
        Arc::clone(&counters),
        Arc::clone(&cancels),
        shutdown.clone(),
    ));

    // Retransmit of the same task id must be idempotent.
    task_tx.send(shell_descriptor("t-dup", "true")).await.unwrap();
    task_tx.send(shell_descriptor("t-dup", "true")).await.unwrap();
    drop(task_tx);

    dispatcher.await.unwrap();
    // Wait for the spawned worker to finish.
    for _ in 0..100 {
        if counters.active() == 0 && counters.started() == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    assert_eq!(counters.started(), 1);
    assert_eq!(counters.active(), 0);
}
