// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue lifecycle specs: enqueue → dispatch → complete, retries, cancel.

use crate::prelude::*;
use borg_wire::{normalize_exit_code, StatusUpdateRequest};

/// Apply a wire status update the way the status endpoint does.
fn apply_wire_status(store: &Store<FakeClock>, task_id: &borg_core::TaskId, json: &str) {
    let req: StatusUpdateRequest = serde_json::from_str(json).unwrap();
    let status = serde_json::from_value(serde_json::Value::String(req.status.clone())).unwrap();
    store
        .update_status(
            task_id,
            UpdateStatusParams {
                status: Some(status),
                exit_code: normalize_exit_code(req.exit_code),
                error_message: req.error_message,
                stdout: req.stdout,
                stderr: req.stderr,
                timestamp: None,
            },
        )
        .unwrap();
}

#[test]
fn enqueue_dispatch_complete_round_trip() {
    let (store, _, _dir) = open_store();
    let runner = register_wire_runner(&store, &"a".repeat(64), "r1");

    // POST /jobs {"name":"echo","type":"shell","command":"echo hi"}
    let job = store
        .enqueue(new_job_from_wire(
            r#"{"name":"echo","type":"shell","command":"echo hi","max_retries":0}"#,
        ))
        .unwrap();

    // GET /runners/:id/tasks/next → descriptor
    let assignment = store.next_task(&runner.id).unwrap().unwrap();
    assert_eq!(assignment.job.id, job.id);
    assert_eq!(assignment.job.kind.as_str(), "shell");
    assert!(assignment.job.args.is_empty());
    assert!(assignment.job.env.is_empty());

    // POST /tasks/:id/status — stdout is base64 on the wire ("hi\n").
    apply_wire_status(
        &store,
        &assignment.task.id,
        r#"{"status":"completed","exit_code":0,"stdout":"aGkK"}"#,
    );

    assert_eq!(store.get_job(&job.id).unwrap().status, JobStatus::Completed);
    let logs = store.task_logs(&assignment.task.id).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].level, borg_core::LogLevel::Stdout);
    assert_eq!(logs[0].message, "hi\n");
}

#[test]
fn retry_ladder_exhausts_into_failed_job() {
    let (store, _, _dir) = open_store();
    let runner = register_wire_runner(&store, &"b".repeat(64), "r1");

    let job = store
        .enqueue(new_job_from_wire(
            r#"{"name":"flaky","type":"shell","command":"exit 1","max_retries":2}"#,
        ))
        .unwrap();

    for expected_retry in 0..3 {
        let assignment = store.next_task(&runner.id).unwrap().unwrap();
        assert_eq!(assignment.task.retry_count, expected_retry);
        apply_wire_status(
            &store,
            &assignment.task.id,
            r#"{"status":"failed","exit_code":1}"#,
        );
    }

    // Three attempts (retry 0..=2), then the job fails; no fourth task.
    assert_eq!(store.get_job(&job.id).unwrap().status, JobStatus::Failed);
    assert_eq!(store.job_tasks(&job.id).len(), 3);
    assert!(store.next_task(&runner.id).unwrap().is_none());
}

#[test]
fn job_stays_running_between_retries() {
    let (store, _, _dir) = open_store();
    let runner = register_wire_runner(&store, &"c".repeat(64), "r1");
    let job = store
        .enqueue(new_job_from_wire(
            r#"{"name":"flaky","type":"shell","command":"exit 1","max_retries":2}"#,
        ))
        .unwrap();

    let t1 = store.next_task(&runner.id).unwrap().unwrap();
    apply_wire_status(&store, &t1.task.id, r#"{"status":"failed","exit_code":1}"#);

    assert_eq!(store.get_job(&job.id).unwrap().status, JobStatus::Running);
    let pending: Vec<_> = store
        .job_tasks(&job.id)
        .into_iter()
        .filter(|t| t.status == TaskStatus::Pending)
        .collect();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].retry_count, 1);
}

#[test]
fn cancel_propagates_to_running_task() {
    let (store, _, _dir) = open_store();
    let runner = register_wire_runner(&store, &"d".repeat(64), "r1");
    let job = store
        .enqueue(new_job_from_wire(r#"{"name":"long","command":"sleep 600"}"#))
        .unwrap();
    let t1 = store.next_task(&runner.id).unwrap().unwrap();

    store.cancel_job(&job.id).unwrap();

    assert_eq!(store.get_job(&job.id).unwrap().status, JobStatus::Cancelled);
    let task = store.get_task(&t1.task.id).unwrap();
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert!(task.completed_at.is_some());
}

#[test]
fn minus_one_exit_code_stored_as_null() {
    let (store, _, _dir) = open_store();
    let runner = register_wire_runner(&store, &"e".repeat(64), "r1");
    store
        .enqueue(new_job_from_wire(r#"{"name":"crash","command":"boom"}"#))
        .unwrap();
    let t1 = store.next_task(&runner.id).unwrap().unwrap();

    apply_wire_status(
        &store,
        &t1.task.id,
        r#"{"status":"failed","exit_code":-1,"error_message":"launch failed"}"#,
    );

    let task = store.get_task(&t1.task.id).unwrap();
    assert_eq!(task.exit_code, None);
    assert_eq!(task.error_message, "launch failed");
}

#[test]
fn args_and_env_normalize_at_the_boundary() {
    let (store, _, _dir) = open_store();

    // args given as a bare scalar, env as a non-object: both normalize.
    let job = store
        .enqueue(new_job_from_wire(
            r#"{"name":"n","command":"c","args":42,"env":"oops"}"#,
        ))
        .unwrap();
    assert_eq!(job.args, vec!["42"]);
    assert!(job.env.is_empty());
}

#[test]
fn stats_snapshot_counts_all_buckets() {
    let (store, _, _dir) = open_store();
    let runner = register_wire_runner(&store, &"f".repeat(64), "r1");
    store
        .enqueue(new_job_from_wire(r#"{"name":"a","command":"x"}"#))
        .unwrap();
    store
        .enqueue(new_job_from_wire(r#"{"name":"b","command":"y"}"#))
        .unwrap();
    store.next_task(&runner.id).unwrap().unwrap();

    let stats = store.stats();
    assert_eq!(stats.runners, 1);
    assert_eq!(stats.jobs.values().sum::<usize>(), 2);
    assert_eq!(stats.tasks.values().sum::<usize>(), 2);
}
