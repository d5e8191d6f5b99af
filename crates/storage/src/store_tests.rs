// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use borg_core::test_support::{new_shell_job, retrying_job};
use borg_core::{FakeClock, Priority};
use tempfile::{tempdir, TempDir};

fn open_store() -> (Store<FakeClock>, FakeClock, TempDir) {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    let store = Store::open(dir.path(), clock.clone()).unwrap();
    (store, clock, dir)
}

fn register_runner(store: &Store<FakeClock>, device: &str, name: &str) -> Runner {
    store
        .register(RegisterParams {
            device_id: DeviceId::new(device.repeat(64 / device.len().max(1))),
            name: name.to_string(),
            hostname: format!("{name}-host"),
            os: "linux".to_string(),
            architecture: "x86_64".to_string(),
            max_concurrent_tasks: 2,
            token: "tok".to_string(),
            ..RegisterParams::default()
        })
        .unwrap()
}

fn heartbeat_params(status: RunnerStatus) -> HeartbeatParams {
    HeartbeatParams { status, active_tasks: 0, resources: None }
}

// ----------------------------------------------------------------------
// Enqueue
// ----------------------------------------------------------------------

#[test]
fn enqueue_creates_job_with_one_pending_task() {
    let (store, _, _dir) = open_store();
    let job = store.enqueue(new_shell_job("echo", "echo hi")).unwrap();

    assert_eq!(job.status, JobStatus::Pending);
    let tasks = store.job_tasks(&job.id);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Pending);
    assert_eq!(tasks[0].retry_count, 0);
    assert!(tasks[0].runner_id.is_none());
}

#[test]
fn enqueue_rejects_empty_name_and_command() {
    let (store, _, _dir) = open_store();

    let err = store.enqueue(new_shell_job("", "echo hi")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = store.enqueue(new_shell_job("n", "   ")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    assert!(store.list_jobs(10, 0, None).0.is_empty());
}

// ----------------------------------------------------------------------
// Dispatch
// ----------------------------------------------------------------------

#[test]
fn next_task_assigns_and_promotes_job() {
    let (store, _, _dir) = open_store();
    let runner = register_runner(&store, "a", "r1");
    let job = store.enqueue(new_shell_job("echo", "echo hi")).unwrap();

    let assignment = store.next_task(&runner.id).unwrap().unwrap();
    assert_eq!(assignment.job.id, job.id);
    assert_eq!(assignment.task.status, TaskStatus::Running);
    assert_eq!(assignment.task.runner_id.as_ref(), Some(&runner.id));
    assert!(assignment.task.started_at.is_some());

    assert_eq!(store.get_job(&job.id).unwrap().status, JobStatus::Running);
}

#[test]
fn next_task_empty_queue_is_none() {
    let (store, _, _dir) = open_store();
    let runner = register_runner(&store, "a", "r1");
    assert!(store.next_task(&runner.id).unwrap().is_none());
}

#[test]
fn next_task_never_hands_a_task_twice() {
    let (store, _, _dir) = open_store();
    let r1 = register_runner(&store, "a", "r1");
    let r2 = register_runner(&store, "b", "r2");
    store.enqueue(new_shell_job("echo", "echo hi")).unwrap();

    let first = store.next_task(&r1.id).unwrap();
    let second = store.next_task(&r2.id).unwrap();

    assert!(first.is_some());
    assert!(second.is_none());
}

#[test]
fn next_task_prefers_higher_priority_then_fifo() {
    let (store, clock, _dir) = open_store();
    let runner = register_runner(&store, "a", "r1");

    let normal = store.enqueue(new_shell_job("first", "echo 1")).unwrap();
    clock.advance(std::time::Duration::from_secs(1));
    let urgent = store
        .enqueue(NewJob { priority: Priority::Urgent, ..new_shell_job("second", "echo 2") })
        .unwrap();
    clock.advance(std::time::Duration::from_secs(1));
    let normal_late = store.enqueue(new_shell_job("third", "echo 3")).unwrap();

    let a = store.next_task(&runner.id).unwrap().unwrap();
    let b = store.next_task(&runner.id).unwrap().unwrap();
    let c = store.next_task(&runner.id).unwrap().unwrap();

    assert_eq!(a.job.id, urgent.id);
    assert_eq!(b.job.id, normal.id);
    assert_eq!(c.job.id, normal_late.id);
}

#[test]
fn next_task_skips_paused_jobs() {
    let (store, _, _dir) = open_store();
    let runner = register_runner(&store, "a", "r1");
    let job = store.enqueue(new_shell_job("echo", "echo hi")).unwrap();
    store.pause_job(&job.id).unwrap();

    assert!(store.next_task(&runner.id).unwrap().is_none());
}

// ----------------------------------------------------------------------
// Completion and rollup (scenario: enqueue + dispatch + complete)
// ----------------------------------------------------------------------

#[test]
fn completed_task_rolls_job_up() {
    let (store, _, _dir) = open_store();
    let runner = register_runner(&store, "a", "r1");
    let job = store.enqueue(new_shell_job("echo", "echo hi")).unwrap();
    let assignment = store.next_task(&runner.id).unwrap().unwrap();

    store
        .update_status(
            &assignment.task.id,
            UpdateStatusParams {
                status: Some(TaskStatus::Completed),
                exit_code: Some(0),
                stdout: b"hi\n".to_vec(),
                ..UpdateStatusParams::default()
            },
        )
        .unwrap();

    assert_eq!(store.get_job(&job.id).unwrap().status, JobStatus::Completed);

    let logs = store.task_logs(&assignment.task.id).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].level, LogLevel::Stdout);
    assert_eq!(logs[0].message, "hi\n");

    let task = store.get_task(&assignment.task.id).unwrap();
    assert_eq!(task.exit_code, Some(0));
    assert!(task.completed_at.is_some());
}

#[test]
fn terminal_update_reissue_is_noop() {
    let (store, _, _dir) = open_store();
    let runner = register_runner(&store, "a", "r1");
    let job = store.enqueue(new_shell_job("echo", "echo hi")).unwrap();
    let assignment = store.next_task(&runner.id).unwrap().unwrap();

    let done = UpdateStatusParams {
        status: Some(TaskStatus::Completed),
        exit_code: Some(0),
        ..UpdateStatusParams::default()
    };
    store.update_status(&assignment.task.id, done.clone()).unwrap();
    store.update_status(&assignment.task.id, done).unwrap();

    assert_eq!(store.get_job(&job.id).unwrap().status, JobStatus::Completed);
    assert_eq!(store.job_tasks(&job.id).len(), 1);
    assert!(store.task_logs(&assignment.task.id).unwrap().is_empty());
}

// ----------------------------------------------------------------------
// Retry policy (scenario: retry on failure)
// ----------------------------------------------------------------------

#[test]
fn failed_task_retries_until_exhausted() {
    let (store, _, _dir) = open_store();
    let runner = register_runner(&store, "a", "r1");
    let job = store.enqueue(retrying_job("flaky", 2)).unwrap();

    let fail = UpdateStatusParams {
        status: Some(TaskStatus::Failed),
        exit_code: Some(1),
        ..UpdateStatusParams::default()
    };

    // T1 fails → job still running, T2 pending with retry_count=1.
    let t1 = store.next_task(&runner.id).unwrap().unwrap();
    store.update_status(&t1.task.id, fail.clone()).unwrap();
    assert_eq!(store.get_job(&job.id).unwrap().status, JobStatus::Running);
    let tasks = store.job_tasks(&job.id);
    assert_eq!(tasks.len(), 2);
    let t2_row = tasks.iter().find(|t| t.retry_count == 1).unwrap();
    assert_eq!(t2_row.status, TaskStatus::Pending);

    // T2 fails → T3 with retry_count=2.
    let t2 = store.next_task(&runner.id).unwrap().unwrap();
    store.update_status(&t2.task.id, fail.clone()).unwrap();
    let tasks = store.job_tasks(&job.id);
    assert_eq!(tasks.len(), 3);
    assert!(tasks.iter().any(|t| t.retry_count == 2 && t.status == TaskStatus::Pending));

    // T3 fails → retries exhausted, job failed, no T4.
    let t3 = store.next_task(&runner.id).unwrap().unwrap();
    store.update_status(&t3.task.id, fail).unwrap();
    assert_eq!(store.get_job(&job.id).unwrap().status, JobStatus::Failed);
    assert_eq!(store.job_tasks(&job.id).len(), 3);
}

#[test]
fn failed_row_is_not_mutated_by_retry() {
    let (store, _, _dir) = open_store();
    let runner = register_runner(&store, "a", "r1");
    let job = store.enqueue(retrying_job("flaky", 1)).unwrap();

    let t1 = store.next_task(&runner.id).unwrap().unwrap();
    store
        .update_status(
            &t1.task.id,
            UpdateStatusParams {
                status: Some(TaskStatus::Failed),
                exit_code: Some(1),
                error_message: "boom".to_string(),
                ..UpdateStatusParams::default()
            },
        )
        .unwrap();

    let old = store.get_task(&t1.task.id).unwrap();
    assert_eq!(old.status, TaskStatus::Failed);
    assert_eq!(old.error_message, "boom");
    assert_eq!(old.retry_count, 0);

    let retry = store
        .job_tasks(&job.id)
        .into_iter()
        .find(|t| t.retry_count == 1)
        .unwrap();
    assert_ne!(retry.id, old.id);
    assert!(retry.error_message.is_empty());
}

#[test]
fn retry_delay_defers_eligibility() {
    let (store, clock, _dir) = open_store();
    let runner = register_runner(&store, "a", "r1");
    store
        .enqueue(NewJob { retry_delay_seconds: 60, ..retrying_job("slow-retry", 1) })
        .unwrap();

    let t1 = store.next_task(&runner.id).unwrap().unwrap();
    store
        .update_status(
            &t1.task.id,
            UpdateStatusParams {
                status: Some(TaskStatus::Failed),
                ..UpdateStatusParams::default()
            },
        )
        .unwrap();

    // Not yet eligible.
    assert!(store.next_task(&runner.id).unwrap().is_none());

    clock.advance(std::time::Duration::from_secs(61));
    assert!(store.next_task(&runner.id).unwrap().is_some());
}

#[test]
fn exit_code_sentinel_never_reaches_state() {
    let (store, _, _dir) = open_store();
    let runner = register_runner(&store, "a", "r1");
    store.enqueue(new_shell_job("echo", "echo hi")).unwrap();
    let t1 = store.next_task(&runner.id).unwrap().unwrap();

    // The wire layer normalizes −1 to None before the store sees it.
    store
        .update_status(
            &t1.task.id,
            UpdateStatusParams {
                status: Some(TaskStatus::Failed),
                exit_code: None,
                ..UpdateStatusParams::default()
            },
        )
        .unwrap();
    assert_eq!(store.get_task(&t1.task.id).unwrap().exit_code, None);
}

// ----------------------------------------------------------------------
// Pause / resume / cancel (scenario: cancel propagation)
// ----------------------------------------------------------------------

#[test]
fn cancel_propagates_to_running_tasks() {
    let (store, _, _dir) = open_store();
    let runner = register_runner(&store, "a", "r1");
    let job = store.enqueue(new_shell_job("echo", "sleep 60")).unwrap();
    let t1 = store.next_task(&runner.id).unwrap().unwrap();

    store.cancel_job(&job.id).unwrap();

    assert_eq!(store.get_job(&job.id).unwrap().status, JobStatus::Cancelled);
    let task = store.get_task(&t1.task.id).unwrap();
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert!(task.completed_at.is_some());
}

#[test]
fn cancel_terminal_job_is_conflict() {
    let (store, _, _dir) = open_store();
    let job = store.enqueue(new_shell_job("echo", "echo hi")).unwrap();
    store.cancel_job(&job.id).unwrap();

    let err = store.cancel_job(&job.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn pause_then_resume_recreates_tasks() {
    let (store, _, _dir) = open_store();
    let runner = register_runner(&store, "a", "r1");
    let job = store.enqueue(new_shell_job("echo", "sleep 60")).unwrap();
    let t1 = store.next_task(&runner.id).unwrap().unwrap();

    store.pause_job(&job.id).unwrap();
    assert_eq!(store.get_job(&job.id).unwrap().status, JobStatus::Paused);
    assert_eq!(store.get_task(&t1.task.id).unwrap().status, TaskStatus::Paused);

    // Paused jobs are not dispatched.
    assert!(store.next_task(&runner.id).unwrap().is_none());

    store.resume_job(&job.id).unwrap();
    assert_eq!(store.get_job(&job.id).unwrap().status, JobStatus::Pending);
    assert_eq!(store.get_task(&t1.task.id).unwrap().status, TaskStatus::Cancelled);

    let tasks = store.job_tasks(&job.id);
    assert_eq!(tasks.len(), 2);
    let fresh = tasks.iter().find(|t| t.status == TaskStatus::Pending).unwrap();
    assert_eq!(fresh.retry_count, t1.task.retry_count);
}

#[test]
fn resume_requires_paused() {
    let (store, _, _dir) = open_store();
    let job = store.enqueue(new_shell_job("echo", "echo hi")).unwrap();
    let err = store.resume_job(&job.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

// ----------------------------------------------------------------------
// Registry (scenarios: offline derivation, identity through rename)
// ----------------------------------------------------------------------

#[test]
fn register_requires_token() {
    let (store, _, _dir) = open_store();
    let err = store
        .register(RegisterParams {
            device_id: DeviceId::new("a".repeat(64)),
            name: "r1".to_string(),
            ..RegisterParams::default()
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[test]
fn register_same_device_is_one_row() {
    let (store, _, _dir) = open_store();
    let first = register_runner(&store, "a", "r1");
    let second = register_runner(&store, "a", "r1");

    assert_eq!(first.id, second.id);
    assert_eq!(store.list_runners().len(), 1);
}

#[test]
fn register_empty_device_synthesizes_one() {
    let (store, _, _dir) = open_store();
    let runner = store
        .register(RegisterParams {
            name: "legacy".to_string(),
            hostname: "legacy-host".to_string(),
            token: "tok".to_string(),
            ..RegisterParams::default()
        })
        .unwrap();
    assert!(runner.device_id.is_canonical());
}

#[test]
fn register_falls_back_to_hostname_match() {
    let (store, _, _dir) = open_store();
    let first = store
        .register(RegisterParams {
            name: "legacy".to_string(),
            hostname: "shared-host".to_string(),
            token: "tok".to_string(),
            ..RegisterParams::default()
        })
        .unwrap();

    // Same hostname, still no device id: must update the same row.
    let second = store
        .register(RegisterParams {
            name: "legacy-renamed".to_string(),
            hostname: "shared-host".to_string(),
            token: "tok".to_string(),
            ..RegisterParams::default()
        })
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.name, "legacy-renamed");
}

#[test]
fn device_identity_preserved_through_rename() {
    let (store, _, _dir) = open_store();
    let device = DeviceId::new("x".repeat(64));

    let registered = store
        .register(RegisterParams {
            device_id: device.clone(),
            name: "a".to_string(),
            hostname: "h".to_string(),
            token: "tok".to_string(),
            ..RegisterParams::default()
        })
        .unwrap();

    store.rename_runner(&registered.id, "b").unwrap();
    assert_eq!(store.get_runner(&registered.id).unwrap().name, "b");

    let re_registered = store
        .register(RegisterParams {
            device_id: device.clone(),
            name: "c".to_string(),
            hostname: "h".to_string(),
            token: "tok".to_string(),
            ..RegisterParams::default()
        })
        .unwrap();

    assert_eq!(re_registered.id, registered.id);
    assert_eq!(re_registered.name, "c");
    assert_eq!(re_registered.device_id, device);
    assert_eq!(store.list_runners().len(), 1);
}

#[test]
fn delete_then_register_revives_row() {
    let (store, _, _dir) = open_store();
    let runner = register_runner(&store, "a", "r1");

    store.delete_runner(&runner.id).unwrap();
    assert!(store.list_runners().is_empty());
    assert!(store.get_runner(&runner.id).is_err());

    let revived = register_runner(&store, "a", "r1");
    assert_eq!(revived.id, runner.id);
    assert!(!revived.is_deleted());
    assert_eq!(store.list_runners().len(), 1);
}

#[test]
fn delete_with_active_tasks_is_conflict() {
    let (store, _, _dir) = open_store();
    let runner = register_runner(&store, "a", "r1");
    store
        .heartbeat(
            &runner.id,
            HeartbeatParams {
                status: RunnerStatus::Busy,
                active_tasks: 1,
                resources: None,
            },
        )
        .unwrap();

    let err = store.delete_runner(&runner.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn heartbeat_unknown_runner_is_not_found() {
    let (store, _, _dir) = open_store();
    let err = store
        .heartbeat(&RunnerId::new("ghost"), heartbeat_params(RunnerStatus::Idle))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn heartbeat_never_stores_offline() {
    let (store, _, _dir) = open_store();
    let runner = register_runner(&store, "a", "r1");
    store.heartbeat(&runner.id, heartbeat_params(RunnerStatus::Offline)).unwrap();
    assert_eq!(store.get_runner(&runner.id).unwrap().status, RunnerStatus::Idle);
}

#[test]
fn offline_is_derived_not_stored() {
    let (store, clock, _dir) = open_store();
    let runner = register_runner(&store, "a", "r1");

    clock.advance(std::time::Duration::from_secs(180));
    let row = store.get_runner(&runner.id).unwrap();

    // Stored status untouched; derivation happens at render time.
    assert_eq!(row.status, RunnerStatus::Idle);
    assert_eq!(row.effective_status(clock.now_utc()), RunnerStatus::Offline);

    // A follow-up heartbeat flips it back.
    store.heartbeat(&runner.id, heartbeat_params(RunnerStatus::Idle)).unwrap();
    let row = store.get_runner(&runner.id).unwrap();
    assert_eq!(row.effective_status(clock.now_utc()), RunnerStatus::Idle);
}

#[test]
fn heartbeat_applies_resource_deltas() {
    let (store, _, _dir) = open_store();
    let runner = register_runner(&store, "a", "r1");
    store
        .heartbeat(
            &runner.id,
            HeartbeatParams {
                status: RunnerStatus::Idle,
                active_tasks: 0,
                resources: Some(ResourceDelta {
                    disk_space_gb: Some(99.5),
                    memory_gb: Some(32.0),
                    public_ips: Some(vec!["203.0.113.7".to_string()]),
                    ..ResourceDelta::default()
                }),
            },
        )
        .unwrap();

    let row = store.get_runner(&runner.id).unwrap();
    assert!((row.resources.disk_space_gb - 99.5).abs() < f64::EPSILON);
    assert!((row.resources.memory_gb - 32.0).abs() < f64::EPSILON);
    assert_eq!(row.resources.public_ips, vec!["203.0.113.7"]);
}

// ----------------------------------------------------------------------
// Stats, logs, persistence
// ----------------------------------------------------------------------

#[test]
fn stats_buckets_by_status() {
    let (store, _, _dir) = open_store();
    let runner = register_runner(&store, "a", "r1");
    store.enqueue(new_shell_job("one", "echo 1")).unwrap();
    store.enqueue(new_shell_job("two", "echo 2")).unwrap();
    store.next_task(&runner.id).unwrap().unwrap();

    let stats = store.stats();
    assert_eq!(stats.jobs.get("running"), Some(&1));
    assert_eq!(stats.jobs.get("pending"), Some(&1));
    assert_eq!(stats.tasks.get("running"), Some(&1));
    assert_eq!(stats.tasks.get("pending"), Some(&1));
    assert_eq!(stats.runners, 1);
}

#[test]
fn log_order_is_preserved() {
    let (store, clock, _dir) = open_store();
    let runner = register_runner(&store, "a", "r1");
    store.enqueue(new_shell_job("echo", "echo hi")).unwrap();
    let t = store.next_task(&runner.id).unwrap().unwrap();

    for i in 0..5 {
        store
            .append_log(&t.task.id, LogLevel::Stdout, format!("line {i}"), None)
            .unwrap();
        clock.advance(std::time::Duration::from_millis(10));
    }

    let logs = store.task_logs(&t.task.id).unwrap();
    let messages: Vec<&str> = logs.iter().map(|l| l.message.as_str()).collect();
    assert_eq!(messages, vec!["line 0", "line 1", "line 2", "line 3", "line 4"]);
    assert!(logs.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[test]
fn state_survives_reopen() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();

    let job_id = {
        let store = Store::open(dir.path(), clock.clone()).unwrap();
        let runner = register_runner(&store, "a", "r1");
        let job = store.enqueue(new_shell_job("persist", "echo hi")).unwrap();
        let t = store.next_task(&runner.id).unwrap().unwrap();
        store
            .update_status(
                &t.task.id,
                UpdateStatusParams {
                    status: Some(TaskStatus::Completed),
                    exit_code: Some(0),
                    stdout: b"done\n".to_vec(),
                    ..UpdateStatusParams::default()
                },
            )
            .unwrap();
        job.id
    };

    let store = Store::open(dir.path(), clock).unwrap();
    let job = store.get_job(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(store.list_runners().len(), 1);

    let tasks = store.job_tasks(&job_id);
    assert_eq!(tasks.len(), 1);
    assert_eq!(store.task_logs(&tasks[0].id).unwrap().len(), 1);
}

#[test]
fn seed_user_only_once() {
    let (store, _, _dir) = open_store();
    store.seed_user_if_empty("admin", "hash-1").unwrap();
    store.seed_user_if_empty("other", "hash-2").unwrap();

    assert!(store.user_by_name("admin").is_some());
    assert!(store.user_by_name("other").is_none());
}
