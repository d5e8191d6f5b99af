// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The serialisable store facade: queue & lifecycle engine plus runner
//! registry.
//!
//! Every mutation validates against the current state, appends the
//! resulting events to the WAL, and applies them — all under one lock
//! acquisition. Nothing is mutated when validation fails, which is the
//! transactional boundary the queue relies on: concurrent `next_task`
//! callers serialize here, so a pending task flips to running exactly once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use borg_core::consts::DEFAULT_HEARTBEAT_INTERVAL;
use borg_core::event::ResourceDelta;
use borg_core::{
    Artifact, Clock, DeviceId, ErrorKind, Event, FileId, FileMeta, Job, JobFile, JobId,
    JobStatus, LogLevel, NewJob, ResourceSnapshot, Runner, RunnerId, RunnerStatus, RuntimeSpec,
    ScreenSettings, Task, TaskId, TaskLog, TaskStatus, User, UserId,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::snapshot::{Snapshot, SnapshotError};
use crate::state::MaterializedState;
use crate::wal::{Wal, WalError};

/// Snapshot after this many WAL appends.
const SNAPSHOT_EVERY: u64 = 512;

/// Errors surfaced by store operations, tagged for the API layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::InvalidInput(_) => ErrorKind::InvalidInput,
            StoreError::Unauthorized(_) => ErrorKind::Unauthorized,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Conflict(_) => ErrorKind::Conflict,
            StoreError::Wal(_) | StoreError::Snapshot(_) => ErrorKind::Unavailable,
        }
    }
}

/// Registration parameters after wire normalization.
#[derive(Debug, Clone, Default)]
pub struct RegisterParams {
    pub device_id: DeviceId,
    pub name: String,
    pub hostname: String,
    pub os: String,
    pub architecture: String,
    pub max_concurrent_tasks: i32,
    pub labels: HashMap<String, String>,
    pub token: String,
    pub resources: ResourceSnapshot,
    pub screen_monitoring_enabled: bool,
    pub runtimes: Vec<RuntimeSpec>,
}

/// Heartbeat parameters after wire normalization.
#[derive(Debug, Clone)]
pub struct HeartbeatParams {
    pub status: RunnerStatus,
    pub active_tasks: i32,
    pub resources: Option<ResourceDelta>,
}

/// Parameters for a task status write.
#[derive(Debug, Clone, Default)]
pub struct UpdateStatusParams {
    pub status: Option<TaskStatus>,
    /// Already normalized: the −1 wire sentinel never reaches the store.
    pub exit_code: Option<i32>,
    pub error_message: String,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Sender-reported time; the store clock is used when absent.
    pub timestamp: Option<DateTime<Utc>>,
}

/// A dispatched task together with everything needed to build its wire
/// descriptor.
#[derive(Debug, Clone)]
pub struct TaskAssignment {
    pub task: Task,
    pub job: Job,
    pub required_files: Vec<JobFile>,
}

/// One atomic stats snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats {
    pub jobs: HashMap<String, usize>,
    pub tasks: HashMap<String, usize>,
    pub runners: usize,
}

struct Inner {
    wal: Wal,
    state: MaterializedState,
    appends_since_snapshot: u64,
}

/// WAL-backed transactional store.
pub struct Store<C: Clock> {
    inner: Mutex<Inner>,
    clock: C,
    snapshot_path: PathBuf,
}

impl<C: Clock> Store<C> {
    /// Recover state from `<state_dir>/state.snapshot` + `<state_dir>/events.wal`.
    pub fn open(state_dir: &Path, clock: C) -> Result<Self, StoreError> {
        let snapshot_path = state_dir.join("state.snapshot");
        let wal_path = state_dir.join("events.wal");

        let (mut state, processed) = match Snapshot::load(&snapshot_path)? {
            Some(snap) => (snap.state, snap.seq),
            None => (MaterializedState::default(), 0),
        };

        let mut wal = Wal::open(&wal_path, processed)?;
        let mut replayed = 0u64;
        while let Some(entry) = wal.next_unprocessed()? {
            state.apply_event(&entry.event);
            wal.mark_processed(entry.seq);
            replayed += 1;
        }
        if replayed > 0 {
            tracing::info!(replayed, "store: replayed WAL entries after snapshot");
        }

        Ok(Self {
            inner: Mutex::new(Inner { wal, state, appends_since_snapshot: 0 }),
            clock,
            snapshot_path,
        })
    }

    /// Append, flush, and apply a batch of events as one transaction.
    fn commit(&self, inner: &mut Inner, events: Vec<Event>) -> Result<(), StoreError> {
        for event in &events {
            let seq = inner.wal.append(event)?;
            inner.wal.mark_processed(seq);
        }
        inner.wal.flush()?;
        for event in &events {
            inner.state.apply_event(event);
        }
        inner.appends_since_snapshot += events.len() as u64;
        if inner.appends_since_snapshot >= SNAPSHOT_EVERY {
            self.snapshot_locked(inner)?;
        }
        Ok(())
    }

    fn snapshot_locked(&self, inner: &mut Inner) -> Result<(), StoreError> {
        Snapshot::new(inner.wal.write_seq(), inner.state.clone()).save(&self.snapshot_path)?;
        inner.appends_since_snapshot = 0;
        Ok(())
    }

    /// Persist a snapshot now (shutdown path).
    pub fn save_snapshot(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        self.snapshot_locked(&mut inner)
    }

    // ------------------------------------------------------------------
    // Queue & lifecycle
    // ------------------------------------------------------------------

    /// Accept a job and create its initial task.
    pub fn enqueue(&self, new: NewJob) -> Result<Job, StoreError> {
        if new.name.trim().is_empty() {
            return Err(StoreError::InvalidInput("job name must not be empty".into()));
        }
        if new.command.trim().is_empty() {
            return Err(StoreError::InvalidInput("job command must not be empty".into()));
        }

        let now = self.clock.now_utc();
        let job = Job {
            id: JobId::generate(),
            name: new.name,
            description: new.description,
            kind: new.kind,
            status: JobStatus::Pending,
            priority: new.priority,
            command: new.command,
            args: new.args,
            env: new.env,
            working_directory: new.working_directory,
            timeout_seconds: new.timeout_seconds,
            max_retries: new.max_retries,
            retry_delay_seconds: new.retry_delay_seconds,
            docker_image: new.docker_image,
            privileged: new.privileged,
            executor_binary_id: new.executor_binary_id,
            processor_script_id: new.processor_script_id,
            dataset_id: new.dataset_id,
            metadata: new.metadata,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let files: Vec<JobFile> = new
            .files
            .into_iter()
            .map(|(file_id, destination_path)| JobFile {
                job_id: job.id.clone(),
                file_id,
                destination_path,
            })
            .collect();
        let task = Task {
            id: TaskId::generate(),
            job_id: job.id.clone(),
            runner_id: None,
            status: TaskStatus::Pending,
            started_at: None,
            completed_at: None,
            exit_code: None,
            error_message: String::new(),
            retry_count: 0,
            task_data: None,
            result: None,
            created_at: now,
            not_before: None,
        };

        let mut inner = self.inner.lock();
        self.commit(
            &mut inner,
            vec![
                Event::JobCreated { job: job.clone(), files },
                Event::TaskCreated { task },
            ],
        )?;
        Ok(job)
    }

    /// Hand the next eligible task to a runner, flipping it to running.
    ///
    /// Selection: highest job priority first, then oldest task. Eligible
    /// means the task is pending, its retry delay (if any) has elapsed,
    /// and the parent job is pending or running. Returns `None` when the
    /// queue has nothing for this runner — an expected idle condition.
    pub fn next_task(&self, runner_id: &RunnerId) -> Result<Option<TaskAssignment>, StoreError> {
        let now = self.clock.now_utc();
        let mut inner = self.inner.lock();

        let candidate = {
            let state = &inner.state;
            let mut eligible: Vec<(&Task, &Job)> = state
                .tasks
                .values()
                .filter(|t| t.status == TaskStatus::Pending)
                .filter(|t| t.not_before.map(|nb| nb <= now).unwrap_or(true))
                .filter_map(|t| state.jobs.get(&t.job_id).map(|j| (t, j)))
                .filter(|(_, j)| matches!(j.status, JobStatus::Pending | JobStatus::Running))
                .collect();
            eligible.sort_by(|(ta, ja), (tb, jb)| {
                jb.priority
                    .cmp(&ja.priority)
                    .then(ta.created_at.cmp(&tb.created_at))
            });
            eligible.first().map(|(t, _)| t.id.clone())
        };

        let Some(task_id) = candidate else {
            return Ok(None);
        };

        let job_id = match inner.state.tasks.get(&task_id) {
            Some(t) => t.job_id.clone(),
            None => return Ok(None),
        };

        let mut events = vec![Event::TaskAssigned {
            task_id: task_id.clone(),
            runner_id: runner_id.clone(),
            at: now,
        }];
        if inner.state.jobs.get(&job_id).map(|j| j.status) == Some(JobStatus::Pending) {
            events.push(Event::JobStatusChanged {
                job_id: job_id.clone(),
                status: JobStatus::Running,
                at: now,
            });
        }
        self.commit(&mut inner, events)?;

        let state = &inner.state;
        let (Some(task), Some(job)) = (state.tasks.get(&task_id), state.jobs.get(&job_id)) else {
            return Ok(None);
        };
        Ok(Some(TaskAssignment {
            task: task.clone(),
            job: job.clone(),
            required_files: state.job_files.get(&job_id).cloned().unwrap_or_default(),
        }))
    }

    /// Apply a status update from a runner: log chunks, terminal status,
    /// retry policy, and job-completion rollup.
    ///
    /// Reissuing an update for an already-terminal task is a no-op.
    pub fn update_status(
        &self,
        task_id: &TaskId,
        params: UpdateStatusParams,
    ) -> Result<(), StoreError> {
        let now = params.timestamp.unwrap_or_else(|| self.clock.now_utc());
        let mut inner = self.inner.lock();

        let task = inner
            .state
            .tasks
            .get(task_id)
            .ok_or_else(|| StoreError::NotFound(format!("unknown task {task_id}")))?
            .clone();

        if task.is_terminal() {
            return Ok(());
        }

        let mut events = Vec::new();
        if !params.stdout.is_empty() {
            events.push(Event::TaskLogAppended {
                task_id: task_id.clone(),
                level: LogLevel::Stdout,
                message: String::from_utf8_lossy(&params.stdout).into_owned(),
                at: now,
            });
        }
        if !params.stderr.is_empty() {
            events.push(Event::TaskLogAppended {
                task_id: task_id.clone(),
                level: LogLevel::Stderr,
                message: String::from_utf8_lossy(&params.stderr).into_owned(),
                at: now,
            });
        }

        let Some(status) = params.status else {
            // Log-only update.
            if events.is_empty() {
                return Ok(());
            }
            return self.commit(&mut inner, events);
        };

        events.push(Event::TaskStatusChanged {
            task_id: task_id.clone(),
            status,
            exit_code: params.exit_code,
            error_message: params.error_message.clone(),
            at: now,
        });

        match status {
            TaskStatus::Failed => {
                if let Some(job) = inner.state.jobs.get(&task.job_id) {
                    if task.retry_count < job.max_retries {
                        let not_before = (job.retry_delay_seconds > 0)
                            .then(|| now + chrono::Duration::seconds(job.retry_delay_seconds));
                        events.push(Event::TaskCreated {
                            task: Task {
                                id: TaskId::generate(),
                                job_id: task.job_id.clone(),
                                runner_id: None,
                                status: TaskStatus::Pending,
                                started_at: None,
                                completed_at: None,
                                exit_code: None,
                                error_message: String::new(),
                                retry_count: task.retry_count + 1,
                                task_data: task.task_data.clone(),
                                result: None,
                                created_at: now,
                                not_before,
                            },
                        });
                    } else if !job.status.is_terminal() {
                        events.push(Event::JobStatusChanged {
                            job_id: task.job_id.clone(),
                            status: JobStatus::Failed,
                            at: now,
                        });
                    }
                }
            }
            TaskStatus::Completed => {
                // Rollup: completed iff no sibling remains non-terminal.
                let state = &inner.state;
                let open_siblings = state
                    .tasks
                    .values()
                    .filter(|t| t.job_id == task.job_id && t.id != task.id)
                    .any(|t| !t.is_terminal());
                let job_open = state
                    .jobs
                    .get(&task.job_id)
                    .map(|j| !j.status.is_terminal())
                    .unwrap_or(false);
                if !open_siblings && job_open {
                    events.push(Event::JobStatusChanged {
                        job_id: task.job_id.clone(),
                        status: JobStatus::Completed,
                        at: now,
                    });
                }
            }
            _ => {}
        }

        self.commit(&mut inner, events)
    }

    /// Append one streamed log line (the `log_chunk` path).
    pub fn append_log(
        &self,
        task_id: &TaskId,
        level: LogLevel,
        message: String,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.state.tasks.contains_key(task_id) {
            return Err(StoreError::NotFound(format!("unknown task {task_id}")));
        }
        let at = at.unwrap_or_else(|| self.clock.now_utc());
        self.commit(
            &mut inner,
            vec![Event::TaskLogAppended { task_id: task_id.clone(), level, message, at }],
        )
    }

    /// Record the result JSON of an executor_binary task.
    pub fn record_result(
        &self,
        task_id: &TaskId,
        result: serde_json::Value,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.state.tasks.contains_key(task_id) {
            return Err(StoreError::NotFound(format!("unknown task {task_id}")));
        }
        self.commit(
            &mut inner,
            vec![Event::TaskResultRecorded { task_id: task_id.clone(), result }],
        )
    }

    /// Pause a job: running child tasks are marked paused; runner-side
    /// cancellation is best-effort and out of band.
    pub fn pause_job(&self, job_id: &JobId) -> Result<(), StoreError> {
        let now = self.clock.now_utc();
        let mut inner = self.inner.lock();
        let job = self.require_job(&inner, job_id)?;
        if !matches!(job.status, JobStatus::Pending | JobStatus::Running) {
            return Err(StoreError::Conflict(format!(
                "cannot pause job in status {}",
                job.status
            )));
        }

        // Pending tasks stay pending: the paused job status alone keeps
        // them out of dispatch.
        let mut events = vec![Event::JobStatusChanged {
            job_id: job_id.clone(),
            status: JobStatus::Paused,
            at: now,
        }];
        for task in inner.state.job_tasks(job_id) {
            if task.status == TaskStatus::Running {
                events.push(Event::TaskStatusChanged {
                    task_id: task.id.clone(),
                    status: TaskStatus::Paused,
                    exit_code: None,
                    error_message: String::new(),
                    at: now,
                });
            }
        }
        self.commit(&mut inner, events)
    }

    /// Resume a paused job: each paused task is replaced by a fresh
    /// pending task carrying its retry count; the old row is cancelled.
    pub fn resume_job(&self, job_id: &JobId) -> Result<(), StoreError> {
        let now = self.clock.now_utc();
        let mut inner = self.inner.lock();
        let job = self.require_job(&inner, job_id)?;
        if job.status != JobStatus::Paused {
            return Err(StoreError::Conflict(format!(
                "cannot resume job in status {}",
                job.status
            )));
        }

        let mut events = vec![Event::JobStatusChanged {
            job_id: job_id.clone(),
            status: JobStatus::Pending,
            at: now,
        }];
        let paused: Vec<Task> = inner
            .state
            .job_tasks(job_id)
            .into_iter()
            .filter(|t| t.status == TaskStatus::Paused)
            .cloned()
            .collect();
        for old in paused {
            events.push(Event::TaskStatusChanged {
                task_id: old.id.clone(),
                status: TaskStatus::Cancelled,
                exit_code: None,
                error_message: String::new(),
                at: now,
            });
            events.push(Event::TaskCreated {
                task: Task {
                    id: TaskId::generate(),
                    job_id: job_id.clone(),
                    runner_id: None,
                    status: TaskStatus::Pending,
                    started_at: None,
                    completed_at: None,
                    exit_code: None,
                    error_message: String::new(),
                    retry_count: old.retry_count,
                    task_data: old.task_data.clone(),
                    result: None,
                    created_at: now,
                    not_before: None,
                },
            });
        }
        self.commit(&mut inner, events)
    }

    /// Cancel a job and every non-terminal child task.
    pub fn cancel_job(&self, job_id: &JobId) -> Result<(), StoreError> {
        let now = self.clock.now_utc();
        let mut inner = self.inner.lock();
        let job = self.require_job(&inner, job_id)?;
        if job.status.is_terminal() {
            return Err(StoreError::Conflict(format!(
                "job already in terminal status {}",
                job.status
            )));
        }

        let mut events = vec![Event::JobStatusChanged {
            job_id: job_id.clone(),
            status: JobStatus::Cancelled,
            at: now,
        }];
        for task in inner.state.job_tasks(job_id) {
            if !task.is_terminal() {
                events.push(Event::TaskStatusChanged {
                    task_id: task.id.clone(),
                    status: TaskStatus::Cancelled,
                    exit_code: None,
                    error_message: String::new(),
                    at: now,
                });
            }
        }
        self.commit(&mut inner, events)
    }

    fn require_job(&self, inner: &Inner, job_id: &JobId) -> Result<Job, StoreError> {
        inner
            .state
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("unknown job {job_id}")))
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn get_job(&self, job_id: &JobId) -> Result<Job, StoreError> {
        let inner = self.inner.lock();
        self.require_job(&inner, job_id)
    }

    /// Jobs newest-first with paging and optional status filter.
    pub fn list_jobs(
        &self,
        limit: usize,
        offset: usize,
        status: Option<JobStatus>,
    ) -> (Vec<Job>, usize) {
        let inner = self.inner.lock();
        let mut jobs: Vec<Job> = inner
            .state
            .jobs
            .values()
            .filter(|j| status.map(|s| j.status == s).unwrap_or(true))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = jobs.len();
        let page = jobs.into_iter().skip(offset).take(limit).collect();
        (page, total)
    }

    pub fn get_task(&self, task_id: &TaskId) -> Result<Task, StoreError> {
        let inner = self.inner.lock();
        inner
            .state
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("unknown task {task_id}")))
    }

    pub fn job_tasks(&self, job_id: &JobId) -> Vec<Task> {
        let inner = self.inner.lock();
        inner.state.job_tasks(job_id).into_iter().cloned().collect()
    }

    /// Log lines in non-decreasing timestamp order.
    pub fn task_logs(&self, task_id: &TaskId) -> Result<Vec<TaskLog>, StoreError> {
        let inner = self.inner.lock();
        if !inner.state.tasks.contains_key(task_id) {
            return Err(StoreError::NotFound(format!("unknown task {task_id}")));
        }
        Ok(inner.state.task_logs_sorted(task_id))
    }

    /// Counts from a single state snapshot.
    pub fn stats(&self) -> Stats {
        let inner = self.inner.lock();
        let mut stats = Stats::default();
        for job in inner.state.jobs.values() {
            *stats.jobs.entry(job.status.to_string()).or_default() += 1;
        }
        for task in inner.state.tasks.values() {
            *stats.tasks.entry(task.status.to_string()).or_default() += 1;
        }
        stats.runners = inner.state.runners.values().filter(|r| !r.is_deleted()).count();
        stats
    }

    // ------------------------------------------------------------------
    // Runner registry
    // ------------------------------------------------------------------

    /// Register a runner: revive-or-update the row matching the device id
    /// (hostname as legacy fallback), or create a fresh one.
    pub fn register(&self, params: RegisterParams) -> Result<Runner, StoreError> {
        if params.token.trim().is_empty() {
            return Err(StoreError::Unauthorized("registration token required".into()));
        }

        let now = self.clock.now_utc();
        let mut inner = self.inner.lock();

        // Device id is the authoritative match key; hostname is only a
        // back-compat fallback for agents that sent none.
        let existing = if params.device_id.is_empty() {
            inner.state.runner_by_hostname(&params.hostname).cloned()
        } else {
            inner.state.runner_by_device(&params.device_id).cloned()
        };

        let runner = match existing {
            Some(mut row) => {
                // Keep server id and registration time; overwrite the rest.
                if !params.name.is_empty() {
                    row.name = params.name;
                }
                row.hostname = params.hostname;
                row.os = params.os;
                row.architecture = params.architecture;
                row.max_concurrent_tasks = params.max_concurrent_tasks.max(1);
                row.labels = params.labels;
                row.resources = params.resources;
                row.screen_monitoring_enabled = params.screen_monitoring_enabled;
                row.runtimes = params.runtimes;
                row.status = RunnerStatus::Idle;
                row.last_heartbeat = now;
                row.deleted_at = None;
                if row.device_id.is_empty() && !params.device_id.is_empty() {
                    row.device_id = params.device_id;
                }
                row
            }
            None => Runner {
                id: RunnerId::generate(),
                device_id: if params.device_id.is_empty() {
                    DeviceId::synthesize()
                } else {
                    params.device_id
                },
                name: if params.name.is_empty() {
                    params.hostname.clone()
                } else {
                    params.name
                },
                hostname: params.hostname,
                os: params.os,
                architecture: params.architecture,
                status: RunnerStatus::Idle,
                max_concurrent_tasks: params.max_concurrent_tasks.max(1),
                active_tasks: 0,
                labels: params.labels,
                resources: params.resources,
                screen_monitoring_enabled: params.screen_monitoring_enabled,
                screen_settings: ScreenSettings::default(),
                runtimes: params.runtimes,
                registered_at: now,
                last_heartbeat: now,
                deleted_at: None,
            },
        };

        self.commit(&mut inner, vec![Event::RunnerRegistered { runner: runner.clone() }])?;
        Ok(runner)
    }

    /// Record a heartbeat; returns the recommended next interval.
    pub fn heartbeat(
        &self,
        runner_id: &RunnerId,
        params: HeartbeatParams,
    ) -> Result<Duration, StoreError> {
        let now = self.clock.now_utc();
        let mut inner = self.inner.lock();
        match inner.state.runners.get(runner_id) {
            Some(r) if !r.is_deleted() => {}
            _ => return Err(StoreError::NotFound(format!("unknown runner {runner_id}"))),
        }

        // "offline" is derived-only; a runner can never store it.
        let status = match params.status {
            RunnerStatus::Offline => RunnerStatus::Idle,
            other => other,
        };

        self.commit(
            &mut inner,
            vec![Event::RunnerHeartbeat {
                runner_id: runner_id.clone(),
                status,
                active_tasks: params.active_tasks.max(0),
                resources: params.resources,
                at: now,
            }],
        )?;
        Ok(DEFAULT_HEARTBEAT_INTERVAL)
    }

    /// Live runners. Derived offline is applied by the caller at render
    /// time via [`Runner::effective_status`].
    pub fn list_runners(&self) -> Vec<Runner> {
        let inner = self.inner.lock();
        let mut runners: Vec<Runner> =
            inner.state.runners.values().filter(|r| !r.is_deleted()).cloned().collect();
        runners.sort_by(|a, b| a.registered_at.cmp(&b.registered_at));
        runners
    }

    pub fn get_runner(&self, runner_id: &RunnerId) -> Result<Runner, StoreError> {
        let inner = self.inner.lock();
        inner
            .state
            .runners
            .get(runner_id)
            .filter(|r| !r.is_deleted())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("unknown runner {runner_id}")))
    }

    /// Rename only; device identity never changes through this path.
    pub fn rename_runner(&self, runner_id: &RunnerId, name: &str) -> Result<Runner, StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::InvalidInput("runner name must not be empty".into()));
        }
        let mut inner = self.inner.lock();
        if !inner.state.runners.get(runner_id).map(|r| !r.is_deleted()).unwrap_or(false) {
            return Err(StoreError::NotFound(format!("unknown runner {runner_id}")));
        }
        self.commit(
            &mut inner,
            vec![Event::RunnerRenamed { runner_id: runner_id.clone(), name: name.to_string() }],
        )?;
        inner
            .state
            .runners
            .get(runner_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("unknown runner {runner_id}")))
    }

    /// Soft delete. A runner with active tasks cannot be deleted.
    pub fn delete_runner(&self, runner_id: &RunnerId) -> Result<(), StoreError> {
        let now = self.clock.now_utc();
        let mut inner = self.inner.lock();
        let runner = inner
            .state
            .runners
            .get(runner_id)
            .filter(|r| !r.is_deleted())
            .ok_or_else(|| StoreError::NotFound(format!("unknown runner {runner_id}")))?;
        if runner.active_tasks > 0 {
            return Err(StoreError::Conflict(format!(
                "runner has {} active tasks",
                runner.active_tasks
            )));
        }
        self.commit(
            &mut inner,
            vec![Event::RunnerDeleted { runner_id: runner_id.clone(), at: now }],
        )
    }

    pub fn set_screen_settings(
        &self,
        runner_id: &RunnerId,
        settings: ScreenSettings,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.state.runners.get(runner_id).map(|r| !r.is_deleted()).unwrap_or(false) {
            return Err(StoreError::NotFound(format!("unknown runner {runner_id}")));
        }
        self.commit(
            &mut inner,
            vec![Event::RunnerScreenSettingsChanged { runner_id: runner_id.clone(), settings }],
        )
    }

    // ------------------------------------------------------------------
    // Files, artifacts, users
    // ------------------------------------------------------------------

    pub fn add_file(&self, file: FileMeta) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        self.commit(&mut inner, vec![Event::FileAdded { file }])
    }

    pub fn get_file(&self, file_id: &FileId) -> Result<FileMeta, StoreError> {
        let inner = self.inner.lock();
        inner
            .state
            .files
            .get(file_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("unknown file {file_id}")))
    }

    pub fn add_artifact(&self, artifact: Artifact) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.state.tasks.contains_key(&artifact.task_id) {
            return Err(StoreError::NotFound(format!("unknown task {}", artifact.task_id)));
        }
        self.commit(&mut inner, vec![Event::ArtifactAdded { artifact }])
    }

    pub fn task_artifacts(&self, task_id: &TaskId) -> Vec<Artifact> {
        let inner = self.inner.lock();
        let mut artifacts: Vec<Artifact> = inner
            .state
            .artifacts
            .values()
            .filter(|a| &a.task_id == task_id)
            .cloned()
            .collect();
        artifacts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        artifacts
    }

    pub fn user_by_name(&self, username: &str) -> Option<User> {
        let inner = self.inner.lock();
        inner.state.user_by_name(username).cloned()
    }

    pub fn get_user(&self, user_id: &UserId) -> Option<User> {
        let inner = self.inner.lock();
        inner.state.users.get(user_id).cloned()
    }

    /// Seed the default operator the first time the store comes up empty.
    pub fn seed_user_if_empty(&self, username: &str, password_hash: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.state.users.is_empty() {
            return Ok(());
        }
        let user = User {
            id: UserId::generate(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: self.clock.now_utc(),
        };
        self.commit(&mut inner, vec![Event::UserAdded { user }])
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
