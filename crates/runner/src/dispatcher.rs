// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task dispatcher: a counting semaphore gates parallel task workers.
//!
//! Descriptors arrive on a bounded channel from the transport ladder.
//! Duplicate deliveries (poll + push retransmits) are ignored by task id.
//! Each in-flight task registers a cancellation token so server `cancel`
//! messages can reach it.

use borg_wire::TaskDescriptor;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::worker::{self, WorkerContext};

/// Cancellation tokens for in-flight tasks, keyed by task id.
#[derive(Default)]
pub struct CancelRegistry {
    inner: Mutex<HashMap<String, CancellationToken>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task; the returned token is also cancelled by shutdown.
    pub fn register(&self, task_id: &str, parent: &CancellationToken) -> CancellationToken {
        let token = parent.child_token();
        self.inner.lock().insert(task_id.to_string(), token.clone());
        token
    }

    pub fn complete(&self, task_id: &str) {
        self.inner.lock().remove(task_id);
    }

    /// Cancel one task if it is in flight.
    pub fn cancel(&self, task_id: &str) {
        if let Some(token) = self.inner.lock().get(task_id) {
            token.cancel();
        }
    }

    pub fn in_flight(&self) -> usize {
        self.inner.lock().len()
    }
}

/// Live counters advertised in heartbeats.
#[derive(Default)]
pub struct TaskCounters {
    active: AtomicI32,
    started: AtomicU64,
}

impl TaskCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> i32 {
        self.active.load(Ordering::Relaxed)
    }

    /// Total workers ever started (also the per-task dir counter).
    pub fn started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    pub(crate) fn task_started(&self) -> u64 {
        self.active.fetch_add(1, Ordering::Relaxed);
        self.started.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn task_finished(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Pop descriptors and spawn workers while semaphore permits exist.
pub async fn run(
    ctx: Arc<WorkerContext>,
    mut task_rx: mpsc::Receiver<TaskDescriptor>,
    counters: Arc<TaskCounters>,
    cancels: Arc<CancelRegistry>,
    shutdown: CancellationToken,
) {
    let permits = ctx.max_concurrent_tasks.max(1) as usize;
    let semaphore = Arc::new(Semaphore::new(permits));
    let mut seen: HashSet<String> = HashSet::new();

    loop {
        let descriptor = tokio::select! {
            _ = shutdown.cancelled() => break,
            descriptor = task_rx.recv() => match descriptor {
                Some(d) => d,
                None => break,
            },
        };

        // Idempotent delivery: retransmits of a known task are dropped.
        if !seen.insert(descriptor.task_id.clone()) {
            debug!(task_id = %descriptor.task_id, "duplicate descriptor ignored");
            continue;
        }

        let permit = tokio::select! {
            _ = shutdown.cancelled() => break,
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => break,
            },
        };

        let counter = counters.task_started();
        let token = cancels.register(&descriptor.task_id, &shutdown);
        let ctx = Arc::clone(&ctx);
        let counters = Arc::clone(&counters);
        let cancels = Arc::clone(&cancels);

        info!(task_id = %descriptor.task_id, "task worker starting");
        tokio::spawn(async move {
            let task_id = descriptor.task_id.clone();
            if let Err(e) = worker::run_task(&ctx, descriptor, counter, token).await {
                warn!(%task_id, %e, "task worker failed");
            }
            cancels.complete(&task_id);
            counters.task_finished();
            drop(permit);
        });
    }

    info!("dispatcher stopped");
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
