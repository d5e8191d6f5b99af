// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent hub: one control channel per connected runner.
//!
//! Application code enqueues envelopes here; the connection's single
//! writer task drains the bounded queue onto the socket. A reconnecting
//! runner replaces its previous channel, which closes the old writer.
//! Each attachment gets an epoch so a stale connection's cleanup can
//! never detach its replacement.

use borg_core::RunnerId;
use borg_wire::Envelope;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Depth of a per-runner control send queue.
const AGENT_SEND_DEPTH: usize = 64;

struct Conn {
    epoch: u64,
    tx: mpsc::Sender<Envelope>,
}

/// Connected agent control channels, keyed by runner id.
#[derive(Default)]
pub struct AgentHub {
    conns: RwLock<HashMap<RunnerId, Conn>>,
    next_epoch: AtomicU64,
}

impl AgentHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a runner's control connection, returning its epoch and the
    /// queue its writer task drains. An existing connection for the same
    /// runner is replaced (its queue closes, its writer exits).
    pub fn attach(&self, runner_id: &RunnerId) -> (u64, mpsc::Receiver<Envelope>) {
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(AGENT_SEND_DEPTH);
        if self.conns.write().insert(runner_id.clone(), Conn { epoch, tx }).is_some() {
            debug!(%runner_id, "agent: replacing existing connection");
        }
        (epoch, rx)
    }

    /// Detach the connection with this epoch; a stale epoch (already
    /// replaced by a reconnect) is a no-op. The send channel closes
    /// exactly once, here or in the replacing `attach`.
    pub fn detach(&self, runner_id: &RunnerId, epoch: u64) {
        let mut conns = self.conns.write();
        if conns.get(runner_id).map(|c| c.epoch) == Some(epoch) {
            conns.remove(runner_id);
        }
    }

    /// Drop a runner's connection regardless of epoch (runner deleted).
    pub fn disconnect(&self, runner_id: &RunnerId) {
        self.conns.write().remove(runner_id);
    }

    /// Queue an envelope for a runner. Returns false when the runner is
    /// not connected or its queue is full.
    pub fn send(&self, runner_id: &RunnerId, envelope: Envelope) -> bool {
        let conns = self.conns.read();
        match conns.get(runner_id) {
            Some(conn) => match conn.tx.try_send(envelope) {
                Ok(()) => true,
                Err(e) => {
                    warn!(%runner_id, %e, "agent: control send failed");
                    false
                }
            },
            None => false,
        }
    }

    pub fn is_connected(&self, runner_id: &RunnerId) -> bool {
        self.conns.read().contains_key(runner_id)
    }

    /// Runners with a live control channel right now.
    pub fn connected(&self) -> Vec<RunnerId> {
        self.conns.read().keys().cloned().collect()
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
