// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dashboard hub: broadcast already-encoded JSON to every connected viewer.
//!
//! A serial run loop drains register/unregister/broadcast commands, so the
//! client map is touched by exactly one task. Each viewer has a bounded
//! send queue; a viewer that cannot keep up is dropped and its socket
//! closes when the queue's sender side goes away.

use borg_core::consts::DASHBOARD_SEND_DEPTH;
use borg_wire::Envelope;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

enum Command {
    Register { id: u64, tx: mpsc::Sender<String> },
    Unregister { id: u64 },
    Broadcast { message: String },
}

/// Handle to the dashboard fan-out loop.
#[derive(Clone)]
pub struct DashboardHub {
    cmd_tx: mpsc::UnboundedSender<Command>,
    next_id: Arc<AtomicU64>,
}

impl DashboardHub {
    /// Spawn the run loop and return the shared handle.
    pub fn spawn() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(run(cmd_rx));
        Self { cmd_tx, next_id: Arc::new(AtomicU64::new(1)) }
    }

    /// Register a viewer; returns its id and the receive side of its
    /// bounded send queue.
    pub fn register(&self) -> (u64, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(DASHBOARD_SEND_DEPTH);
        let _ = self.cmd_tx.send(Command::Register { id, tx });
        (id, rx)
    }

    /// Drop a viewer. The send channel closes here and nowhere else.
    pub fn unregister(&self, id: u64) {
        let _ = self.cmd_tx.send(Command::Unregister { id });
    }

    /// Queue an already-encoded message to every viewer.
    pub fn broadcast(&self, message: String) {
        let _ = self.cmd_tx.send(Command::Broadcast { message });
    }

    /// Encode and broadcast a `{type, data}` envelope.
    pub fn broadcast_event<T: serde::Serialize>(&self, kind: &str, data: &T) {
        match Envelope::new(kind, data).and_then(|env| env.encode()) {
            Ok(text) => self.broadcast(text),
            Err(e) => warn!(%e, kind, "dashboard: dropping unencodable broadcast"),
        }
    }
}

async fn run(mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
    let mut clients: HashMap<u64, mpsc::Sender<String>> = HashMap::new();

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            Command::Register { id, tx } => {
                debug!(id, viewers = clients.len() + 1, "dashboard: viewer connected");
                clients.insert(id, tx);
            }
            Command::Unregister { id } => {
                if clients.remove(&id).is_some() {
                    debug!(id, viewers = clients.len(), "dashboard: viewer disconnected");
                }
            }
            Command::Broadcast { message } => {
                clients.retain(|id, tx| match tx.try_send(message.clone()) {
                    Ok(()) => true,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!(id, "dashboard: dropping slow viewer");
                        false
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => false,
                });
            }
        }
    }
}

#[cfg(test)]
#[path = "dashboard_tests.rs"]
mod tests;
