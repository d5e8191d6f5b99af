// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport ladder: WebSocket duplex preferred, HTTP polling fallback.
//!
//! The ladder is a state machine over {probing_ws, ws_connected, polling}.
//! Connect success enters ws_connected; a read error drops to polling
//! after the reconnect delay; a periodic re-probe timer climbs back.
//! Outbound traffic (heartbeats, status updates, log chunks) rides
//! whichever transport is up — both carry the same message semantics.

use borg_core::consts::{POLL_INTERVAL, WS_RECONNECT_DELAY, WS_REPROBE_INTERVAL};
use borg_wire::{kind, Envelope, HeartbeatRequest, LogChunk, StatusUpdateRequest, TaskDescriptor};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{ApiClient, ClientError};
use crate::dispatcher::CancelRegistry;

/// Ladder states, as logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    ProbingWs,
    WsConnected,
    Polling,
}

/// Shared outbound handle: picks the live transport per message.
pub struct Transport {
    client: ApiClient,
    runner_id: String,
    ws_tx: Mutex<Option<mpsc::Sender<Envelope>>>,
}

impl Transport {
    pub fn new(client: ApiClient, runner_id: String) -> Self {
        Self { client, runner_id, ws_tx: Mutex::new(None) }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn runner_id(&self) -> &str {
        &self.runner_id
    }

    fn ws_sender(&self) -> Option<mpsc::Sender<Envelope>> {
        self.ws_tx.lock().clone()
    }

    pub(crate) fn install_ws(&self, tx: mpsc::Sender<Envelope>) {
        *self.ws_tx.lock() = Some(tx);
    }

    pub(crate) fn clear_ws(&self) {
        *self.ws_tx.lock() = None;
    }

    /// True while the duplex channel is up.
    pub fn is_ws_connected(&self) -> bool {
        self.ws_tx.lock().is_some()
    }

    /// Send a heartbeat; returns the server-recommended interval when the
    /// HTTP path (which carries a response) was used.
    pub async fn send_heartbeat(
        &self,
        mut req: HeartbeatRequest,
    ) -> Result<Option<Duration>, ClientError> {
        if let Some(tx) = self.ws_sender() {
            req.runner_id = self.runner_id.clone();
            if let Ok(env) = Envelope::new(kind::HEARTBEAT, &req) {
                if tx.try_send(env).is_ok() {
                    return Ok(None);
                }
            }
            // Fall through to HTTP on a full or closed queue.
        }
        let resp = self.client.heartbeat(&self.runner_id, &req).await?;
        Ok(Some(Duration::from_secs(resp.next_heartbeat_interval.max(1))))
    }

    /// Send a task status update over the live transport.
    pub async fn send_status(
        &self,
        task_id: &str,
        mut req: StatusUpdateRequest,
    ) -> Result<(), ClientError> {
        if let Some(tx) = self.ws_sender() {
            req.task_id = task_id.to_string();
            if let Ok(env) = Envelope::new(kind::TASK_STATUS, &req) {
                if tx.try_send(env).is_ok() {
                    return Ok(());
                }
            }
        }
        self.client.update_status(task_id, &req).await?;
        Ok(())
    }

    /// Send a standalone log chunk. On the HTTP fallback this becomes a
    /// log-only status update (no status transition).
    pub async fn send_log(&self, chunk: LogChunk) -> Result<(), ClientError> {
        if let Some(tx) = self.ws_sender() {
            if let Ok(env) = Envelope::new(kind::LOG_CHUNK, &chunk) {
                if tx.try_send(env).is_ok() {
                    return Ok(());
                }
            }
        }
        let mut req = StatusUpdateRequest {
            timestamp: chunk.timestamp,
            ..StatusUpdateRequest::default()
        };
        if chunk.level == "stderr" {
            req.stderr = chunk.message.into_bytes();
        } else {
            req.stdout = chunk.message.into_bytes();
        }
        self.client.update_status(&chunk.task_id, &req).await?;
        Ok(())
    }
}

/// WebSocket URL for the agent control channel.
fn agent_ws_url(base: &str, runner_id: &str) -> String {
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        format!("ws://{base}")
    };
    format!("{ws_base}/ws/agent/{runner_id}")
}

/// Run the ladder until shutdown, feeding task descriptors into
/// `task_tx` and cancel requests into the registry.
pub async fn run(
    transport: Arc<Transport>,
    task_tx: mpsc::Sender<TaskDescriptor>,
    cancels: Arc<CancelRegistry>,
    shutdown: CancellationToken,
) {
    let mut mode = Mode::ProbingWs;
    let mut connected = None;

    loop {
        if shutdown.is_cancelled() {
            return;
        }
        match mode {
            Mode::ProbingWs => {
                let url = agent_ws_url(transport.client().base_addr(), transport.runner_id());
                match tokio_tungstenite::connect_async(&url).await {
                    Ok((stream, _)) => {
                        info!(%url, "agent channel connected");
                        connected = Some(stream);
                        mode = Mode::WsConnected;
                    }
                    Err(e) => {
                        debug!(%e, "websocket probe failed, falling back to polling");
                        mode = Mode::Polling;
                    }
                }
            }
            Mode::WsConnected => {
                let Some(stream) = connected.take() else {
                    mode = Mode::ProbingWs;
                    continue;
                };
                ws_session(&transport, stream, &task_tx, &cancels, &shutdown).await;
                transport.clear_ws();
                if shutdown.is_cancelled() {
                    return;
                }
                info!("agent channel lost, reconnecting after delay");
                if sleep_or_shutdown(WS_RECONNECT_DELAY, &shutdown).await {
                    return;
                }
                mode = Mode::Polling;
            }
            Mode::Polling => {
                let entered = Instant::now();
                loop {
                    if shutdown.is_cancelled() {
                        return;
                    }
                    match transport.client().next_task(transport.runner_id()).await {
                        Ok(Some(descriptor)) => {
                            debug!(task_id = %descriptor.task_id, "task received via poll");
                            if task_tx.send(descriptor).await.is_err() {
                                return;
                            }
                            // Keep draining while the queue has work.
                            continue;
                        }
                        // No task is the expected idle answer, not an error.
                        Ok(None) => {}
                        Err(e) if e.is_transient() => {
                            debug!(%e, "poll failed, will retry");
                        }
                        Err(e) => warn!(%e, "poll rejected"),
                    }
                    if sleep_or_shutdown(POLL_INTERVAL, &shutdown).await {
                        return;
                    }
                    if entered.elapsed() >= WS_REPROBE_INTERVAL {
                        break;
                    }
                }
                mode = Mode::ProbingWs;
            }
        }
    }
}

/// True when shutdown fired during the sleep.
async fn sleep_or_shutdown(period: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(period) => false,
        _ = shutdown.cancelled() => true,
    }
}

/// One connected WebSocket session; returns when the connection drops.
async fn ws_session<S>(
    transport: &Transport,
    stream: tokio_tungstenite::WebSocketStream<S>,
    task_tx: &mpsc::Sender<TaskDescriptor>,
    cancels: &CancelRegistry,
    shutdown: &CancellationToken,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut write, mut read) = stream.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Envelope>(64);
    transport.install_ws(out_tx);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = write.close().await;
                return;
            }
            outbound = out_rx.recv() => {
                let Some(env) = outbound else { return };
                let Ok(text) = env.encode() else { continue };
                if write.send(Message::text(text)).await.is_err() {
                    return;
                }
            }
            inbound = read.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        handle_server_message(&text, task_tx, cancels).await;
                    }
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Err(e)) => {
                        debug!(%e, "agent channel read error");
                        return;
                    }
                    // Pings are answered by the protocol layer.
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

/// Dispatch one server→runner envelope.
async fn handle_server_message(
    text: &str,
    task_tx: &mpsc::Sender<TaskDescriptor>,
    cancels: &CancelRegistry,
) {
    let Ok(env) = Envelope::parse(text) else {
        warn!("server sent malformed envelope");
        return;
    };
    match env.kind.as_str() {
        kind::TASK => match env.decode::<TaskDescriptor>(kind::TASK) {
            Ok(descriptor) => {
                debug!(task_id = %descriptor.task_id, "task received via push");
                let _ = task_tx.send(descriptor).await;
            }
            Err(e) => warn!(%e, "undecodable task push"),
        },
        kind::CANCEL => {
            if let Some(task_id) = env.data.get("task_id").and_then(|v| v.as_str()) {
                info!(task_id, "cancel requested by server");
                cancels.cancel(task_id);
            }
        }
        kind::PONG => {}
        other => debug!(kind = other, "ignoring unknown server message"),
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
