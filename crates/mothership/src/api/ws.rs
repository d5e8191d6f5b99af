// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket endpoints: dashboard feed, screen viewers/agents, and the
//! agent control channel.
//!
//! Every connection follows the same shape: one task owns the socket's
//! sink, draining a bounded queue; reads are handled in the same select
//! loop or a sibling task. Nothing else ever writes to the socket.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use borg_core::consts::{MAX_CONTROL_MESSAGE, MAX_FRAME_SIZE, PING_PERIOD, PONG_WAIT};
use borg_core::{RunnerId, TaskId};
use borg_wire::{kind, Envelope, HeartbeatRequest, LogChunk, StatusUpdateRequest};
use futures_util::{SinkExt, StreamExt};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::server::AppState;

/// `GET /ws` — dashboard subscriber.
pub async fn dashboard_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.max_message_size(MAX_CONTROL_MESSAGE)
        .on_upgrade(move |socket| handle_dashboard(socket, state))
}

async fn handle_dashboard(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (id, mut rx) = state.dashboard.register();

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(text) => {
                        if sink.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    // Hub dropped us (slow viewer or shutdown).
                    None => break,
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    // Dashboard viewers only listen.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.dashboard.unregister(id);
    let _ = sink.close().await;
}

/// `GET /ws/screen/:runner_id` — viewer receiving binary JPEG frames.
pub async fn screen_viewer_ws(
    ws: WebSocketUpgrade,
    Path(runner_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.max_message_size(MAX_FRAME_SIZE)
        .on_upgrade(move |socket| handle_screen_viewer(socket, RunnerId::new(runner_id), state))
}

async fn handle_screen_viewer(socket: WebSocket, runner_id: RunnerId, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let mut frames = state.screens.subscribe(&runner_id);
    info!(%runner_id, "screen viewer connected");

    loop {
        tokio::select! {
            frame = frames.recv() => {
                match frame {
                    Ok(frame) => {
                        if sink.send(Message::Binary(frame.as_ref().clone())).await.is_err() {
                            break;
                        }
                    }
                    // Lagging viewers skip the oldest frames and continue.
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        debug!(%runner_id, skipped = n, "screen viewer lagging");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.screens.unsubscribe(&runner_id);
    let _ = sink.close().await;
    info!(%runner_id, "screen viewer disconnected");
}

/// `GET /ws/screen/agent/:runner_id` — agent pushing binary JPEG frames.
pub async fn screen_agent_ws(
    ws: WebSocketUpgrade,
    Path(runner_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.max_message_size(MAX_FRAME_SIZE)
        .on_upgrade(move |socket| handle_screen_agent(socket, RunnerId::new(runner_id), state))
}

async fn handle_screen_agent(mut socket: WebSocket, runner_id: RunnerId, state: AppState) {
    info!(%runner_id, "screen agent connected");
    while let Some(message) = socket.recv().await {
        match message {
            Ok(Message::Binary(frame)) => {
                state.screens.push_frame(&runner_id, frame);
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
    info!(%runner_id, "screen agent disconnected");
}

/// `GET /ws/agent/:runner_id` — bidirectional control channel.
pub async fn agent_ws(
    ws: WebSocketUpgrade,
    Path(runner_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.max_message_size(MAX_CONTROL_MESSAGE)
        .on_upgrade(move |socket| handle_agent(socket, RunnerId::new(runner_id), state))
}

async fn handle_agent(socket: WebSocket, runner_id: RunnerId, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (epoch, mut outbound) = state.agents.attach(&runner_id);
    info!(%runner_id, "agent control channel connected");

    let mut ping_timer = tokio::time::interval(PING_PERIOD);
    ping_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it so the pong deadline
    // starts from connection time.
    ping_timer.tick().await;
    let mut last_pong = Instant::now();

    loop {
        tokio::select! {
            env = outbound.recv() => {
                match env {
                    Some(env) => {
                        let Ok(text) = env.encode() else { continue };
                        if sink.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = ping_timer.tick() => {
                if last_pong.elapsed() > PONG_WAIT {
                    warn!(%runner_id, "agent missed pong, closing");
                    break;
                }
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        handle_agent_message(&state, &runner_id, &text);
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(%runner_id, %e, "agent read error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.agents.detach(&runner_id, epoch);
    let _ = sink.close().await;
    info!(%runner_id, "agent control channel disconnected");
}

/// Dispatch one inbound agent envelope by message kind.
fn handle_agent_message(state: &AppState, runner_id: &RunnerId, text: &str) {
    let envelope = match Envelope::parse(text) {
        Ok(env) => env,
        Err(e) => {
            warn!(%runner_id, %e, "agent sent malformed envelope");
            return;
        }
    };

    match envelope.kind.as_str() {
        kind::HEARTBEAT => {
            let Ok(req) = envelope.decode::<HeartbeatRequest>(kind::HEARTBEAT) else {
                return;
            };
            let params = borg_storage::HeartbeatParams {
                status: super::runners::parse_runner_status(&req.status),
                active_tasks: req.active_tasks,
                resources: req.resources,
            };
            if let Err(e) = state.store.heartbeat(runner_id, params) {
                debug!(%runner_id, %e, "ws heartbeat rejected");
            }
        }
        kind::TASK_STATUS => {
            let Ok(req) = envelope.decode::<StatusUpdateRequest>(kind::TASK_STATUS) else {
                return;
            };
            if req.task_id.is_empty() {
                warn!(%runner_id, "task_status without task_id");
                return;
            }
            let task_id = TaskId::new(req.task_id.clone());
            if let Err(e) = super::tasks::apply_status_update(state, &task_id, req) {
                debug!(%runner_id, %task_id, %e, "ws status update rejected");
            }
        }
        kind::LOG_CHUNK => {
            let Ok(chunk) = envelope.decode::<LogChunk>(kind::LOG_CHUNK) else {
                return;
            };
            if let Err(e) = super::tasks::apply_log_chunk(state, chunk) {
                debug!(%runner_id, %e, "ws log chunk rejected");
            }
        }
        other => {
            debug!(%runner_id, kind = other, "ignoring unknown agent message");
        }
    }
}
