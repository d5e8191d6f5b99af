// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Demand monitor: poll the mothership's stream status and keep local
//! capture in sync.
//!
//! Every poll interval: start capture when a viewer appeared, stop when
//! the last one left, restart when the operator changed quality, FPS, or
//! the screen index mid-stream.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use borg_core::consts::SCREEN_STATUS_POLL_INTERVAL;
use borg_wire::{ScreenFramePost, ScreenStatus};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{pipeline, CaptureSettings, ScreenCapture};
use crate::client::ApiClient;
use crate::config::ScreenConfig;

/// Depth of the raw frame channel.
const RAW_CHANNEL_DEPTH: usize = 8;

struct Session {
    settings: CaptureSettings,
    cancel: CancellationToken,
}

impl Session {
    fn stop(self) {
        self.cancel.cancel();
    }
}

/// Run until shutdown. Hosts whose backend reports disabled idle here
/// without ever starting capture.
pub async fn run(
    client: ApiClient,
    runner_id: String,
    backend: Arc<dyn ScreenCapture>,
    config: ScreenConfig,
    shutdown: CancellationToken,
) {
    if !config.enabled || !backend.is_enabled() {
        info!("screen monitoring disabled on this host");
        return;
    }

    // Advertise the monitor list once at startup.
    let screens = backend.list_screens();
    if !screens.is_empty() {
        if let Err(e) = client.publish_screens(&runner_id, &screens).await {
            warn!(%e, "cannot publish screen list");
        }
    }

    let mut session: Option<Session> = None;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(SCREEN_STATUS_POLL_INTERVAL) => {}
        }

        let status = match client.screen_status(&runner_id).await {
            Ok(status) => status,
            Err(e) => {
                debug!(%e, "screen status poll failed");
                continue;
            }
        };

        let wanted = settings_from(&status);
        let active_settings = session.as_ref().map(|s| s.settings);

        if status.streaming {
            match active_settings {
                None => {
                    info!(?wanted, "starting screen capture");
                    session =
                        start_session(&client, &runner_id, &backend, &config, wanted, &shutdown)
                            .await;
                }
                Some(current) if current != wanted => {
                    info!(?wanted, "screen settings changed, restarting capture");
                    if let Some(active) = session.take() {
                        active.stop();
                    }
                    session =
                        start_session(&client, &runner_id, &backend, &config, wanted, &shutdown)
                            .await;
                }
                Some(_) => {}
            }
        } else if let Some(active) = session.take() {
            info!("no viewers left, stopping screen capture");
            active.stop();
        }
    }

    if let Some(active) = session.take() {
        active.stop();
    }
}

fn settings_from(status: &ScreenStatus) -> CaptureSettings {
    CaptureSettings {
        quality: status.quality,
        fps: status.fps,
        screen_index: status.screen_index,
    }
}

/// Wire up backend → processor → rate-limited sender for one session.
async fn start_session(
    client: &ApiClient,
    runner_id: &str,
    backend: &Arc<dyn ScreenCapture>,
    config: &ScreenConfig,
    settings: CaptureSettings,
    shutdown: &CancellationToken,
) -> Option<Session> {
    let cancel = shutdown.child_token();
    let (raw_tx, raw_rx) = broadcast::channel(RAW_CHANNEL_DEPTH);
    let (encoded_tx, encoded_rx) = pipeline::encoded_channel();

    if let Err(e) = backend.start(settings, raw_tx, cancel.clone()).await {
        warn!(%e, "capture start failed");
        return None;
    }

    pipeline::spawn_processor(
        raw_rx,
        encoded_tx,
        settings.quality,
        config.max_width,
        config.max_height,
        cancel.clone(),
    );

    spawn_frame_uplink(
        client.clone(),
        runner_id.to_string(),
        encoded_rx,
        settings.fps,
        cancel.clone(),
    );

    Some(Session { settings, cancel })
}

/// Push encoded frames upstream: binary WebSocket when it connects,
/// base64 HTTP POST fallback otherwise.
fn spawn_frame_uplink(
    client: ApiClient,
    runner_id: String,
    encoded_rx: mpsc::Receiver<Vec<u8>>,
    fps: f64,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let ws_url = frame_ws_url(client.base_addr(), &runner_id);
        let ws = match tokio_tungstenite::connect_async(&ws_url).await {
            Ok((stream, _)) => Some(stream),
            Err(e) => {
                debug!(%e, "frame channel unavailable, using HTTP fallback");
                None
            }
        };

        match ws {
            Some(stream) => {
                let (mut sink, mut read) = stream.split();
                let (frame_tx, mut frame_rx) = mpsc::channel::<Vec<u8>>(4);

                pipeline::spawn_rate_limited_sender(encoded_rx, fps, cancel.clone(), move |f| {
                    frame_tx.try_send(f).is_ok()
                });

                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            let _ = sink.close().await;
                            break;
                        }
                        frame = frame_rx.recv() => match frame {
                            Some(frame) => {
                                if sink.send(Message::binary(frame)).await.is_err() {
                                    break;
                                }
                            }
                            None => break,
                        },
                        msg = read.next() => {
                            if matches!(msg, None | Some(Err(_)) | Some(Ok(Message::Close(_)))) {
                                break;
                            }
                        }
                    }
                }
            }
            None => {
                let sender_cancel = cancel.clone();
                let (frame_tx, mut frame_rx) = mpsc::channel::<Vec<u8>>(4);
                pipeline::spawn_rate_limited_sender(encoded_rx, fps, sender_cancel, move |f| {
                    frame_tx.try_send(f).is_ok()
                });

                while let Some(frame) = frame_rx.recv().await {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let post = ScreenFramePost {
                        frame: B64.encode(&frame),
                        timestamp: Utc::now().timestamp(),
                    };
                    if let Err(e) = client.post_frame(&runner_id, &post).await {
                        debug!(%e, "frame post failed");
                    }
                }
            }
        }
    });
}

fn frame_ws_url(base: &str, runner_id: &str) -> String {
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        format!("ws://{base}")
    };
    format!("{ws_base}/ws/screen/agent/{runner_id}")
}
