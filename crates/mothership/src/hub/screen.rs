// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Screen-stream hub: fan JPEG frames from one agent out to N viewers.
//!
//! Streaming is demand-driven: the first viewer for a runner flips
//! `streaming` on and fires the demand callback; the last departure flips
//! it off. Frames ride a bounded broadcast channel per runner — a lagging
//! viewer loses the oldest frames, never the ordering of the ones it gets.

use borg_core::consts::FRAME_CHANNEL_DEPTH;
use borg_core::RunnerId;
use borg_wire::ScreenInfo;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Invoked with `(runner_id, wanted)` on 0→1 and 1→0 viewer transitions.
pub type StreamDemandFn = Arc<dyn Fn(&RunnerId, bool) + Send + Sync>;

struct RunnerStream {
    frames: broadcast::Sender<Arc<Vec<u8>>>,
    viewers: usize,
    streaming: bool,
}

impl Default for RunnerStream {
    fn default() -> Self {
        let (frames, _) = broadcast::channel(FRAME_CHANNEL_DEPTH);
        Self { frames, viewers: 0, streaming: false }
    }
}

/// Per-runner frame fan-out, keyed by runner id.
#[derive(Default)]
pub struct ScreenHub {
    streams: RwLock<HashMap<RunnerId, RunnerStream>>,
    screens: RwLock<HashMap<RunnerId, Vec<ScreenInfo>>>,
    on_demand: RwLock<Option<StreamDemandFn>>,
}

impl ScreenHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the demand callback ("start/stop streaming on runner X").
    pub fn set_demand_callback(&self, f: StreamDemandFn) {
        *self.on_demand.write() = Some(f);
    }

    /// Attach a viewer. A 0→1 transition marks the runner streaming and
    /// fires the demand callback.
    pub fn subscribe(&self, runner_id: &RunnerId) -> broadcast::Receiver<Arc<Vec<u8>>> {
        let rx = {
            let mut streams = self.streams.write();
            let entry = streams.entry(runner_id.clone()).or_default();
            entry.viewers += 1;
            let first = entry.viewers == 1;
            if first {
                entry.streaming = true;
            }
            let rx = entry.frames.subscribe();
            if first {
                info!(%runner_id, "screen: first viewer, requesting stream start");
                drop(streams);
                self.fire_demand(runner_id, true);
            }
            rx
        };
        rx
    }

    /// Detach a viewer. A 1→0 transition stops streaming and fires the
    /// demand callback.
    pub fn unsubscribe(&self, runner_id: &RunnerId) {
        let last = {
            let mut streams = self.streams.write();
            match streams.get_mut(runner_id) {
                Some(entry) => {
                    entry.viewers = entry.viewers.saturating_sub(1);
                    let last = entry.viewers == 0;
                    if last {
                        entry.streaming = false;
                    }
                    last
                }
                None => false,
            }
        };
        if last {
            info!(%runner_id, "screen: last viewer left, requesting stream stop");
            self.fire_demand(runner_id, false);
        }
    }

    fn fire_demand(&self, runner_id: &RunnerId, wanted: bool) {
        if let Some(f) = self.on_demand.read().as_ref() {
            f(runner_id, wanted);
        }
    }

    /// Fan a frame out to the runner's viewers. Frames for runners with no
    /// viewers are dropped on the floor.
    pub fn push_frame(&self, runner_id: &RunnerId, frame: Vec<u8>) {
        let streams = self.streams.read();
        if let Some(entry) = streams.get(runner_id) {
            // No receivers is fine; broadcast returns Err we don't care about.
            let _ = entry.frames.send(Arc::new(frame));
        } else {
            debug!(%runner_id, "screen: dropping frame with no viewers");
        }
    }

    /// (streaming, viewer_count) as seen right now.
    pub fn status(&self, runner_id: &RunnerId) -> (bool, usize) {
        let streams = self.streams.read();
        streams
            .get(runner_id)
            .map(|e| (e.streaming, e.viewers))
            .unwrap_or((false, 0))
    }

    /// Cache the monitor list an agent advertises.
    pub fn set_screens(&self, runner_id: &RunnerId, screens: Vec<ScreenInfo>) {
        self.screens.write().insert(runner_id.clone(), screens);
    }

    pub fn screens(&self, runner_id: &RunnerId) -> Vec<ScreenInfo> {
        self.screens.read().get(runner_id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "screen_tests.rs"]
mod tests;
