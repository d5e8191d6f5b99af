// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Screen capture behind a narrow backend interface.
//!
//! Platform capture backends are plug-in modules; the agent only needs
//! `{is_enabled, list_screens, start, stop}`. A host without a usable
//! backend (no capture API, missing Screen Recording permission on
//! macOS) reports disabled and the agent runs on without it.

mod monitor;
mod pipeline;

pub use monitor::run as run_monitor;
pub use pipeline::{process_frame, spawn_processor, spawn_rate_limited_sender};

use async_trait::async_trait;
use borg_wire::ScreenInfo;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Raw pixel layouts emitted by capture backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Everything except macOS.
    Rgba,
    /// macOS capture surface order.
    Bgra,
}

/// One uncompressed captured frame.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

/// Capture parameters as commanded by the mothership.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSettings {
    pub quality: u8,
    pub fps: f64,
    pub screen_index: u32,
}

/// Errors from capture backends.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("screen capture is not available on this host")]
    Unavailable,
    #[error("unknown screen index {0}")]
    UnknownScreen(u32),
    #[error("capture backend error: {0}")]
    Backend(String),
}

/// Platform capture backend.
///
/// `start` begins emitting raw frames into `sink` until `cancel` fires;
/// it returns once capture is running. Raw frames ride a bounded
/// broadcast channel, so a slow consumer loses the oldest frames first.
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    fn is_enabled(&self) -> bool;

    fn list_screens(&self) -> Vec<ScreenInfo>;

    async fn start(
        &self,
        settings: CaptureSettings,
        sink: broadcast::Sender<RawFrame>,
        cancel: CancellationToken,
    ) -> Result<(), CaptureError>;
}

/// Backend for hosts without screen capture (or without permission).
pub struct DisabledCapture;

#[async_trait]
impl ScreenCapture for DisabledCapture {
    fn is_enabled(&self) -> bool {
        false
    }

    fn list_screens(&self) -> Vec<ScreenInfo> {
        Vec::new()
    }

    async fn start(
        &self,
        _settings: CaptureSettings,
        _sink: broadcast::Sender<RawFrame>,
        _cancel: CancellationToken,
    ) -> Result<(), CaptureError> {
        Err(CaptureError::Unavailable)
    }
}

/// Pick the backend for this host.
///
/// Real capture backends (CoreGraphics, X11/Wayland portals, DXGI) plug
/// in here; absence of one disables screen monitoring without failing
/// agent startup.
pub fn platform_backend() -> std::sync::Arc<dyn ScreenCapture> {
    std::sync::Arc::new(DisabledCapture)
}

/// Synthetic backend for tests: emits solid-color RGBA frames at the
/// requested rate.
#[cfg(test)]
pub(crate) struct FakeCapture {
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
#[async_trait]
impl ScreenCapture for FakeCapture {
    fn is_enabled(&self) -> bool {
        true
    }

    fn list_screens(&self) -> Vec<ScreenInfo> {
        vec![ScreenInfo {
            index: 0,
            name: "fake".to_string(),
            width: self.width,
            height: self.height,
            is_primary: true,
        }]
    }

    async fn start(
        &self,
        settings: CaptureSettings,
        sink: broadcast::Sender<RawFrame>,
        cancel: CancellationToken,
    ) -> Result<(), CaptureError> {
        let width = self.width;
        let height = self.height;
        let period = std::time::Duration::from_secs_f64(1.0 / settings.fps.max(0.5));
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(period) => {}
                }
                let frame = RawFrame {
                    width,
                    height,
                    format: PixelFormat::Rgba,
                    data: vec![0x7F; (width * height * 4) as usize],
                };
                let _ = sink.send(frame);
            }
        });
        Ok(())
    }
}

#[cfg(test)]
#[path = "capture_tests.rs"]
mod tests;
