// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frame processing pipeline: convert → resize → JPEG → rate-limited send.
//!
//! Raw frames arrive on a bounded broadcast channel (oldest dropped when
//! the processor lags); encoded frames ride a bounded mpsc channel that
//! drops on full; the sender enforces a minimum spacing of 1/FPS between
//! transmitted frames. Frames may be dropped anywhere, but delivered
//! frames keep sender order.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ImageBuffer, Rgba};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{PixelFormat, RawFrame};

/// Depth of the encoded-frame channel.
const ENCODED_CHANNEL_DEPTH: usize = 4;

/// Convert, resize to fit, and JPEG-encode one frame.
pub fn process_frame(
    frame: &RawFrame,
    quality: u8,
    max_width: u32,
    max_height: u32,
) -> Option<Vec<u8>> {
    let expected = (frame.width as usize) * (frame.height as usize) * 4;
    if frame.data.len() < expected || frame.width == 0 || frame.height == 0 {
        return None;
    }

    // Normalize to RGBA.
    let mut rgba = frame.data[..expected].to_vec();
    if frame.format == PixelFormat::Bgra {
        for px in rgba.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
    }

    let mut img: ImageBuffer<Rgba<u8>, Vec<u8>> =
        ImageBuffer::from_raw(frame.width, frame.height, rgba)?;

    // Fit inside max bounds, preserving aspect ratio, bilinear.
    if frame.width > max_width || frame.height > max_height {
        let scale = f64::min(
            max_width as f64 / frame.width as f64,
            max_height as f64 / frame.height as f64,
        );
        let w = ((frame.width as f64 * scale) as u32).max(1);
        let h = ((frame.height as f64 * scale) as u32).max(1);
        img = image::imageops::resize(&img, w, h, FilterType::Triangle);
    }

    let rgb = image::DynamicImage::ImageRgba8(img).to_rgb8();
    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100));
    match encoder.encode_image(&rgb) {
        Ok(()) => Some(jpeg),
        Err(e) => {
            warn!(%e, "jpeg encode failed");
            None
        }
    }
}

/// Processing worker: raw frames in, JPEG out.
pub fn spawn_processor(
    mut raw_rx: broadcast::Receiver<RawFrame>,
    encoded_tx: mpsc::Sender<Vec<u8>>,
    quality: u8,
    max_width: u32,
    max_height: u32,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => break,
                frame = raw_rx.recv() => match frame {
                    Ok(frame) => frame,
                    // Lagging is expected: skip the oldest frames.
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!(skipped = n, "processor lagging, frames skipped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };
            if let Some(jpeg) = process_frame(&frame, quality, max_width, max_height) {
                // Encoded channel drops on full to stay real-time.
                let _ = encoded_tx.try_send(jpeg);
            }
        }
    })
}

/// Rate-limited sender: invokes `send` at most once per 1/FPS.
pub fn spawn_rate_limited_sender<F>(
    mut encoded_rx: mpsc::Receiver<Vec<u8>>,
    fps: f64,
    cancel: CancellationToken,
    mut send: F,
) -> tokio::task::JoinHandle<()>
where
    F: FnMut(Vec<u8>) -> bool + Send + 'static,
{
    let min_spacing = Duration::from_secs_f64(1.0 / fps.clamp(0.5, 10.0));
    tokio::spawn(async move {
        let mut last_sent: Option<Instant> = None;
        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => break,
                frame = encoded_rx.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };
            if let Some(last) = last_sent {
                if last.elapsed() < min_spacing {
                    // Too soon; drop this frame to hold the rate.
                    continue;
                }
            }
            if !send(frame) {
                break;
            }
            last_sent = Some(Instant::now());
        }
    })
}

/// Bounded encoded-frame channel.
pub(crate) fn encoded_channel() -> (mpsc::Sender<Vec<u8>>, mpsc::Receiver<Vec<u8>>) {
    mpsc::channel(ENCODED_CHANNEL_DEPTH)
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
