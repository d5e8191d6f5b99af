// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tokio::sync::mpsc;

#[tokio::test]
async fn disabled_backend_reports_unavailable() {
    let backend = DisabledCapture;
    assert!(!backend.is_enabled());
    assert!(backend.list_screens().is_empty());

    let (sink, _rx) = broadcast::channel(4);
    let settings = CaptureSettings { quality: 60, fps: 2.0, screen_index: 0 };
    assert!(matches!(
        backend.start(settings, sink, CancellationToken::new()).await,
        Err(CaptureError::Unavailable)
    ));
}

#[tokio::test]
async fn capture_to_jpeg_end_to_end() {
    // Fake backend → processor → encoded channel, the full pipeline shape
    // the monitor wires for a real session.
    let backend = FakeCapture { width: 64, height: 48 };
    assert!(backend.is_enabled());
    assert_eq!(backend.list_screens().len(), 1);

    let cancel = CancellationToken::new();
    let (raw_tx, raw_rx) = broadcast::channel(8);
    let (encoded_tx, mut encoded_rx) = mpsc::channel(4);

    let settings = CaptureSettings { quality: 70, fps: 10.0, screen_index: 0 };
    backend.start(settings, raw_tx, cancel.clone()).await.unwrap();
    spawn_processor(raw_rx, encoded_tx, settings.quality, 1280, 800, cancel.clone());

    let jpeg = tokio::time::timeout(std::time::Duration::from_secs(5), encoded_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(jpeg.starts_with(&[0xFF, 0xD8]));

    cancel.cancel();
}
