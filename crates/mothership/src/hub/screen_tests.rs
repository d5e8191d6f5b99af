// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex;

fn demand_recorder() -> (StreamDemandFn, Arc<Mutex<Vec<(String, bool)>>>) {
    let calls: Arc<Mutex<Vec<(String, bool)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    let f: StreamDemandFn = Arc::new(move |id: &RunnerId, wanted: bool| {
        sink.lock().push((id.to_string(), wanted));
    });
    (f, calls)
}

#[tokio::test]
async fn first_viewer_starts_last_viewer_stops() {
    let hub = ScreenHub::new();
    let (demand, calls) = demand_recorder();
    hub.set_demand_callback(demand);
    let runner = RunnerId::new("runner-1");

    assert_eq!(hub.status(&runner), (false, 0));

    let _rx1 = hub.subscribe(&runner);
    assert_eq!(hub.status(&runner), (true, 1));

    // A second viewer does not re-fire the demand callback.
    let _rx2 = hub.subscribe(&runner);
    assert_eq!(hub.status(&runner), (true, 2));

    hub.unsubscribe(&runner);
    assert_eq!(hub.status(&runner), (true, 1));

    hub.unsubscribe(&runner);
    assert_eq!(hub.status(&runner), (false, 0));

    let recorded = calls.lock().clone();
    assert_eq!(
        recorded,
        vec![("runner-1".to_string(), true), ("runner-1".to_string(), false)]
    );
}

#[tokio::test]
async fn frames_fan_out_to_viewers() {
    let hub = ScreenHub::new();
    let runner = RunnerId::new("runner-1");
    let mut rx1 = hub.subscribe(&runner);
    let mut rx2 = hub.subscribe(&runner);

    hub.push_frame(&runner, vec![0xFF, 0xD8, 0xFF]);

    assert_eq!(*rx1.recv().await.unwrap(), vec![0xFF, 0xD8, 0xFF]);
    assert_eq!(*rx2.recv().await.unwrap(), vec![0xFF, 0xD8, 0xFF]);
}

#[tokio::test]
async fn lagging_viewer_skips_oldest_frames_in_order() {
    let hub = ScreenHub::new();
    let runner = RunnerId::new("runner-1");
    let mut rx = hub.subscribe(&runner);

    // Overfill the bounded frame channel.
    let depth = borg_core::consts::FRAME_CHANNEL_DEPTH;
    for i in 0..(depth + 5) {
        hub.push_frame(&runner, vec![i as u8]);
    }

    // The first receive reports the lag, then frames arrive in sender
    // order with the oldest discarded.
    let mut seen = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(frame) => seen.push(frame[0]),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    assert!(!seen.is_empty());
    assert!(seen.len() <= depth);
    // Delivered frames are never reordered.
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
    // The newest frame survived the skipping.
    assert_eq!(*seen.last().unwrap(), (depth + 4) as u8);
}

#[tokio::test]
async fn screens_cache_round_trip() {
    let hub = ScreenHub::new();
    let runner = RunnerId::new("runner-1");
    assert!(hub.screens(&runner).is_empty());

    hub.set_screens(
        &runner,
        vec![ScreenInfo {
            index: 0,
            name: "Built-in".to_string(),
            width: 2560,
            height: 1600,
            is_primary: true,
        }],
    );
    assert_eq!(hub.screens(&runner).len(), 1);
}
