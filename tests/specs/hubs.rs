// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hub specs: demand-driven screen streaming and dashboard fan-out.

use borg_core::RunnerId;
use borg_mothership::hub::{DashboardHub, ScreenHub, StreamDemandFn};
use borg_wire::Envelope;
use parking_lot::Mutex;
use std::sync::Arc;

#[tokio::test]
async fn screen_stream_starts_and_stops_on_demand() {
    let hub = ScreenHub::new();
    let calls: Arc<Mutex<Vec<bool>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    let demand: StreamDemandFn = Arc::new(move |_id: &RunnerId, wanted| {
        sink.lock().push(wanted);
    });
    hub.set_demand_callback(demand);

    let runner = RunnerId::new("runner-s6");

    // No viewers: not streaming.
    assert_eq!(hub.status(&runner), (false, 0));

    // First viewer: streaming flips on and the start demand fires once.
    let mut rx = hub.subscribe(&runner);
    assert_eq!(hub.status(&runner), (true, 1));

    // Frames pushed by the agent reach the viewer unchanged.
    hub.push_frame(&runner, vec![0xFF, 0xD8, 0x00, 0x01]);
    assert_eq!(*rx.recv().await.unwrap(), vec![0xFF, 0xD8, 0x00, 0x01]);

    // Last viewer leaves: streaming stops.
    hub.unsubscribe(&runner);
    assert_eq!(hub.status(&runner), (false, 0));

    assert_eq!(calls.lock().clone(), vec![true, false]);
}

#[tokio::test]
async fn dashboard_broadcast_delivers_typed_envelopes() {
    let hub = DashboardHub::spawn();
    let (_id, mut rx) = hub.register();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    hub.broadcast_event("job_update", &serde_json::json!({"id": "job-1", "status": "running"}));

    let env = Envelope::parse(&rx.recv().await.unwrap()).unwrap();
    assert_eq!(env.kind, "job_update");
    assert_eq!(env.data["status"], "running");
}
