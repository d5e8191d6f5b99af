// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use borg_wire::kind;

#[tokio::test]
async fn send_reaches_attached_runner() {
    let hub = AgentHub::new();
    let runner = RunnerId::new("runner-1");
    let (_epoch, mut rx) = hub.attach(&runner);

    assert!(hub.is_connected(&runner));
    assert!(hub.send(&runner, Envelope::bare(kind::PONG)));

    let env = rx.recv().await.unwrap();
    assert_eq!(env.kind, "pong");
}

#[tokio::test]
async fn send_to_unconnected_runner_is_false() {
    let hub = AgentHub::new();
    assert!(!hub.send(&RunnerId::new("ghost"), Envelope::bare(kind::PONG)));
}

#[tokio::test]
async fn detach_closes_the_channel_once() {
    let hub = AgentHub::new();
    let runner = RunnerId::new("runner-1");
    let (epoch, mut rx) = hub.attach(&runner);

    hub.detach(&runner, epoch);

    assert!(!hub.is_connected(&runner));
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn reattach_replaces_previous_connection() {
    let hub = AgentHub::new();
    let runner = RunnerId::new("runner-1");
    let (_old_epoch, mut old_rx) = hub.attach(&runner);
    let (_new_epoch, mut new_rx) = hub.attach(&runner);

    // The old writer's queue closed when it was replaced.
    assert!(old_rx.recv().await.is_none());

    assert!(hub.send(&runner, Envelope::bare(kind::CANCEL)));
    assert_eq!(new_rx.recv().await.unwrap().kind, "cancel");
    assert_eq!(hub.connected(), vec![runner]);
}

#[tokio::test]
async fn stale_detach_cannot_remove_replacement() {
    let hub = AgentHub::new();
    let runner = RunnerId::new("runner-1");
    let (old_epoch, _old_rx) = hub.attach(&runner);
    let (_new_epoch, mut new_rx) = hub.attach(&runner);

    // The replaced connection's cleanup races in after the reconnect.
    hub.detach(&runner, old_epoch);

    assert!(hub.is_connected(&runner));
    assert!(hub.send(&runner, Envelope::bare(kind::PONG)));
    assert_eq!(new_rx.recv().await.unwrap().kind, "pong");
}

#[tokio::test]
async fn disconnect_removes_any_epoch() {
    let hub = AgentHub::new();
    let runner = RunnerId::new("runner-1");
    let (_epoch, mut rx) = hub.attach(&runner);

    hub.disconnect(&runner);
    assert!(!hub.is_connected(&runner));
    assert!(rx.recv().await.is_none());
}
