// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    http = { "http://host:8080", "ws://host:8080/ws/agent/r-1" },
    https = { "https://host", "wss://host/ws/agent/r-1" },
    bare = { "host:9000", "ws://host:9000/ws/agent/r-1" },
)]
fn agent_ws_url_scheme_mapping(base: &str, expected: &str) {
    assert_eq!(agent_ws_url(base, "r-1"), expected);
}

fn transport() -> Transport {
    let client = ApiClient::new("http://127.0.0.1:1").unwrap();
    Transport::new(client, "runner-1".to_string())
}

#[tokio::test]
async fn outbound_prefers_ws_when_installed() {
    let t = transport();
    let (tx, mut rx) = mpsc::channel(4);
    t.install_ws(tx);
    assert!(t.is_ws_connected());

    t.send_status("task-9", StatusUpdateRequest::default()).await.unwrap();

    let env = rx.recv().await.unwrap();
    assert_eq!(env.kind, kind::TASK_STATUS);
    // The task id moved into the body for the WS path.
    assert_eq!(env.data["task_id"], "task-9");
}

#[tokio::test]
async fn heartbeat_over_ws_returns_no_interval() {
    let t = transport();
    let (tx, mut rx) = mpsc::channel(4);
    t.install_ws(tx);

    let interval = t
        .send_heartbeat(HeartbeatRequest {
            status: "idle".to_string(),
            ..HeartbeatRequest::default()
        })
        .await
        .unwrap();

    assert!(interval.is_none());
    let env = rx.recv().await.unwrap();
    assert_eq!(env.kind, kind::HEARTBEAT);
    assert_eq!(env.data["runner_id"], "runner-1");
}

#[tokio::test]
async fn cleared_ws_falls_back_to_http() {
    let t = transport();
    let (tx, _rx) = mpsc::channel(4);
    t.install_ws(tx);
    t.clear_ws();
    assert!(!t.is_ws_connected());

    // Nothing listens on the HTTP side either, so the call errors — the
    // point is that it chose HTTP, not the dropped channel.
    let err = t
        .send_status("task-1", StatusUpdateRequest::default())
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn server_task_push_lands_in_task_channel() {
    let (task_tx, mut task_rx) = mpsc::channel(4);
    let cancels = CancelRegistry::new();

    let descriptor = TaskDescriptor {
        task_id: "t-1".to_string(),
        job_id: "j-1".to_string(),
        kind: "shell".to_string(),
        command: "echo hi".to_string(),
        ..TaskDescriptor::default()
    };
    let env = Envelope::new(kind::TASK, &descriptor).unwrap();
    handle_server_message(&env.encode().unwrap(), &task_tx, &cancels).await;

    assert_eq!(task_rx.recv().await.unwrap().task_id, "t-1");
}

#[tokio::test]
async fn server_cancel_fires_registered_token() {
    let (task_tx, _task_rx) = mpsc::channel(4);
    let cancels = CancelRegistry::new();
    let root = CancellationToken::new();
    let token = cancels.register("t-9", &root);

    let text = r#"{"type":"cancel","data":{"task_id":"t-9"}}"#;
    handle_server_message(text, &task_tx, &cancels).await;

    assert!(token.is_cancelled());
    assert!(!root.is_cancelled());
}

#[tokio::test]
async fn malformed_server_message_is_ignored() {
    let (task_tx, mut task_rx) = mpsc::channel(4);
    let cancels = CancelRegistry::new();
    handle_server_message("not json", &task_tx, &cancels).await;
    assert!(task_rx.try_recv().is_err());
}
