// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn url_building_normalizes_trailing_slash() {
    let client = ApiClient::new("http://host:8080/").unwrap();
    assert_eq!(client.url("/runners/register"), "http://host:8080/api/v1/runners/register");
    assert_eq!(client.base_addr(), "http://host:8080");
}

#[test]
fn rejected_5xx_is_transient_4xx_is_not() {
    let server_side = ClientError::Rejected { status: 503, message: String::new() };
    assert!(server_side.is_transient());

    let client_side = ClientError::Rejected { status: 404, message: String::new() };
    assert!(!client_side.is_transient());
}

#[tokio::test]
async fn connect_errors_are_transient() {
    // Nothing listens on this port.
    let client = ApiClient::new("http://127.0.0.1:1").unwrap();
    let err = client.next_task("runner-x").await.unwrap_err();
    assert!(err.is_transient());
}
