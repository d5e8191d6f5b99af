// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    invalid = { ErrorKind::InvalidInput, 400 },
    unauthorized = { ErrorKind::Unauthorized, 401 },
    not_found = { ErrorKind::NotFound, 404 },
    conflict = { ErrorKind::Conflict, 409 },
    unavailable = { ErrorKind::Unavailable, 503 },
    timeout = { ErrorKind::Timeout, 504 },
)]
fn kind_maps_to_status(kind: ErrorKind, status: u16) {
    let err = ApiError::new(kind, "msg");
    assert_eq!(err.status().as_u16(), status);
}

#[test]
fn store_error_carries_kind() {
    let err: ApiError = StoreError::Conflict("busy".to_string()).into();
    assert_eq!(err.kind, ErrorKind::Conflict);
    assert_eq!(err.message, "busy");
}
