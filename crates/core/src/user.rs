// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator principal.

use crate::id::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An operator with dashboard access.
///
/// The password hash is salted SHA-256; hashing policy beyond that is a
/// deployment concern. API responses use the wire `UserInfo` shape, which
/// never carries the hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}
