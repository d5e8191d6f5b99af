// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session auth for dashboard endpoints.
//!
//! Login verifies a salted SHA-256 password hash and issues an opaque
//! session token held in memory. Issuance policy (expiry, JWT, SSO) is a
//! deployment concern; the core contract is just "dashboard endpoints
//! require a token bound to a user id".

use axum::http::HeaderMap;
use borg_core::UserId;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// In-memory token → user binding.
#[derive(Default)]
pub struct Sessions {
    tokens: RwLock<HashMap<String, UserId>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh opaque token for a user.
    pub fn issue(&self, user_id: UserId) -> String {
        let token = format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple());
        self.tokens.write().insert(token.clone(), user_id);
        token
    }

    /// Resolve a token back to its user.
    pub fn resolve(&self, token: &str) -> Option<UserId> {
        self.tokens.read().get(token).cloned()
    }

    pub fn revoke(&self, token: &str) {
        self.tokens.write().remove(token);
    }
}

/// Extract the bearer token from an Authorization header (or the legacy
/// `X-Session-Token` header).
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION) {
        let s = value.to_str().ok()?;
        return s.strip_prefix("Bearer ").or(Some(s)).filter(|t| !t.is_empty());
    }
    headers
        .get("x-session-token")
        .and_then(|v| v.to_str().ok())
        .filter(|t| !t.is_empty())
}

/// Hash a password with a fresh random salt: `salt$hex(sha256(salt‖password))`.
pub fn hash_password(password: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    format!("{salt}${}", digest(&salt, password))
}

/// Constant-shape verification against a stored `salt$digest` value.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, expected)) = stored.split_once('$') else {
        return false;
    };
    digest(salt, password) == expected
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
