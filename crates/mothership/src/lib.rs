// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Borg mothership: the central coordinator service.
//!
//! An axum HTTP/WebSocket front end over the WAL-backed store, plus three
//! in-memory fan-out hubs (dashboard, screen streams, agent control).

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod api;
pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod hub;
pub mod server;

pub use config::MothershipConfig;
pub use error::ApiError;
pub use server::{build_router, AppState};
