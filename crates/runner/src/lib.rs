// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Borg runner (solder): the per-host worker agent.
//!
//! Derives a stable device identity, advertises resources, pulls or is
//! pushed tasks from the mothership, executes them through the
//! multi-runtime executor, and streams status, logs, artifacts, and
//! (on demand) screen frames back.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod client;
pub mod config;
pub mod device_id;
pub mod dispatcher;
pub mod executor;
pub mod heartbeat;
pub mod resources;
pub mod screen;
pub mod transport;
pub mod worker;

pub use client::{ApiClient, ClientError};
pub use config::RunnerConfig;
