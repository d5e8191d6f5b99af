// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tunable protocol constants, in one place.

use std::time::Duration;

/// A runner whose last heartbeat is older than this is reported offline.
pub const OFFLINE_THRESHOLD: Duration = Duration::from_secs(120);

/// Default heartbeat period recommended to runners.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// A fresh resource snapshot rides along every Nth heartbeat.
pub const RESOURCE_BEAT_CADENCE: u32 = 10;

/// HTTP fallback: period between "next task" polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Delay before a runner re-attempts a dropped WebSocket connection.
pub const WS_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// While polling, how long to wait before re-probing the WebSocket upgrade.
pub const WS_REPROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Server closes an agent connection that misses a pong for this long.
pub const PONG_WAIT: Duration = Duration::from_secs(60);

/// Server ping period: 9/10 of the pong wait.
pub const PING_PERIOD: Duration = Duration::from_secs(54);

/// Per-RPC client timeout for outbound HTTP calls.
pub const HTTP_CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Grace period for active tasks during runner shutdown.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Screen-status poll period on the runner.
pub const SCREEN_STATUS_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Depth of a dashboard client's send queue.
pub const DASHBOARD_SEND_DEPTH: usize = 256;

/// Depth of a per-runner screen frame channel.
pub const FRAME_CHANNEL_DEPTH: usize = 10;

/// Maximum dashboard / agent control message size.
pub const MAX_CONTROL_MESSAGE: usize = 512 * 1024;

/// Maximum screen frame size.
pub const MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;
