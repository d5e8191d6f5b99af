// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real-time fan-out hubs.
//!
//! Three independent single-writer-multi-reader structures. The one
//! non-negotiable rule they share: every socket has exactly one writer
//! task, fed by a bounded send channel, and that channel is closed exactly
//! once — in the unregister path.

mod agent;
mod dashboard;
mod screen;

pub use agent::AgentHub;
pub use dashboard::DashboardHub;
pub use screen::{ScreenHub, StreamDemandFn};
