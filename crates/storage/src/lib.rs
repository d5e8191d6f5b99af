// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transactional store and blob storage for the mothership.
//!
//! State is event-sourced: every mutation is a [`borg_core::Event`]
//! appended to the WAL and applied to an in-memory [`MaterializedState`].
//! Recovery loads the newest snapshot and replays WAL entries after its
//! sequence number. The [`Store`] facade serialises all mutations behind
//! one lock, which is what makes `next_task` hand each task to exactly
//! one runner.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod blob;
mod snapshot;
pub mod state;
mod store;
mod wal;

pub use blob::{BlobError, BlobStore, SavedBlob, ScreenshotEntry};
pub use snapshot::{Snapshot, SnapshotError};
pub use state::MaterializedState;
pub use store::{
    HeartbeatParams, RegisterParams, Stats, Store, StoreError, TaskAssignment,
    UpdateStatusParams,
};
pub use wal::{Wal, WalEntry, WalError};
