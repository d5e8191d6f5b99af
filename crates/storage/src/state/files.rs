// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File, artifact, and user event handlers.

use borg_core::Event;

use super::MaterializedState;

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::FileAdded { file } => {
            if !state.files.contains_key(&file.id) {
                state.files.insert(file.id.clone(), file.clone());
            }
        }

        Event::ArtifactAdded { artifact } => {
            if !state.artifacts.contains_key(&artifact.id) {
                state.artifacts.insert(artifact.id.clone(), artifact.clone());
            }
        }

        Event::UserAdded { user } => {
            if !state.users.contains_key(&user.id) {
                state.users.insert(user.id.clone(), user.clone());
            }
        }

        _ => {}
    }
}
