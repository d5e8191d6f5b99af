// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared application state and the axum router.

use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;
use borg_core::SystemClock;
use borg_storage::{BlobStore, Store};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::Sessions;
use crate::hub::{AgentHub, DashboardHub, ScreenHub};
use crate::{api, MothershipConfig};

/// Everything a request handler can reach.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store<SystemClock>>,
    pub blobs: BlobStore,
    pub sessions: Arc<Sessions>,
    pub dashboard: DashboardHub,
    pub screens: Arc<ScreenHub>,
    pub agents: Arc<AgentHub>,
}

impl AppState {
    /// Open the store, seed the default operator, and wire the hubs.
    pub fn init(config: &MothershipConfig) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let store = Arc::new(Store::open(&config.data_dir, SystemClock)?);
        store.seed_user_if_empty(
            &config.admin_username,
            &crate::auth::hash_password(&config.admin_password),
        )?;

        let screens = Arc::new(ScreenHub::new());
        // Demand transitions are observable via /screen/status polling; the
        // callback is the hook for eager push transports.
        screens.set_demand_callback(Arc::new(|runner_id, wanted| {
            tracing::info!(%runner_id, wanted, "screen stream demand changed");
        }));

        Ok(Self {
            store,
            blobs: BlobStore::new(&config.data_dir),
            sessions: Arc::new(Sessions::new()),
            dashboard: DashboardHub::spawn(),
            screens,
            agents: Arc::new(AgentHub::new()),
        })
    }
}

/// The full HTTP + WebSocket surface.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        // Operator session endpoints
        .route("/auth/login", post(api::auth::login))
        .route("/auth/me", get(api::auth::me))
        .route("/stats", get(api::stats::stats))
        .route("/jobs", get(api::jobs::list).post(api::jobs::create))
        .route("/jobs/:id", get(api::jobs::get))
        .route("/jobs/:id/pause", post(api::jobs::pause))
        .route("/jobs/:id/resume", post(api::jobs::resume))
        .route("/jobs/:id/cancel", post(api::jobs::cancel))
        .route("/runners", get(api::runners::list))
        .route("/runners/:id", get(api::runners::get).delete(api::runners::remove))
        .route("/runners/:id/rename", patch(api::runners::rename))
        .route("/runners/:id/screen-settings", patch(api::runners::screen_settings))
        .route("/tasks/:id/logs", get(api::tasks::logs))
        .route("/runners/:id/screens", get(api::runners::screens).post(api::runners::set_screens))
        .route("/runners/:id/screenshots", get(api::runners::screenshots))
        // Runner-facing endpoints
        .route("/runners/register", post(api::runners::register))
        .route("/runners/:id/heartbeat", post(api::runners::heartbeat))
        .route("/runners/:id/tasks/next", get(api::runners::next_task))
        .route("/tasks/:id/status", post(api::tasks::status))
        .route("/tasks/:id/result", post(api::tasks::result))
        .route("/files/:id/download", get(api::files::download))
        .route("/files/upload", post(api::files::upload_file))
        .route("/artifacts/upload", post(api::files::upload_artifact))
        .route("/runners/:id/screen/frame", post(api::runners::screen_frame))
        .route("/runners/:id/screen/status", get(api::runners::screen_status));

    Router::new()
        .nest("/api/v1", api)
        .route("/healthz", get(api::stats::healthz))
        .route("/ws", get(api::ws::dashboard_ws))
        .route("/ws/screen/:runner_id", get(api::ws::screen_viewer_ws))
        .route("/ws/screen/agent/:runner_id", get(api::ws::screen_agent_ws))
        .route("/ws/agent/:runner_id", get(api::ws::agent_ws))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
