// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! borgd — the borg mothership daemon.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use borg_mothership::{build_router, AppState, MothershipConfig};

#[derive(Debug, Parser)]
#[command(name = "borgd", about = "Borg mothership: distributed job coordinator")]
struct Args {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address (overrides config and BORG_LISTEN_ADDR).
    #[arg(long)]
    listen: Option<String>,

    /// Data directory (overrides config and BORG_DATA_DIR).
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = MothershipConfig::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    // Keep the appender guard alive for the process lifetime.
    let _log_guard = init_tracing(&config);

    tracing::info!(
        listen = %config.listen_addr,
        data_dir = %config.data_dir.display(),
        "mothership starting"
    );

    let state = AppState::init(&config)?;
    let cancel = CancellationToken::new();

    let dispatcher = tokio::spawn(borg_mothership::dispatch::run(state.clone(), cancel.clone()));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("cannot bind {}", config.listen_addr))?;
    let router = build_router(state.clone());

    let shutdown = cancel.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            wait_for_signal().await;
            shutdown.cancel();
        })
        .await
        .context("server error")?;

    cancel.cancel();
    let _ = dispatcher.await;

    state.store.save_snapshot().context("final snapshot failed")?;
    tracing::info!("mothership stopped");
    Ok(())
}

fn init_tracing(config: &MothershipConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if config.log_dir.as_os_str().is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&config.log_dir, "borgd.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}

async fn wait_for_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
