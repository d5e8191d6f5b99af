// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! solder — the borg runner agent.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use borg_core::consts::{SHUTDOWN_GRACE, WS_RECONNECT_DELAY};
use borg_runner::config::Overrides;
use borg_runner::dispatcher::{CancelRegistry, TaskCounters};
use borg_runner::executor::Executor;
use borg_runner::transport::Transport;
use borg_runner::worker::WorkerContext;
use borg_runner::{client::ApiClient, device_id, resources, screen, RunnerConfig};
use borg_wire::RegisterRequest;

/// Depth of the pending-descriptor channel between transport and
/// dispatcher.
const TASK_CHANNEL_DEPTH: usize = 16;

#[derive(Debug, Parser)]
#[command(name = "solder", about = "Borg runner: per-host worker agent")]
struct Args {
    /// Path to a YAML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Mothership address (overrides config and MOTHERSHIP_ADDR).
    #[arg(long)]
    mothership: Option<String>,

    /// Runner display name (overrides config and RUNNER_NAME).
    #[arg(long)]
    name: Option<String>,

    /// Registration token (overrides config and RUNNER_TOKEN).
    #[arg(long)]
    token: Option<String>,

    /// Work directory (overrides config and WORK_DIR).
    #[arg(long)]
    work_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = RunnerConfig::load(
        args.config.as_deref(),
        Overrides {
            mothership_addr: args.mothership,
            name: args.name,
            token: args.token,
            work_dir: args.work_dir,
        },
    )?;

    std::fs::create_dir_all(&config.work_dir)
        .with_context(|| format!("cannot create work dir {}", config.work_dir.display()))?;

    let hostname = hostname();
    let name = config.effective_name(&hostname);

    // Stable identity: cached hash of hardware identifiers.
    let device = device_id::load_or_derive(&config.work_dir, &device_id::platform_probes())
        .context("device id derivation failed")?;
    tracing::info!(device_id = %device, %name, "solder starting");

    let snapshot = resources::detect(&config.work_dir).await;
    let client = ApiClient::new(&config.mothership_addr)?;
    let backend = screen::platform_backend();

    let register = RegisterRequest {
        name: name.clone(),
        hostname,
        device_id: device.to_string(),
        os: std::env::consts::OS.to_string(),
        architecture: std::env::consts::ARCH.to_string(),
        max_concurrent_tasks: config.max_concurrent_tasks,
        labels: config.labels.clone(),
        token: config.token.clone(),
        cpu_cores: snapshot.cpu_cores,
        cpu_model: snapshot.cpu_model.clone(),
        cpu_frequency_mhz: snapshot.cpu_frequency_mhz,
        memory_gb: snapshot.memory_gb,
        disk_space_gb: snapshot.disk_space_gb,
        total_disk_space_gb: snapshot.total_disk_space_gb,
        os_version: snapshot.os_version.clone(),
        gpu_info: snapshot.gpu_info.clone(),
        public_ips: snapshot.public_ips.clone(),
        screen_monitoring_enabled: config.screen.enabled && backend.is_enabled(),
        runtimes: config.runtimes.clone(),
    };

    let runner_id = register_with_retry(&client, &register).await?;
    tracing::info!(%runner_id, "registered with mothership");

    let shutdown = CancellationToken::new();
    let transport = Arc::new(Transport::new(client.clone(), runner_id.clone()));
    let counters = Arc::new(TaskCounters::new());
    let cancels = Arc::new(CancelRegistry::new());
    let (task_tx, task_rx) = mpsc::channel(TASK_CHANNEL_DEPTH);

    let worker_ctx = Arc::new(WorkerContext {
        transport: Arc::clone(&transport),
        executor: Executor::new(config.runtimes.clone(), &config.work_dir),
        work_dir: config.work_dir.clone(),
        max_concurrent_tasks: config.max_concurrent_tasks,
    });

    let mut units = Vec::new();
    units.push(tokio::spawn(borg_runner::transport::run(
        Arc::clone(&transport),
        task_tx,
        Arc::clone(&cancels),
        shutdown.clone(),
    )));
    units.push(tokio::spawn(borg_runner::heartbeat::run(
        Arc::clone(&transport),
        Arc::clone(&counters),
        config.work_dir.clone(),
        Duration::from_secs(config.heartbeat_interval_seconds.max(1)),
        shutdown.clone(),
    )));
    units.push(tokio::spawn(screen::run_monitor(
        client.clone(),
        runner_id.clone(),
        backend,
        config.screen.clone(),
        shutdown.clone(),
    )));
    units.push(tokio::spawn(borg_runner::dispatcher::run(
        worker_ctx,
        task_rx,
        Arc::clone(&counters),
        Arc::clone(&cancels),
        shutdown.clone(),
    )));

    wait_for_signal().await;
    tracing::info!("shutting down, waiting for active tasks");
    shutdown.cancel();

    // Grace period for in-flight tasks, then force-exit.
    let drain = async {
        while cancels.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
        for unit in units {
            let _ = unit.await;
        }
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        tracing::warn!("grace period expired, forcing exit");
    }

    tracing::info!("solder stopped");
    Ok(())
}

/// Register, retrying transient failures with the reconnect delay.
async fn register_with_retry(
    client: &ApiClient,
    register: &RegisterRequest,
) -> anyhow::Result<String> {
    let mut attempt = 0u32;
    loop {
        match client.register(register).await {
            Ok(resp) => return Ok(resp.runner_id),
            Err(e) if e.is_transient() && attempt < 10 => {
                attempt += 1;
                tracing::warn!(%e, attempt, "register failed, retrying");
                tokio::time::sleep(WS_RECONNECT_DELAY).await;
            }
            Err(e) => return Err(e).context("registration rejected"),
        }
    }
}

fn hostname() -> String {
    std::process::Command::new("hostname")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown-host".to_string())
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
}
