//! statusd — the StatusGrid daemon.
//!
//! Single binary that assembles the StatusGrid subsystems:
//! - Prometheus client
//! - Poller + result cache
//! - Status API (and optionally a separate /metrics listener)
//!
//! # Usage
//!
//! ```text
//! statusd run --config /etc/statusgrid/statusgrid.toml
//! statusd check --config statusgrid.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};

use statusgrid_api::{ApiState, build_router, metrics_router};
use statusgrid_collector::{Evaluator, Poller, ResultCache};
use statusgrid_config::{Config, format_duration};
use statusgrid_query::PrometheusClient;

#[derive(Parser)]
#[command(name = "statusd", about = "StatusGrid daemon", version)]
struct Cli {
    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll services and serve the status API.
    Run {
        /// Path to the configuration file.
        #[arg(long, env = "STATUSGRID_CONFIG", default_value = "statusgrid.toml")]
        config: PathBuf,
    },
    /// Validate a configuration file and print a summary.
    Check {
        /// Path to the configuration file.
        #[arg(long, env = "STATUSGRID_CONFIG", default_value = "statusgrid.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Run { config } => run(&config).await,
        Command::Check { config } => check(&config),
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("info,statusd=debug,statusgrid=debug")
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::from_file(path).with_context(|| format!("loading {}", path.display()))
}

fn check(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;
    println!("config ok: {}", path.display());
    println!("  prometheus: {}", config.prometheus);
    println!("  refresh:    {}", format_duration(config.refresh));
    println!("  services:   {}", config.services.len());
    for svc in &config.services {
        println!("    - {} [{}] {}", svc.name, svc.group, svc.query.query);
    }
    Ok(())
}

async fn run(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;
    info!(path = %path.display(), services = config.services.len(), "StatusGrid daemon starting");

    // ── Initialize subsystems ──────────────────────────────────

    let client = PrometheusClient::new(&config.prometheus, config.query_timeout)
        .context("creating prometheus client")?;
    info!(url = %client.base_url(), "prometheus client initialized");

    let mut evaluator = Evaluator::new(Arc::new(client));
    if config.ui.graphs.enabled {
        evaluator = evaluator.with_history(config.ui.graphs.points as usize);
    }

    let cache = ResultCache::new();
    let poller = Poller::new(
        config.services.clone(),
        evaluator,
        cache.clone(),
        config.refresh,
    )
    .with_shutdown_grace(config.shutdown_grace);

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let poller_shutdown = shutdown_rx.clone();
    let poller_handle = tokio::spawn(async move {
        poller.run(poller_shutdown).await;
    });

    let metrics_handle = if config.metrics.enabled {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding metrics listener on {addr}"))?;
        info!(%addr, "metrics server starting");

        let mut metrics_shutdown = shutdown_rx.clone();
        let router = metrics_router(cache.clone());
        Some(tokio::spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(async move {
                let _ = metrics_shutdown.changed().await;
            });
            if let Err(e) = server.await {
                error!(error = %e, "metrics server failed");
            }
        }))
    } else {
        None
    };

    // ── Start API server ───────────────────────────────────────

    let router = build_router(ApiState::new(cache, &config));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding API listener on {addr}"))?;
    info!(%addr, "API server starting");

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for background tasks.
    let _ = poller_handle.await;
    if let Some(handle) = metrics_handle {
        let _ = handle.await;
    }

    info!("StatusGrid daemon stopped");
    Ok(())
}
