#![forbid(unsafe_code)]

//! `loomd` — ephemeral LLM worker daemon.
//!
//! Bootstraps configuration, restores durable session state, and starts
//! the revival tick and the IPC server. The process carries no
//! command-line behavior beyond these bootstrap flags; its interface is
//! the message protocol.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use loomd::capability::UnsupportedCapability;
use loomd::config::WorkerConfig;
use loomd::context::WorkerContext;
use loomd::ipc::server::spawn_ipc_server;
use loomd::persistence::db;
use loomd::revival::spawn_revival_task;
use loomd::{reconciler, Result, WorkerError};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "loomd", about = "Ephemeral LLM worker daemon", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the configured data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("loomd worker bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| WorkerError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = WorkerConfig::load_from_path(&args.config)?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    let config = Arc::new(config);
    info!("configuration loaded");

    // ── Initialize database ─────────────────────────────
    let pool = db::connect(&config).await?;
    info!("database connected");

    // ── Build shared worker context ─────────────────────
    // The inference engine is linked in by the embedding host; the bare
    // daemon ships the unsupported stub so check-capability answers
    // honestly.
    let ctx = Arc::new(WorkerContext::new(
        Arc::clone(&config),
        pool,
        Arc::new(UnsupportedCapability),
    ));

    // ── Cold-start restore ──────────────────────────────
    let restored = reconciler::restore(&ctx.state_repo, config.staleness_minutes).await?;
    ctx.session
        .adopt_restored(restored.phase, restored.session_id)
        .await;

    // ── Start background tasks ──────────────────────────
    let ct = CancellationToken::new();
    let revival_handle = spawn_revival_task(Arc::clone(&ctx), ct.clone())?;
    let ipc_handle = spawn_ipc_server(Arc::clone(&ctx), ct.clone())?;

    info!("loomd worker ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    let _ = tokio::join!(revival_handle, ipc_handle);
    info!("loomd worker shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| WorkerError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| WorkerError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
