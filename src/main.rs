//! PUMPGUARD - industrial pump monitor
//!
//! Ingests sensor readings, evaluates fixed-length windows against a
//! sequence-reconstruction model, raises maintenance events and serves the
//! live state over HTTP.
//!
//! # Usage
//!
//! ```bash
//! # Serve the API and wait for readings on POST /api/v2/ingest
//! cargo run --release
//!
//! # Replay a dataset export at 200 ms per reading
//! cargo run --release -- --replay data/pump_sensor.csv --interval-ms 200
//! ```
//!
//! # Environment Variables
//!
//! - `PUMPGUARD_CONFIG`: path to a `pump_config.toml`
//! - `PUMPGUARD_SERVER_ADDR`: bind address (overridden by `--addr`)
//! - `PUMPGUARD_CORS_ORIGINS`: comma-separated allowed origins
//! - `PUMPGUARD_LOG_FORMAT`: `json` for structured log lines
//! - `RUST_LOG`: logging level (default: info)
//! - `RESET_DB`: set to "true" to wipe all persistent data on startup

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use pumpguard::api::create_app;
use pumpguard::config::PumpConfig;
use pumpguard::pipeline::{build_pipeline, AppState, ProcessingLoop};
use pumpguard::{load_model, open_sink, storage};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "pumpguard")]
#[command(about = "PUMPGUARD industrial pump monitoring service")]
#[command(version)]
struct CliArgs {
    /// HTTP bind address (overrides config and PUMPGUARD_SERVER_ADDR)
    #[arg(long, value_name = "HOST:PORT")]
    addr: Option<String>,

    /// Path to pump_config.toml
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Replay a CSV dataset export on startup
    #[arg(long, value_name = "CSV")]
    replay: Option<PathBuf>,

    /// Delay between replayed readings in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Wipe the data directory before starting
    #[arg(long)]
    reset_db: bool,

    /// Keep everything in memory; never open the sled database
    #[arg(long)]
    memory_only: bool,
}

// ============================================================================
// Database Reset
// ============================================================================

/// Check if database reset is requested via CLI flag or environment variable.
fn should_reset_db(cli_flag: bool) -> bool {
    if cli_flag {
        return true;
    }
    if let Ok(val) = std::env::var("RESET_DB") {
        let val_lower = val.to_lowercase();
        return val_lower == "true" || val_lower == "1" || val_lower == "yes";
    }
    false
}

/// Remove the data directory and all its contents.
fn reset_data_directory(data_dir: &Path) -> Result<()> {
    if !data_dir.exists() {
        info!("Data directory does not exist, nothing to reset");
        return Ok(());
    }

    warn!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    warn!("  RESET_DB DETECTED - WIPING ALL PERSISTENT DATA");
    warn!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    warn!("  Removing: {}", data_dir.display());

    if let Ok(entries) = std::fs::read_dir(data_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            let file_type = if path.is_dir() { "DIR " } else { "FILE" };
            warn!("    {} {}", file_type, path.display());
        }
    }

    std::fs::remove_dir_all(data_dir).context("Failed to remove data directory")?;
    warn!("  Data directory removed. A fresh database will be created on startup.");
    Ok(())
}

// ============================================================================
// Logging
// ============================================================================

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json = std::env::var("PUMPGUARD_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

// ============================================================================
// Task Names for Supervisor Logging
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    StreamProcessor,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::StreamProcessor => write!(f, "StreamProcessor"),
        }
    }
}

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    state: AppState,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, create_app(state))
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

/// Spawn the single stream processor consumer.
fn spawn_stream_processor(task_set: &mut JoinSet<Result<TaskName>>, processing_loop: ProcessingLoop) {
    task_set.spawn(async move {
        info!("[StreamProcessor] Task starting");
        let stats = processing_loop.run().await;
        info!(
            "[StreamProcessor] Finished: {} readings, {} inferences, {} events",
            stats.readings_processed, stats.inferences, stats.events_raised
        );
        Ok(TaskName::StreamProcessor)
    });
}

/// Run the supervisor loop: monitor tasks, cancel everything on failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("🔒 Supervisor: All tasks spawned, monitoring...");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("🛑 Supervisor: Shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("🔒 Supervisor: Task {} completed", task_name);
                        // Both tasks are meant to live as long as the process
                        cancel_token.cancel();
                    }
                    Some(Ok(Err(e))) => {
                        error!("🔒 Supervisor: Task failed with error: {}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("🔒 Supervisor: Task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("🔒 Supervisor: All tasks completed");
                        break;
                    }
                }
            }
        }
    }

    // Let remaining tasks observe the cancellation and finish
    while let Some(result) = task_set.join_next().await {
        if let Ok(Err(e)) = result {
            warn!("Task ended with error during shutdown: {}", e);
        }
    }

    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = CliArgs::parse();

    let config = match &args.config {
        Some(path) => PumpConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PumpConfig::load(),
    };
    config.validate().context("invalid pump configuration")?;
    let config = Arc::new(config);

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  PUMPGUARD - Industrial Pump Monitoring");
    info!(
        "  Pump: {} | Site: {}",
        config.pump.name,
        if config.pump.site.is_empty() { "unset" } else { config.pump.site.as_str() }
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let data_dir = PathBuf::from(&config.storage.data_dir);
    if should_reset_db(args.reset_db) {
        reset_data_directory(&data_dir)?;
    }

    let memory_only = args.memory_only || !config.storage.enabled;
    let _process_lock = if memory_only {
        None
    } else {
        Some(storage::ProcessLock::acquire(&data_dir)?)
    };
    let sink = open_sink(&config.storage, memory_only);
    info!("💾 Persistence: {}", sink.backend_name());

    let model = load_model(&config);
    info!(
        "🧠 Model: {} ({:?}) | threshold {}",
        model.model.name(),
        model.model.status(),
        model.threshold
    );

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let (state, processing_loop) = build_pipeline(Arc::clone(&config), model, sink, cancel_token.clone());

    let server_addr = args.addr.clone().unwrap_or_else(|| config.server_addr());
    let listener = tokio::net::TcpListener::bind(&server_addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server to {}", server_addr))?;
    info!("🌐 API listening on http://{}", server_addr);

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    spawn_stream_processor(&mut task_set, processing_loop);
    spawn_http_server(&mut task_set, listener, state.clone(), cancel_token.clone());

    if let Some(path) = args.replay.as_deref() {
        match state.replay.start(Some(path), args.interval_ms).await {
            Ok(progress) => info!("📂 Replaying {} readings from {}", progress.total, progress.path),
            Err(e) => {
                cancel_token.cancel();
                return Err(anyhow::anyhow!("replay failed to start: {}", e));
            }
        }
    }

    run_supervisor(&mut task_set, cancel_token).await?;

    info!("✓ PUMPGUARD shutdown complete");
    Ok(())
}
