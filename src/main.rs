#![forbid(unsafe_code)]

//! `taskbridge` — Slack task bridge server binary.
//!
//! Bootstraps configuration, connects the `SQLite` index, wires the
//! gateways into the event router, and serves the webhook endpoint.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use taskbridge::classifier::openai::OpenAiClassifier;
use taskbridge::config::GlobalConfig;
use taskbridge::identity::DirectoryResolver;
use taskbridge::notify::SlackNotifier;
use taskbridge::persistence::{db, retention};
use taskbridge::router::EventRouter;
use taskbridge::slack::gateway::SlackGateway;
use taskbridge::tracker::monday::MondayTracker;
use taskbridge::webhook::server::{self, AppState};
use taskbridge::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "taskbridge", about = "Slack task bridge server", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the configured HTTP port.
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("taskbridge server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    if let Some(port) = args.port {
        config.http_port = port;
    }
    config.load_credentials().await?;
    let config = Arc::new(config);
    info!("configuration loaded");

    // ── Identity map ────────────────────────────────────
    let identity_map = match &config.identity_map_path {
        Some(path) => DirectoryResolver::load_map(path)?,
        None => {
            warn!("no identity map configured; all completions will be unassigned");
            HashMap::new()
        }
    };

    // ── Initialize database ─────────────────────────────
    let database = Arc::new(db::connect(&config.db_path).await?);
    info!("database connected");

    // ── Start maintenance purge ─────────────────────────
    let ct = CancellationToken::new();
    let retention_handle = retention::spawn_retention_task(
        Arc::clone(&database),
        config.retention_days,
        ct.clone(),
    );

    // ── Wire gateways into the router ───────────────────
    let slack_gateway = Arc::new(SlackGateway::new(&config.slack)?);
    let classifier = Arc::new(OpenAiClassifier::new(&config.classifier)?);
    let tracker = Arc::new(MondayTracker::new(config.tracker.clone())?);
    let notifier = Arc::new(SlackNotifier::new(Arc::clone(&slack_gateway)));
    let identity = Arc::new(DirectoryResolver::new(
        identity_map,
        Some(Arc::clone(&slack_gateway)),
    ));

    let router = EventRouter::new(
        Arc::clone(&config),
        database,
        classifier,
        tracker,
        notifier,
        identity,
    );
    let state = Arc::new(AppState {
        config: Arc::clone(&config),
        router,
    });

    // ── Serve the webhook endpoint ──────────────────────
    let server_ct = ct.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(err) = server::serve(state, server_ct).await {
            error!(%err, "webhook server failed");
        }
    });

    info!("taskbridge ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    let _ = tokio::join!(server_handle, retention_handle);
    info!("taskbridge shut down");

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
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
