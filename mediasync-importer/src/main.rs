//! mediasync-importer - removable media import daemon
//!
//! Polls card mount points, copies new photos and videos into a
//! `YYYY/MM-DD/` archive, runs post-import hooks and reports each batch
//! through ntfy.
//!
//! Signals (unix):
//! - SIGINT / SIGTERM: finish the current file, then stop
//! - SIGUSR1: scan now instead of waiting for the poll interval

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mediasync_common::config::ENV_LOG_LEVEL;
use mediasync_common::ImporterConfig;
use mediasync_importer::services::{build_notifier, ProcessedSet, ScanLoop, TokioProcessRunner};
use tokio::signal;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for mediasync-importer
#[derive(Parser, Debug)]
#[command(name = "mediasync-importer")]
#[command(about = "Import photos and videos from memory cards into a dated archive")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "MEDIASYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Archive root (overrides config and environment)
    #[arg(short, long)]
    archive_root: Option<PathBuf>,

    /// Mount point to watch; repeat for several (overrides config and environment)
    #[arg(short, long = "mount-point")]
    mount_points: Vec<PathBuf>,

    /// Run a single scan cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logging comes up before configuration so config loading is visible.
    // RUST_LOG wins; otherwise the configured level replaces this bootstrap
    // filter once it is known.
    let env_filter = EnvFilter::try_from_default_env().ok();
    let rust_log_set = env_filter.is_some();
    let bootstrap_level = std::env::var(ENV_LOG_LEVEL)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "info".to_string());
    let (filter, filter_handle) = reload::Layer::new(
        env_filter.unwrap_or_else(|| EnvFilter::new(log_directive(&bootstrap_level))),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config =
        ImporterConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(root) = args.archive_root {
        config.archive_root = root;
    }
    if !args.mount_points.is_empty() {
        config.mount_points = args.mount_points;
    }
    config.validate().context("Invalid configuration")?;

    if !rust_log_set {
        if let Err(e) = filter_handle.reload(EnvFilter::new(log_directive(&config.log_level))) {
            tracing::warn!(error = %e, "Failed to apply configured log level");
        }
    }

    info!(
        "Starting mediasync-importer v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );
    info!(
        mount_points = ?config.mount_points,
        archive_root = %config.archive_root.display(),
        hooks_dir = ?config.hooks_dir,
        metadata_tool = %config.metadata_tool.display(),
        notifications = config.notifications.is_active(),
        "Configuration loaded"
    );

    std::fs::create_dir_all(&config.archive_root).with_context(|| {
        format!("Failed to create archive root {}", config.archive_root.display())
    })?;

    let notifier = build_notifier(&config.notifications).context("Failed to build notifier")?;
    let mut scan_loop = ScanLoop::from_config(&config, Arc::new(TokioProcessRunner::new()), notifier);
    let mut processed = ProcessedSet::new();

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_shutdown(shutdown.clone()));

    if args.once {
        let report = scan_loop.run_cycle(&mut processed, &shutdown).await;
        info!(
            records = report.records,
            imported = report.stats.total.count,
            duplicates = report.stats.duplicates,
            failed = report.stats.failed,
            cancelled = report.cancelled,
            elapsed = ?report.duration,
            "Single cycle complete"
        );
        return Ok(());
    }

    tokio::spawn(forward_scan_requests(scan_loop.trigger_handle()));

    scan_loop.run(&mut processed, shutdown).await;

    info!("Importer shutdown complete");
    Ok(())
}

/// Filter directive for a log level setting
///
/// A bare level applies to our crates only; anything containing `=` is
/// taken as a full directive.
fn log_directive(level: &str) -> String {
    if level.contains('=') {
        level.to_string()
    } else {
        format!("mediasync_importer={0},mediasync_common={0}", level)
    }
}

/// Cancel `token` on Ctrl+C or SIGTERM
async fn wait_for_shutdown(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }

    token.cancel();
}

/// Wake the scan loop on SIGUSR1
#[cfg(unix)]
async fn forward_scan_requests(trigger: Arc<Notify>) {
    let mut stream = match signal::unix::signal(signal::unix::SignalKind::user_defined1()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, "SIGUSR1 scan trigger unavailable");
            return;
        }
    };

    while stream.recv().await.is_some() {
        trigger.notify_one();
    }
}

#[cfg(not(unix))]
async fn forward_scan_requests(_trigger: Arc<Notify>) {}
