//! # Facturapid Synchronizer
//!
//! Moves printed QR-channel invoices from the POS store to the receiving
//! side and writes a QR code per delivered invoice.
//!
//! ## Usage
//! ```bash
//! # Default config location (see SyncConfig::load)
//! facturapid-sync
//!
//! # Explicit config file
//! facturapid-sync --config ./sync.toml
//!
//! # More logging
//! RUST_LOG=facturapid=trace facturapid-sync
//! ```
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. tracing subscriber (RUST_LOG or default filter)                    │
//! │  2. SyncConfig: defaults → sync.toml → FACTURAPID_* → validate         │
//! │  3. SqliteSource (read only)                                           │
//! │  4. Forwarder: HttpForwarder or RepositoryForwarder                    │
//! │  5. ArtifactWorker task (if enabled)                                   │
//! │  6. Poller task, until Ctrl+C / SIGTERM                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use facturapid_db::{Database, DbConfig};
use facturapid_sync::{
    ArtifactWorker, Checkpoint, FileCheckpointStore, ForwardMode, Forwarder, HttpForwarder,
    Poller, PollerSettings, QrArtifactGenerator, RepositoryForwarder, SqliteSource, SyncConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let Some(config_path) = parse_args() else {
        return Ok(());
    };

    info!("Starting Facturapid synchronizer...");

    let config = SyncConfig::load(config_path).context("loading sync configuration")?;
    info!(
        source = %config.source.database_path.display(),
        forward_mode = %config.forward.mode,
        poll_interval_secs = config.sync.poll_interval_secs,
        on_failure = %config.sync.on_failure,
        "Configuration loaded"
    );

    let source = SqliteSource::connect(&config.source)
        .await
        .context("opening POS store")?;

    // Receiving store, when forwarding locally
    let receiver = match config.forward.mode {
        ForwardMode::Http => None,
        ForwardMode::Database => Some(
            Database::new(DbConfig::new(&config.forward.database_path))
                .await
                .context("opening receiving store")?,
        ),
    };

    let forwarder: Arc<dyn Forwarder> = match &receiver {
        Some(db) => Arc::new(RepositoryForwarder::new(db.invoices())),
        None => Arc::new(HttpForwarder::new(&config.forward)?),
    };

    let mut settings = PollerSettings::from_config(&config);
    if config.checkpoint.resume_from_store {
        match &receiver {
            Some(db) => {
                if let Some(max_code) = db.invoices().max_code().await? {
                    info!(max_code, "Seeding checkpoint from receiving store");
                    settings.initial = settings.initial.max(Checkpoint::new(max_code));
                }
            }
            None => warn!("resume_from_store only applies to database forwarding, ignoring"),
        }
    }

    let (mut poller, handle) = Poller::new(Arc::new(source), forwarder, settings);

    if let Some(path) = &config.checkpoint.path {
        info!(path = %path.display(), "Using checkpoint file");
        poller = poller.with_checkpoint_store(Arc::new(FileCheckpointStore::new(path)));
    }

    let artifact_task = if config.artifact.enabled {
        let (worker, artifacts) = ArtifactWorker::new(QrArtifactGenerator::new(&config.artifact));
        poller = poller.with_artifacts(artifacts);
        Some(tokio::spawn(worker.run()))
    } else {
        info!("QR artifacts disabled");
        None
    };

    let poller_task = tokio::spawn(poller.run());

    shutdown_signal().await;

    if let Err(e) = handle.shutdown().await {
        // Poller already gone; its task result tells why
        warn!(?e, "Poller did not accept shutdown request");
    }

    let checkpoint = poller_task.await.context("poller task failed")?;

    // The poller dropped its artifact handle on exit; wait for the queue to drain
    if let Some(task) = artifact_task {
        let report = task.await.context("artifact worker failed")?;
        info!(generated = report.generated, failed = report.failed, "QR artifacts done");
    }

    if let Some(db) = receiver {
        db.close().await;
    }

    info!(checkpoint = checkpoint.value(), "Synchronizer stopped");
    Ok(())
}

/// Parses command line arguments.
///
/// Returns `None` when the process should exit right away (`--help`).
fn parse_args() -> Option<Option<PathBuf>> {
    let args: Vec<String> = std::env::args().collect();
    parse_args_from(&args)
}

fn parse_args_from(args: &[String]) -> Option<Option<PathBuf>> {
    let mut config_path = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => match args.get(i + 1) {
                Some(path) => {
                    config_path = Some(PathBuf::from(path));
                    i += 1;
                }
                None => warn!(arg = %args[i], "Missing config path, using default location"),
            },
            "--help" | "-h" => {
                println!("Facturapid Synchronizer");
                println!();
                println!("Usage: facturapid-sync [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: platform config dir/sync.toml)");
                println!("  -h, --help           Show this help message");
                println!();
                println!("Environment:");
                println!("  FACTURAPID_SOURCE_DB, FACTURAPID_API_ENDPOINT, FACTURAPID_API_KEY,");
                println!("  FACTURAPID_FORWARD_MODE, FACTURAPID_RECEIVER_DB, FACTURAPID_ARTIFACT_DIR,");
                println!("  FACTURAPID_CHECKPOINT_PATH, FACTURAPID_POLL_INTERVAL_SECS, FACTURAPID_ON_FAILURE");
                return None;
            }
            other => warn!(arg = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    Some(config_path)
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=facturapid=trace` - Show trace for facturapid crates only
/// - Default: INFO, DEBUG for facturapid crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,facturapid=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(?e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
