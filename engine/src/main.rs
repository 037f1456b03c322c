use mimalloc::MiMalloc;
use tracing::{error, info, warn};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::broadcast;

use spoolq::executor::{CopyProcessor, Executor, ExecutorConfig};
use spoolq::spool::{Discipline, ListItems, QueueItems, Storage, StorageConfig, UploadItem};
use spoolq::telemetry;

const DEFAULT_OUTBOX: &str = "./outbox";

/// Create a shutdown signal handler
async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                warn!(error = %e, "Failed to install Ctrl+C handler, continuing without it");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler, continuing without it");
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

    info!("Shutdown signal received, draining workers...");
    let _ = shutdown_tx.send(());
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init();

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let shutdown_tx_signal = shutdown_tx.clone();
    tokio::spawn(async move {
        shutdown_signal(shutdown_tx_signal).await;
    });

    let storage_config = StorageConfig::from_env();
    if storage_config.sync_enabled {
        std::fs::create_dir_all(&storage_config.directory)?;
    }
    let outbox = std::env::var("SPOOL_OUTBOX")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_OUTBOX));
    std::fs::create_dir_all(&outbox)?;

    let files: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    let discipline = std::env::var("SPOOL_DISCIPLINE").unwrap_or_else(|_| "queue".to_string());

    match discipline.as_str() {
        "queue" => run::<QueueItems<UploadItem>>(storage_config, outbox, files, shutdown_rx).await,
        "list" => run::<ListItems<UploadItem>>(storage_config, outbox, files, shutdown_rx).await,
        other => {
            error!(discipline = other, "Unknown SPOOL_DISCIPLINE, expected 'queue' or 'list'");
            Err(format!("unknown discipline '{}'", other).into())
        }
    }
}

async fn run<D: Discipline<UploadItem>>(
    storage_config: StorageConfig,
    outbox: PathBuf,
    files: Vec<PathBuf>,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error>> {
    let storage: Arc<Storage<UploadItem, D>> = Arc::new(Storage::open(storage_config)?);

    // Restored entries go first so their order is kept ahead of new files
    let restore = Arc::clone(&storage);
    if let Some(report) = tokio::task::spawn_blocking(move || restore.join_restore()).await?? {
        info!(
            restored = report.restored,
            discarded = report.discarded,
            superseded = report.superseded,
            failed = report.failed,
            "Spool restored"
        );
    }

    for file in files {
        let item = UploadItem::new(&file);
        let entry_id = item.id;
        match storage.try_add(item) {
            Ok(true) => info!(entry_id, file = %file.display(), "Enqueued"),
            Ok(false) => warn!(entry_id, file = %file.display(), "Enqueued without mirror file"),
            Err(e) => warn!(file = %file.display(), error = %e, "Failed to enqueue"),
        }
    }

    let executor = Executor::new(
        Arc::clone(&storage),
        CopyProcessor::new(&outbox),
        ExecutorConfig::from_env(),
    )?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        discipline = D::NAME,
        pending = storage.len()?,
        outbox = %outbox.display(),
        "spoolq ready"
    );

    Arc::clone(&executor).run(shutdown_rx).await;

    let remaining = storage.len()?;
    storage.release()?;
    info!(
        processed = executor.stats().processed(),
        remaining,
        "Shutdown complete"
    );
    Ok(())
}
