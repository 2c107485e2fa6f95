use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use recipya::backup::scheduler;
use recipya::broker::socket;
use recipya::{AppConfig, BackupEngine, BrokerRegistry, ImageStore, MemoryRepository, Repository};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load()?;
    std::fs::create_dir_all(config.images_dir())?;
    info!("Data directory: {}", config.data_dir().display());

    let repository: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
    let images = Arc::new(ImageStore::new(config.images_dir(), config.images.clone()));
    let shutdown = CancellationToken::new();

    let backups = if config.backup.enabled {
        let engine = Arc::new(BackupEngine::new(config.clone(), repository, images));
        let period = Duration::from_secs(config.backup.interval_hours.max(1) * 3600);
        Some(scheduler::spawn(engine, period, shutdown.clone()))
    } else {
        None
    };

    let app = socket::router(BrokerRegistry::new(), config.server.request_timeout());
    let listener = TcpListener::bind(config.server.address()).await?;
    info!("Listening on {}", config.server.address());

    let grace = config.server.shutdown_grace();
    let signal = shutdown.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", err);
        }
        info!("Shutting down");
        signal.cancel();
    });
    let mut server = std::pin::pin!(server.into_future());

    tokio::select! {
        result = &mut server => result?,
        _ = shutdown.cancelled() => {
            if tokio::time::timeout(grace, &mut server).await.is_err() {
                warn!("Connections still open after {:?}, exiting", grace);
            }
        }
    }

    if let Some(handle) = backups {
        let _ = handle.await;
    }
    Ok(())
}
