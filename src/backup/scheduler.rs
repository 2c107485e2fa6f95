use std::sync::Arc;
use std::time::Duration;

use log::info;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::BackupEngine;

/// Run every backup now and then once per `period` until `shutdown` fires.
pub fn spawn(engine: Arc<BackupEngine>, period: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Backup scheduler stopped");
                    break;
                }
                _ = ticker.tick() => {
                    info!("Running scheduled backups");
                    engine.run_all().await;
                }
            }
        }
    })
}
