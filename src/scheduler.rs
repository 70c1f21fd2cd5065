//! Interval worker for the upstream sync.
//!
//! Runs in a task separate from the request handlers. The interval is
//! re-read from the API configuration on every tick, so settings changes
//! apply without a restart.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::errors::ServiceError;
use crate::handlers::AppServices;

const FALLBACK_INTERVAL_MINUTES: i32 = 10;

pub fn spawn(services: AppServices) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(services))
}

async fn run(services: AppServices) {
    info!("sync scheduler started");

    loop {
        let (interval_minutes, enabled) = match services.settings.api_config().await {
            Ok(config) => (config.sync_interval_minutes, config.auto_sync_enabled),
            Err(e) => {
                error!(error = %e, "failed to read api configuration, using fallback interval");
                (FALLBACK_INTERVAL_MINUTES, false)
            }
        };

        sleep(Duration::from_secs(interval_minutes.max(1) as u64 * 60)).await;

        if !enabled {
            continue;
        }

        match services.import.sync(None).await {
            Ok(log) => {
                info!(
                    orders_fetched = log.orders_fetched,
                    orders_created = log.orders_created,
                    orders_updated = log.orders_updated,
                    "scheduled sync completed"
                );
            }
            // A manually triggered sync is already running; skip, never queue.
            Err(ServiceError::SyncBusy) => {
                info!("scheduled sync skipped: another sync is in progress");
            }
            Err(e) => {
                warn!(error = %e, "scheduled sync failed");
            }
        }
    }
}
