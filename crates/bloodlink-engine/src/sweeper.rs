//! Periodic expiry sweep.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::time::interval;
use tracing::{error, info};

use bloodlink_storage::{AlertStore, StorageError};

/// Background sweep that retires lapsed alerts.
///
/// Lazy expiry on the read path already guarantees no query returns a
/// lapsed alert as `active`; the sweep persists those transitions so the
/// store converges even for alerts nobody reads.
pub struct ExpirySweeper<S>
where
    S: AlertStore,
{
    store: Arc<S>,
    period: Duration,
}

impl<S> ExpirySweeper<S>
where
    S: AlertStore + 'static,
{
    pub fn new(store: Arc<S>, period: Duration) -> Self {
        Self { store, period }
    }

    /// Runs the sweep loop. Storage errors are logged and retried on the
    /// next tick; the loop never exits.
    pub async fn run(&self) {
        let mut ticker = interval(self.period);

        info!(period_secs = self.period.as_secs(), "Expiry sweeper started");

        loop {
            ticker.tick().await;

            match self.sweep_once().await {
                Ok(count) => {
                    if count > 0 {
                        info!(count, "Expired lapsed alerts");
                    }
                }
                Err(e) => {
                    error!(error = %e, "Expiry sweep failed");
                }
            }
        }
    }

    /// One sweep pass; transitions every due alert and returns the count.
    pub async fn sweep_once(&self) -> Result<u64, StorageError> {
        let expired = self.store.expire_due(OffsetDateTime::now_utc()).await?;
        Ok(expired.len() as u64)
    }
}
