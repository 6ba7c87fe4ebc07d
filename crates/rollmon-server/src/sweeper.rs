use chrono::{DateTime, Utc};
use rollmon_notify::visibility::is_reclaimable;
use rollmon_storage::{ProductionStore, Result};
use std::sync::Arc;
use tokio::time::{interval, Duration};

/// Periodically deletes notifications that are archived and past their
/// expiry. Expired notifications that were never archived are left alone.
pub struct ExpirySweeper {
    store: Arc<dyn ProductionStore>,
    tick_secs: u64,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn ProductionStore>, tick_secs: u64) -> Self {
        Self {
            store,
            tick_secs: tick_secs.max(1),
        }
    }

    pub async fn run(&self) {
        tracing::info!(tick_secs = self.tick_secs, "Notification expiry sweeper started");

        let mut tick = interval(Duration::from_secs(self.tick_secs));
        loop {
            tick.tick().await;
            match self.sweep(Utc::now()).await {
                Ok(removed) if removed > 0 => {
                    tracing::info!(removed, "Reclaimed expired notifications")
                }
                Err(e) => tracing::error!(error = %e, "Notification sweep failed"),
                _ => {}
            }
        }
    }

    /// One pass. Returns the number of deleted notifications.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<u64> {
        let ids: Vec<i64> = self
            .store
            .archived_notifications()
            .await?
            .iter()
            .filter(|n| is_reclaimable(n, now))
            .map(|n| n.id)
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }
        self.store.delete_notifications(&ids).await
    }
}
