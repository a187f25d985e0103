//! Retention cleanup for the notification history archive.

use crate::traits::NotificationsDb;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const SUCCESS_INTERVAL: Duration = Duration::from_secs(6 * 3600);
const FAILURE_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub struct HistoryCleaner {
    notifications: Arc<dyn NotificationsDb>,
    retention_days: i64,
}

impl HistoryCleaner {
    pub fn new(notifications: Arc<dyn NotificationsDb>, retention_days: i64) -> Self {
        Self {
            notifications,
            retention_days,
        }
    }

    /// Drop archived notification rows past the retention horizon.
    pub async fn prune(&self) -> Duration {
        match self.notifications.prune_history(self.retention_days).await {
            Ok(0) => SUCCESS_INTERVAL,
            Ok(removed) => {
                info!(count = removed, "Pruned archived notifications");
                SUCCESS_INTERVAL
            }
            Err(e) => {
                error!(error = %e, "Failed to prune notification history");
                FAILURE_INTERVAL
            }
        }
    }
}
