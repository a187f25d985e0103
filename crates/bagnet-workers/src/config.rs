//! Tunables for the orchestration loops.

use std::time::Duration;

/// Per-row caps and batch sizes.
#[derive(Debug, Clone)]
pub struct Limits {
    /// Attempt cap for the collector and the download trigger.
    pub max_notify_attempts: i32,
    /// Progress-check cap for the download checker.
    pub max_download_checks: i32,
    /// Ownership rows per collector tick.
    pub collector_batch: i64,
    /// Notification rows per trigger tick.
    pub notify_batch: i64,
    /// Notification rows per checker tick.
    pub check_batch: i64,
    /// Notification rows per terminal-reaper tick.
    pub reap_limit: i64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_notify_attempts: 3,
            max_download_checks: 10,
            collector_batch: 10,
            notify_batch: 20,
            check_batch: 20,
            reap_limit: 100,
        }
    }
}

/// Grace windows for the reapers.
#[derive(Debug, Clone)]
pub struct Lifetimes {
    /// Unpaid ownership rows from authenticated uploads.
    pub unpaid_files: Duration,
    /// Unpaid ownership rows from anonymous drops.
    pub unpaid_files_public: Duration,
    /// Terminal notification rows.
    pub paid_files: Duration,
    /// Archived notification rows.
    pub store_history_days: i64,
}

impl Default for Lifetimes {
    fn default() -> Self {
        Self {
            unpaid_files: Duration::from_secs(20 * 60),
            unpaid_files_public: Duration::from_secs(15 * 60),
            paid_files: Duration::from_secs(48 * 3600),
            store_history_days: 90,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    pub limits: Limits,
    pub lifetimes: Lifetimes,
}
