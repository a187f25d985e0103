//! # bagnet workers
//!
//! The background orchestration subsystem: the pipeline that turns a
//! newly-paid bag into "every contracted provider has acknowledged and
//! downloaded it", plus the reapers that age out unpaid uploads and
//! reclaim disk space.
//!
//! Loops coordinate exclusively through the durable store; there is no
//! in-process queue. Each loop is a tick function returning its next
//! delay, run by the [`scheduler::Scheduler`] in its own task under a
//! shared shutdown signal.
//!
//! External collaborators (the store, the storage daemon, the chain
//! reader and the provider transport) are consumed through the capability
//! traits in [`traits`]; tests substitute in-memory fakes.

pub mod cleaner;
pub mod config;
pub mod files;
pub mod live;
pub mod scheduler;
pub mod traits;

pub use cleaner::HistoryCleaner;
pub use config::{Lifetimes, Limits, WorkerConfig};
pub use files::FilesWorker;
pub use scheduler::Scheduler;
pub use traits::{BagStorage, FilesDb, NotificationsDb, ProviderDirectory, ProviderTransport};

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Register every orchestration loop on a scheduler and launch it.
///
/// The collector must run before the trigger can see a notification row,
/// and the trigger before the checker; that ordering is causal through
/// row-state predicates in the store, not through task startup order.
pub fn spawn_all(
    files: Arc<FilesWorker>,
    cleaner: Arc<HistoryCleaner>,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let mut scheduler = Scheduler::new();

    scheduler.register("remove_unused_bags", {
        let files = files.clone();
        move || {
            let files = files.clone();
            async move { files.remove_unused_bags().await }
        }
    });
    scheduler.register("remove_unpaid_relations", {
        let files = files.clone();
        move || {
            let files = files.clone();
            async move { files.remove_unpaid_relations().await }
        }
    });
    scheduler.register("collect_contract_providers", {
        let files = files.clone();
        move || {
            let files = files.clone();
            async move { files.collect_contract_providers().await }
        }
    });
    scheduler.register("trigger_provider_downloads", {
        let files = files.clone();
        move || {
            let files = files.clone();
            async move { files.trigger_provider_downloads().await }
        }
    });
    scheduler.register("check_download_progress", {
        let files = files.clone();
        move || {
            let files = files.clone();
            async move { files.check_download_progress().await }
        }
    });
    scheduler.register("reap_terminal_notifications", {
        let files = files.clone();
        move || {
            let files = files.clone();
            async move { files.reap_terminal_notifications().await }
        }
    });
    scheduler.register("prune_notification_history", {
        let cleaner = cleaner.clone();
        move || {
            let cleaner = cleaner.clone();
            async move { cleaner.prune().await }
        }
    });

    scheduler.spawn(shutdown)
}
