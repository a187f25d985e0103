//! Capability traits over the orchestrator's external collaborators.
//!
//! The loops only ever see these seams. Production wiring maps them onto
//! the concrete store repositories and clients in [`crate::live`]; the
//! pipeline tests substitute in-memory fakes.

use anyhow::Result;
use async_trait::async_trait;
use bagnet_chain::ContractProviders;
use bagnet_store::{BagContract, ProviderNotification};
use bagnet_transport::StorageInfo;
use bagnet_types::{ContractAddress, ProviderKey};
use std::time::Duration;

/// Bag and ownership rows, as the loops see them.
#[async_trait]
pub trait FilesDb: Send + Sync {
    /// Delete ownerless bag rows, returning the freed bag ids.
    async fn remove_unused_bags(&self) -> Result<Vec<String>>;

    /// Delete unpaid ownership rows older than `older_than`, returning the
    /// bag ids they referenced.
    async fn remove_unpaid_relations(&self, older_than: Duration) -> Result<Vec<String>>;

    /// Paid ownership rows not yet handed to the provider pipeline.
    async fn notify_candidates(
        &self,
        limit: i64,
        max_notify_attempts: i32,
    ) -> Result<Vec<BagContract>>;

    /// Charge one failed collection attempt per row.
    async fn charge_notify_attempts(&self, rows: &[BagContract]) -> Result<()>;
}

/// The provider notification queue.
#[async_trait]
pub trait NotificationsDb: Send + Sync {
    /// Insert rows with at-most-once-per-tuple semantics, marking the
    /// originating ownership rows as handed off.
    async fn enqueue(&self, rows: &[ProviderNotification]) -> Result<()>;

    async fn to_notify(
        &self,
        limit: i64,
        max_notify_attempts: i32,
    ) -> Result<Vec<ProviderNotification>>;

    async fn in_progress(
        &self,
        limit: i64,
        max_download_checks: i32,
    ) -> Result<Vec<ProviderNotification>>;

    async fn mark_notified(&self, rows: &[ProviderNotification]) -> Result<()>;

    async fn charge_notify_attempts(&self, rows: &[ProviderNotification]) -> Result<()>;

    /// Record probe-reported progress (verbatim) and charge a check.
    async fn record_download_checks(&self, rows: &[ProviderNotification]) -> Result<()>;

    /// Charge a failed check without touching `downloaded`.
    async fn charge_download_checks(&self, rows: &[ProviderNotification]) -> Result<()>;

    /// Archive and delete terminal rows past the grace window; a bag
    /// qualifies only when every one of its rows is terminal.
    async fn reap_terminal(
        &self,
        limit: i64,
        older_than: Duration,
        max_notify_attempts: i32,
        max_download_checks: i32,
    ) -> Result<Vec<String>>;

    /// Drop archived rows past the retention horizon.
    async fn prune_history(&self, older_than_days: i64) -> Result<u64>;
}

/// The storage daemon, reduced to what the reapers need.
#[async_trait]
pub trait BagStorage: Send + Sync {
    /// Remove a bag and its files. Implementations treat a bag the daemon
    /// no longer knows as success.
    async fn remove_bag(&self, bag_id: &str, with_files: bool) -> Result<()>;
}

/// Read-only view of on-chain storage contracts.
#[async_trait]
pub trait ProviderDirectory: Send + Sync {
    async fn get_providers(&self, contract: &ContractAddress) -> Result<ContractProviders>;
}

/// The opaque provider-messaging capability over the overlay.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    async fn request_storage_info(
        &self,
        provider: &ProviderKey,
        contract: &ContractAddress,
        challenge_offset: u64,
    ) -> Result<StorageInfo>;
}
