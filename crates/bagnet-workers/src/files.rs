//! The orchestration pipeline over bags, ownership rows and provider
//! notifications.
//!
//! Six loops, all stateless between ticks:
//!
//! 1. `remove_unused_bags` reclaims bag rows nobody owns, then the
//!    daemon's copy.
//! 2. `remove_unpaid_relations` ages out ownership rows that never got
//!    paid.
//! 3. `collect_contract_providers` reads each paid contract's provider
//!    set and seeds the notification queue, at most once per tuple.
//! 4. `trigger_provider_downloads` challenge-probes queued providers
//!    until one proof arrives or the attempt cap is hit.
//! 5. `check_download_progress` re-probes notified providers for byte
//!    progress.
//! 6. `reap_terminal_notifications` archives and deletes finished rows
//!    after the grace window, freeing the bag for loop 1.
//!
//! Errors never leave a tick: transient failures charge the affected rows'
//! attempt counters and shorten the next delay.

use crate::config::WorkerConfig;
use crate::traits::{BagStorage, FilesDb, NotificationsDb, ProviderDirectory, ProviderTransport};
use bagnet_store::ProviderNotification;
use bagnet_types::{ContractAddress, ProviderKey};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const FAILURE_INTERVAL: Duration = Duration::from_secs(5);
const SUCCESS_INTERVAL: Duration = Duration::from_secs(1);
const IDLE_INTERVAL: Duration = Duration::from_secs(60);
const REAP_INTERVAL: Duration = Duration::from_secs(60);
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct FilesWorker {
    files: Arc<dyn FilesDb>,
    notifications: Arc<dyn NotificationsDb>,
    storage: Arc<dyn BagStorage>,
    chain: Arc<dyn ProviderDirectory>,
    transport: Arc<dyn ProviderTransport>,
    config: WorkerConfig,
}

impl FilesWorker {
    pub fn new(
        files: Arc<dyn FilesDb>,
        notifications: Arc<dyn NotificationsDb>,
        storage: Arc<dyn BagStorage>,
        chain: Arc<dyn ProviderDirectory>,
        transport: Arc<dyn ProviderTransport>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            files,
            notifications,
            storage,
            chain,
            transport,
            config,
        }
    }

    /// Delete bag rows with no remaining ownership rows and reclaim their
    /// storage-daemon entries. The daemon treats an unknown bag as removed,
    /// so a crash between the two steps heals on the next tick.
    pub async fn remove_unused_bags(&self) -> Duration {
        let removed = match self.files.remove_unused_bags().await {
            Ok(removed) => removed,
            Err(e) => {
                error!(error = %e, "Failed to remove unused bags");
                return FAILURE_INTERVAL;
            }
        };

        for bag_id in &removed {
            if let Err(e) = self.storage.remove_bag(bag_id, true).await {
                warn!(bag_id = %bag_id, error = %e, "Failed to remove bag from storage daemon");
            }
        }

        if !removed.is_empty() {
            info!(count = removed.len(), "Removed unused bags");
        }
        REAP_INTERVAL
    }

    /// Age out ownership rows whose upload was never paid for. The freed
    /// bag rows are left for `remove_unused_bags` to reclaim.
    pub async fn remove_unpaid_relations(&self) -> Duration {
        let removed = match self
            .files
            .remove_unpaid_relations(self.config.lifetimes.unpaid_files)
            .await
        {
            Ok(removed) => removed,
            Err(e) => {
                error!(error = %e, "Failed to remove unpaid ownership rows");
                return FAILURE_INTERVAL;
            }
        };

        if !removed.is_empty() {
            info!(count = removed.len(), "Removed expired unpaid uploads");
        }
        REAP_INTERVAL
    }

    /// Read the provider set of each freshly-paid contract and seed the
    /// notification queue. The queue's unique key makes admission
    /// at-most-once per `(contract, provider)` tuple even across
    /// overlapping runs.
    pub async fn collect_contract_providers(&self) -> Duration {
        let limits = &self.config.limits;
        let candidates = match self
            .files
            .notify_candidates(limits.collector_batch, limits.max_notify_attempts)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                error!(error = %e, "Failed to load collector candidates");
                return FAILURE_INTERVAL;
            }
        };

        let interval = if (candidates.len() as i64) < limits.collector_batch {
            IDLE_INTERVAL
        } else {
            SUCCESS_INTERVAL
        };
        if candidates.is_empty() {
            return interval;
        }

        let mut to_enqueue = Vec::new();
        for candidate in &candidates {
            let contract = match candidate.storage_contract.parse::<ContractAddress>() {
                Ok(contract) => contract,
                Err(e) => {
                    warn!(
                        storage_contract = %candidate.storage_contract,
                        error = %e,
                        "Skipping ownership row with malformed contract address"
                    );
                    continue;
                }
            };

            let state = match self.chain.get_providers(&contract).await {
                Ok(state) => state,
                Err(e) => {
                    // Deferred-on-error: a chain-read failure charges every
                    // row in the batch and abandons the tick.
                    warn!(contract = %contract, error = %e, "Contract provider read failed");
                    if let Err(e) = self.files.charge_notify_attempts(&candidates).await {
                        error!(error = %e, "Failed to charge collection attempts");
                    }
                    return FAILURE_INTERVAL;
                }
            };

            if state.providers.is_empty() {
                debug!(contract = %contract, "Contract lists no providers yet");
                continue;
            }
            for provider in &state.providers {
                to_enqueue.push(ProviderNotification {
                    bag_id: candidate.bag_id.clone(),
                    storage_contract: candidate.storage_contract.clone(),
                    provider_pubkey: provider.key.to_hex(),
                    size: candidate.size,
                    downloaded: 0,
                });
            }
        }

        if to_enqueue.is_empty() {
            return interval;
        }

        if let Err(e) = self.notifications.enqueue(&to_enqueue).await {
            // Same discipline for a lost enqueue: the whole batch is
            // charged and retried.
            let _ = self.files.charge_notify_attempts(&candidates).await;
            error!(error = %e, "Failed to enqueue provider notifications");
            return FAILURE_INTERVAL;
        }

        info!(count = to_enqueue.len(), "Provider notifications enqueued");
        interval
    }

    /// Challenge-probe providers that have not acknowledged their contract
    /// yet. A proof in the response means the provider accepted and began
    /// serving; anything else charges the row's attempt counter.
    pub async fn trigger_provider_downloads(&self) -> Duration {
        let limits = &self.config.limits;
        let batch = match self
            .notifications
            .to_notify(limits.notify_batch, limits.max_notify_attempts)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                error!(error = %e, "Failed to load providers to notify");
                return FAILURE_INTERVAL;
            }
        };

        let interval = if (batch.len() as i64) < limits.notify_batch {
            IDLE_INTERVAL
        } else {
            SUCCESS_INTERVAL
        };
        if batch.is_empty() {
            return interval;
        }

        let (notified, failed) = self.probe_providers(&batch).await;

        if !failed.is_empty() {
            if let Err(e) = self.notifications.charge_notify_attempts(&failed).await {
                error!(error = %e, "Failed to charge notification attempts");
                return FAILURE_INTERVAL;
            }
            warn!(
                failed_count = failed.len(),
                "Some providers failed the notification probe"
            );
        }

        if !notified.is_empty() {
            if let Err(e) = self.notifications.mark_notified(&notified).await {
                // Deferred-on-error: the whole batch is charged one attempt.
                let _ = self.notifications.charge_notify_attempts(&batch).await;
                error!(error = %e, "Failed to mark providers as notified");
                return FAILURE_INTERVAL;
            }
            info!(count = notified.len(), "Providers acknowledged their contracts");
        }

        interval
    }

    /// Re-probe notified providers whose download has not finished and
    /// store the byte counts they report.
    pub async fn check_download_progress(&self) -> Duration {
        let limits = &self.config.limits;
        let batch = match self
            .notifications
            .in_progress(limits.check_batch, limits.max_download_checks)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                error!(error = %e, "Failed to load providers in progress");
                return FAILURE_INTERVAL;
            }
        };

        let interval = if (batch.len() as i64) < limits.check_batch {
            IDLE_INTERVAL
        } else {
            SUCCESS_INTERVAL
        };
        if batch.is_empty() {
            return interval;
        }

        let (checked, failed) = self.probe_providers(&batch).await;

        if !failed.is_empty() {
            if let Err(e) = self.notifications.charge_download_checks(&failed).await {
                warn!(error = %e, "Failed to charge download checks");
            }
            debug!(
                failed_count = failed.len(),
                "Some providers failed the progress probe"
            );
        }

        if !checked.is_empty() {
            if let Err(e) = self.notifications.record_download_checks(&checked).await {
                error!(error = %e, "Failed to record download progress");
                return FAILURE_INTERVAL;
            }
            info!(count = checked.len(), "Recorded provider download progress");
        }

        interval
    }

    /// Archive and delete notification rows that can make no further
    /// progress, once every row of the bag is terminal and the grace
    /// window has passed. Freed bags are reclaimed by the unused-bag
    /// reaper on its next pass.
    pub async fn reap_terminal_notifications(&self) -> Duration {
        let limits = &self.config.limits;
        let removed = match self
            .notifications
            .reap_terminal(
                limits.reap_limit,
                self.config.lifetimes.paid_files,
                limits.max_notify_attempts,
                limits.max_download_checks,
            )
            .await
        {
            Ok(removed) => removed,
            Err(e) => {
                error!(error = %e, "Failed to reap terminal notifications");
                return FAILURE_INTERVAL;
            }
        };

        if !removed.is_empty() {
            info!(count = removed.len(), "Archived terminal notifications");
        }
        REAP_INTERVAL
    }

    /// Probe every row in the batch, partitioning into rows whose response
    /// carried a proof (`downloaded` refreshed from the response) and rows
    /// that failed. Rows with malformed identifiers are skipped; an "ok"
    /// response without a proof leaves the row untouched for a later tick.
    async fn probe_providers(
        &self,
        rows: &[ProviderNotification],
    ) -> (Vec<ProviderNotification>, Vec<ProviderNotification>) {
        let mut proved = Vec::new();
        let mut failed = Vec::new();

        for row in rows {
            let contract = match row.storage_contract.parse::<ContractAddress>() {
                Ok(contract) => contract,
                Err(e) => {
                    warn!(
                        storage_contract = %row.storage_contract,
                        error = %e,
                        "Skipping notification with malformed contract address"
                    );
                    continue;
                }
            };
            let provider = match ProviderKey::from_hex(&row.provider_pubkey) {
                Ok(provider) => provider,
                Err(e) => {
                    warn!(
                        provider_pubkey = %row.provider_pubkey,
                        error = %e,
                        "Provider pubkey failed to parse"
                    );
                    failed.push(row.clone());
                    continue;
                }
            };

            // A fresh random offset per probe keeps a provider from caching
            // a single proof.
            let challenge_offset = {
                let mut rng = rand::thread_rng();
                rng.gen_range(0..row.size.max(1)) as u64
            };

            let outcome = tokio::time::timeout(
                PROBE_TIMEOUT,
                self.transport
                    .request_storage_info(&provider, &contract, challenge_offset),
            )
            .await;

            match outcome {
                Ok(Ok(info)) if info.is_error() => {
                    warn!(
                        provider_pubkey = %row.provider_pubkey,
                        reason = %info.reason,
                        "Provider returned error status"
                    );
                    failed.push(row.clone());
                }
                Ok(Ok(info)) => {
                    if info.proof.is_empty() {
                        debug!(
                            provider_pubkey = %row.provider_pubkey,
                            "Probe answered without a proof"
                        );
                        continue;
                    }
                    let mut row = row.clone();
                    row.downloaded = info.downloaded as i64;
                    proved.push(row);
                }
                Ok(Err(e)) => {
                    warn!(
                        provider_pubkey = %row.provider_pubkey,
                        error = %e,
                        "Provider probe failed"
                    );
                    failed.push(row.clone());
                }
                Err(_) => {
                    warn!(
                        provider_pubkey = %row.provider_pubkey,
                        "Provider probe timed out"
                    );
                    failed.push(row.clone());
                }
            }
        }

        (proved, failed)
    }
}
