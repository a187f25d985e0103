//! Production implementations of the capability traits, delegating to the
//! concrete store repositories and clients.

use crate::traits::{BagStorage, FilesDb, NotificationsDb, ProviderDirectory, ProviderTransport};
use anyhow::Result;
use async_trait::async_trait;
use bagnet_chain::{ChainClient, ContractProviders};
use bagnet_storage::StorageClient;
use bagnet_store::{BagContract, BagsRepo, NotificationsRepo, ProviderNotification};
use bagnet_transport::{StorageInfo, TransportClient};
use bagnet_types::{ContractAddress, ProviderKey};
use std::time::Duration;

#[async_trait]
impl FilesDb for BagsRepo {
    async fn remove_unused_bags(&self) -> Result<Vec<String>> {
        Ok(self.remove_unused().await?)
    }

    async fn remove_unpaid_relations(&self, older_than: Duration) -> Result<Vec<String>> {
        Ok(self.remove_unpaid(older_than.as_secs() as i64).await?)
    }

    async fn notify_candidates(
        &self,
        limit: i64,
        max_notify_attempts: i32,
    ) -> Result<Vec<BagContract>> {
        Ok(BagsRepo::notify_candidates(self, limit, max_notify_attempts).await?)
    }

    async fn charge_notify_attempts(&self, rows: &[BagContract]) -> Result<()> {
        Ok(BagsRepo::charge_notify_attempts(self, rows).await?)
    }
}

#[async_trait]
impl NotificationsDb for NotificationsRepo {
    async fn enqueue(&self, rows: &[ProviderNotification]) -> Result<()> {
        Ok(NotificationsRepo::enqueue(self, rows).await?)
    }

    async fn to_notify(
        &self,
        limit: i64,
        max_notify_attempts: i32,
    ) -> Result<Vec<ProviderNotification>> {
        Ok(NotificationsRepo::to_notify(self, limit, max_notify_attempts).await?)
    }

    async fn in_progress(
        &self,
        limit: i64,
        max_download_checks: i32,
    ) -> Result<Vec<ProviderNotification>> {
        Ok(NotificationsRepo::in_progress(self, limit, max_download_checks).await?)
    }

    async fn mark_notified(&self, rows: &[ProviderNotification]) -> Result<()> {
        Ok(NotificationsRepo::mark_notified(self, rows).await?)
    }

    async fn charge_notify_attempts(&self, rows: &[ProviderNotification]) -> Result<()> {
        Ok(NotificationsRepo::charge_notify_attempts(self, rows).await?)
    }

    async fn record_download_checks(&self, rows: &[ProviderNotification]) -> Result<()> {
        Ok(NotificationsRepo::record_download_checks(self, rows).await?)
    }

    async fn charge_download_checks(&self, rows: &[ProviderNotification]) -> Result<()> {
        Ok(NotificationsRepo::charge_download_checks(self, rows).await?)
    }

    async fn reap_terminal(
        &self,
        limit: i64,
        older_than: Duration,
        max_notify_attempts: i32,
        max_download_checks: i32,
    ) -> Result<Vec<String>> {
        Ok(NotificationsRepo::reap_terminal(
            self,
            limit,
            older_than.as_secs() as i64,
            max_notify_attempts,
            max_download_checks,
        )
        .await?)
    }

    async fn prune_history(&self, older_than_days: i64) -> Result<u64> {
        Ok(NotificationsRepo::prune_history(self, older_than_days).await?)
    }
}

#[async_trait]
impl BagStorage for StorageClient {
    async fn remove_bag(&self, bag_id: &str, with_files: bool) -> Result<()> {
        Ok(StorageClient::remove_bag(self, bag_id, with_files).await?)
    }
}

#[async_trait]
impl ProviderDirectory for ChainClient {
    async fn get_providers(&self, contract: &ContractAddress) -> Result<ContractProviders> {
        Ok(ChainClient::get_providers(self, contract).await?)
    }
}

#[async_trait]
impl ProviderTransport for TransportClient {
    async fn request_storage_info(
        &self,
        provider: &ProviderKey,
        contract: &ContractAddress,
        challenge_offset: u64,
    ) -> Result<StorageInfo> {
        Ok(TransportClient::request_storage_info(self, provider, contract, challenge_offset)
            .await?)
    }
}
