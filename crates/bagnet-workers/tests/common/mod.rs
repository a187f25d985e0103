//! In-memory fakes of the orchestrator's capability traits, plus a test
//! clock so lifetime-driven behavior can be exercised without waiting.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bagnet_chain::{ContractProviders, ProviderInfo};
use bagnet_store::{BagContract, ProviderNotification};
use bagnet_transport::StorageInfo;
use bagnet_types::{ContractAddress, ProviderKey};
use bagnet_workers::{BagStorage, FilesDb, NotificationsDb, ProviderDirectory, ProviderTransport};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Five-minute probe spacing enforced by the progress query.
const PROGRESS_SPACING_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct OwnerRow {
    pub storage_contract: Option<String>,
    pub notify_attempts: i32,
    pub created_secs: u64,
}

#[derive(Debug, Clone)]
pub struct NotifRow {
    pub bag_id: String,
    pub size: i64,
    pub notify_attempts: i32,
    pub notified: bool,
    pub download_checks: i32,
    pub downloaded: i64,
    pub updated_secs: u64,
}

#[derive(Default)]
struct State {
    /// bag_id -> files_size
    bags: HashMap<String, i64>,
    /// (bag_id, user) -> ownership row
    owners: HashMap<(String, String), OwnerRow>,
    /// (storage_contract, provider_pubkey) -> notification row
    notifications: HashMap<(String, String), NotifRow>,
    history: Vec<NotifRow>,
}

/// An in-memory stand-in for the Postgres store, faithful to the SQL
/// semantics the loops rely on (unique tuple key, handoff sentinel,
/// all-terminal reap aggregate, probe spacing).
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<State>,
    now_secs: AtomicU64,
    pub fail_enqueue: AtomicBool,
    pub fail_mark_notified: AtomicBool,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.now_secs.load(Ordering::SeqCst)
    }

    pub fn advance(&self, secs: u64) {
        self.now_secs.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn add_bag(&self, bag_id: &str, files_size: i64, user: &str) {
        let mut state = self.state.lock().unwrap();
        state.bags.insert(bag_id.to_string(), files_size);
        state.owners.insert(
            (bag_id.to_string(), user.to_string()),
            OwnerRow {
                storage_contract: None,
                notify_attempts: 0,
                created_secs: self.now(),
            },
        );
    }

    pub fn mark_paid(&self, bag_id: &str, user: &str, contract: &str) {
        let mut state = self.state.lock().unwrap();
        let row = state
            .owners
            .get_mut(&(bag_id.to_string(), user.to_string()))
            .expect("ownership row");
        row.storage_contract = Some(contract.to_string());
    }

    pub fn remove_owner(&self, bag_id: &str, user: &str) {
        let mut state = self.state.lock().unwrap();
        state.owners.remove(&(bag_id.to_string(), user.to_string()));
    }

    pub fn owner(&self, bag_id: &str, user: &str) -> Option<OwnerRow> {
        let state = self.state.lock().unwrap();
        state
            .owners
            .get(&(bag_id.to_string(), user.to_string()))
            .cloned()
    }

    pub fn bag_exists(&self, bag_id: &str) -> bool {
        self.state.lock().unwrap().bags.contains_key(bag_id)
    }

    pub fn notification(&self, contract: &str, pubkey: &str) -> Option<NotifRow> {
        let state = self.state.lock().unwrap();
        state
            .notifications
            .get(&(contract.to_string(), pubkey.to_string()))
            .cloned()
    }

    pub fn notification_count(&self) -> usize {
        self.state.lock().unwrap().notifications.len()
    }

    pub fn history_len(&self) -> usize {
        self.state.lock().unwrap().history.len()
    }

    fn terminal(row: &NotifRow, max_attempts: i32, max_checks: i32) -> bool {
        (!row.notified && row.notify_attempts > max_attempts)
            || (row.notified && row.download_checks > max_checks)
            || (row.downloaded >= row.size)
    }
}

#[async_trait]
impl FilesDb for FakeStore {
    async fn remove_unused_bags(&self) -> Result<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        let used: Vec<String> = state.owners.keys().map(|(bag, _)| bag.clone()).collect();
        let unused: Vec<String> = state
            .bags
            .keys()
            .filter(|bag| !used.contains(bag))
            .cloned()
            .collect();
        for bag in &unused {
            state.bags.remove(bag);
        }
        Ok(unused)
    }

    async fn remove_unpaid_relations(&self, older_than: Duration) -> Result<Vec<String>> {
        let now = self.now();
        let mut state = self.state.lock().unwrap();
        let expired: Vec<(String, String)> = state
            .owners
            .iter()
            .filter(|(_, row)| {
                row.storage_contract.is_none()
                    && now.saturating_sub(row.created_secs) > older_than.as_secs()
            })
            .map(|(key, _)| key.clone())
            .collect();
        let mut freed = Vec::new();
        for key in expired {
            state.owners.remove(&key);
            if !freed.contains(&key.0) {
                freed.push(key.0);
            }
        }
        Ok(freed)
    }

    async fn notify_candidates(
        &self,
        limit: i64,
        max_notify_attempts: i32,
    ) -> Result<Vec<BagContract>> {
        let state = self.state.lock().unwrap();
        let mut out = Vec::new();
        for ((bag_id, _), row) in state.owners.iter() {
            let Some(contract) = &row.storage_contract else {
                continue;
            };
            if row.notify_attempts < 0 || row.notify_attempts >= max_notify_attempts {
                continue;
            }
            let Some(size) = state.bags.get(bag_id) else {
                continue;
            };
            out.push(BagContract {
                bag_id: bag_id.clone(),
                storage_contract: contract.clone(),
                size: *size,
            });
            if out.len() as i64 >= limit {
                break;
            }
        }
        Ok(out)
    }

    async fn charge_notify_attempts(&self, rows: &[BagContract]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for charged in rows {
            for ((bag_id, _), row) in state.owners.iter_mut() {
                if bag_id == &charged.bag_id
                    && row.storage_contract.as_deref() == Some(&charged.storage_contract)
                {
                    row.notify_attempts += 1;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationsDb for FakeStore {
    async fn enqueue(&self, rows: &[ProviderNotification]) -> Result<()> {
        if self.fail_enqueue.load(Ordering::SeqCst) {
            return Err(anyhow!("enqueue failed"));
        }
        let now = self.now();
        let mut state = self.state.lock().unwrap();
        for row in rows {
            for ((bag_id, _), owner) in state.owners.iter_mut() {
                if bag_id == &row.bag_id
                    && owner.storage_contract.as_deref() == Some(&row.storage_contract)
                {
                    owner.notify_attempts = -1;
                }
            }
            state
                .notifications
                .entry((row.storage_contract.clone(), row.provider_pubkey.clone()))
                .or_insert(NotifRow {
                    bag_id: row.bag_id.clone(),
                    size: row.size,
                    notify_attempts: 0,
                    notified: false,
                    download_checks: 0,
                    downloaded: 0,
                    updated_secs: now,
                });
        }
        Ok(())
    }

    async fn to_notify(
        &self,
        limit: i64,
        max_notify_attempts: i32,
    ) -> Result<Vec<ProviderNotification>> {
        let state = self.state.lock().unwrap();
        let mut out = Vec::new();
        for ((contract, pubkey), row) in state.notifications.iter() {
            if row.notified || row.notify_attempts > max_notify_attempts {
                continue;
            }
            out.push(ProviderNotification {
                bag_id: row.bag_id.clone(),
                storage_contract: contract.clone(),
                provider_pubkey: pubkey.clone(),
                size: row.size,
                downloaded: row.downloaded,
            });
            if out.len() as i64 >= limit {
                break;
            }
        }
        Ok(out)
    }

    async fn in_progress(
        &self,
        limit: i64,
        max_download_checks: i32,
    ) -> Result<Vec<ProviderNotification>> {
        let now = self.now();
        let state = self.state.lock().unwrap();
        let mut rows: Vec<(&(String, String), &NotifRow)> = state
            .notifications
            .iter()
            .filter(|(_, row)| {
                row.notified
                    && row.downloaded < row.size
                    && row.download_checks <= max_download_checks
                    && row.updated_secs + PROGRESS_SPACING_SECS < now
            })
            .collect();
        rows.sort_by_key(|(_, row)| row.updated_secs);
        Ok(rows
            .into_iter()
            .take(limit as usize)
            .map(|((contract, pubkey), row)| ProviderNotification {
                bag_id: row.bag_id.clone(),
                storage_contract: contract.clone(),
                provider_pubkey: pubkey.clone(),
                size: row.size,
                downloaded: row.downloaded,
            })
            .collect())
    }

    async fn mark_notified(&self, rows: &[ProviderNotification]) -> Result<()> {
        if self.fail_mark_notified.load(Ordering::SeqCst) {
            return Err(anyhow!("mark_notified failed"));
        }
        let now = self.now();
        let mut state = self.state.lock().unwrap();
        for row in rows {
            if let Some(found) = state
                .notifications
                .get_mut(&(row.storage_contract.clone(), row.provider_pubkey.clone()))
            {
                found.notified = true;
                found.notify_attempts += 1;
                found.updated_secs = now;
            }
        }
        Ok(())
    }

    async fn charge_notify_attempts(&self, rows: &[ProviderNotification]) -> Result<()> {
        let now = self.now();
        let mut state = self.state.lock().unwrap();
        for row in rows {
            if let Some(found) = state
                .notifications
                .get_mut(&(row.storage_contract.clone(), row.provider_pubkey.clone()))
            {
                found.notify_attempts += 1;
                found.updated_secs = now;
            }
        }
        Ok(())
    }

    async fn record_download_checks(&self, rows: &[ProviderNotification]) -> Result<()> {
        let now = self.now();
        let mut state = self.state.lock().unwrap();
        for row in rows {
            if let Some(found) = state
                .notifications
                .get_mut(&(row.storage_contract.clone(), row.provider_pubkey.clone()))
            {
                found.download_checks += 1;
                found.downloaded = row.downloaded;
                found.updated_secs = now;
            }
        }
        Ok(())
    }

    async fn charge_download_checks(&self, rows: &[ProviderNotification]) -> Result<()> {
        let now = self.now();
        let mut state = self.state.lock().unwrap();
        for row in rows {
            if let Some(found) = state
                .notifications
                .get_mut(&(row.storage_contract.clone(), row.provider_pubkey.clone()))
            {
                found.download_checks += 1;
                found.updated_secs = now;
            }
        }
        Ok(())
    }

    async fn reap_terminal(
        &self,
        limit: i64,
        older_than: Duration,
        max_notify_attempts: i32,
        max_download_checks: i32,
    ) -> Result<Vec<String>> {
        let now = self.now();
        let mut state = self.state.lock().unwrap();

        let reapable = |row: &NotifRow| {
            Self::terminal(row, max_notify_attempts, max_download_checks)
                && now.saturating_sub(row.updated_secs) > older_than.as_secs()
        };

        // A bag qualifies only when every one of its rows can go.
        let mut bags_all_terminal: HashMap<String, bool> = HashMap::new();
        for row in state.notifications.values() {
            let entry = bags_all_terminal.entry(row.bag_id.clone()).or_insert(true);
            *entry &= reapable(row);
        }

        let keys: Vec<(String, String)> = state
            .notifications
            .iter()
            .filter(|(_, row)| bags_all_terminal.get(&row.bag_id).copied().unwrap_or(false))
            .take(limit as usize)
            .map(|(key, _)| key.clone())
            .collect();

        let mut removed = Vec::new();
        for key in keys {
            if let Some(row) = state.notifications.remove(&key) {
                removed.push(row.bag_id.clone());
                state.history.push(row);
            }
        }
        Ok(removed)
    }

    async fn prune_history(&self, older_than_days: i64) -> Result<u64> {
        let now = self.now();
        let horizon = older_than_days as u64 * 86_400;
        let mut state = self.state.lock().unwrap();
        let before = state.history.len();
        state
            .history
            .retain(|row| now.saturating_sub(row.updated_secs) <= horizon);
        Ok((before - state.history.len()) as u64)
    }
}

/// Storage daemon fake: records removals, optionally failing them.
#[derive(Default)]
pub struct FakeStorage {
    pub removed: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl BagStorage for FakeStorage {
    async fn remove_bag(&self, bag_id: &str, _with_files: bool) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("daemon unreachable"));
        }
        self.removed.lock().unwrap().push(bag_id.to_string());
        Ok(())
    }
}

/// Chain fake: a scripted contract -> provider-set mapping.
#[derive(Default)]
pub struct FakeChain {
    providers: Mutex<HashMap<String, Vec<ProviderKey>>>,
    pub fail_all: AtomicBool,
    pub reads: AtomicU64,
}

impl FakeChain {
    pub fn set_providers(&self, contract: &str, keys: Vec<ProviderKey>) {
        self.providers
            .lock()
            .unwrap()
            .insert(contract.to_string(), keys);
    }
}

#[async_trait]
impl ProviderDirectory for FakeChain {
    async fn get_providers(&self, contract: &ContractAddress) -> Result<ContractProviders> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(anyhow!("liteserver timeout"));
        }
        let providers = self.providers.lock().unwrap();
        let keys = providers
            .get(contract.as_str())
            .cloned()
            .ok_or_else(|| anyhow!("contract not deployed"))?;
        Ok(ContractProviders {
            address: contract.clone(),
            balance: 1_000_000,
            providers: keys
                .into_iter()
                .map(|key| ProviderInfo {
                    key,
                    last_proof_at: 0,
                    rate_per_mb_day: 10,
                    max_span: 86_400,
                })
                .collect(),
        })
    }
}

/// Per-provider scripted probe behavior.
#[derive(Debug, Clone)]
pub enum ProbeBehavior {
    /// Respond with a proof and the given downloaded byte count.
    Proof { downloaded: u64 },
    /// Respond with status "error".
    Refuse(String),
    /// Respond "ok" but without a proof.
    NoProof,
    /// Fail at the transport level.
    Unreachable,
}

#[derive(Default)]
pub struct FakeTransport {
    behavior: Mutex<HashMap<String, ProbeBehavior>>,
    pub probes: AtomicU64,
    pub offsets: Mutex<Vec<u64>>,
}

impl FakeTransport {
    pub fn set_behavior(&self, pubkey: &ProviderKey, behavior: ProbeBehavior) {
        self.behavior
            .lock()
            .unwrap()
            .insert(pubkey.to_hex(), behavior);
    }
}

#[async_trait]
impl ProviderTransport for FakeTransport {
    async fn request_storage_info(
        &self,
        provider: &ProviderKey,
        _contract: &ContractAddress,
        challenge_offset: u64,
    ) -> Result<StorageInfo> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.offsets.lock().unwrap().push(challenge_offset);
        let behavior = self
            .behavior
            .lock()
            .unwrap()
            .get(&provider.to_hex())
            .cloned()
            .unwrap_or(ProbeBehavior::NoProof);
        match behavior {
            ProbeBehavior::Proof { downloaded } => Ok(StorageInfo {
                status: "ok".to_string(),
                reason: String::new(),
                proof: vec![0xAA; 16],
                downloaded,
            }),
            ProbeBehavior::Refuse(reason) => Ok(StorageInfo {
                status: "error".to_string(),
                reason,
                proof: Vec::new(),
                downloaded: 0,
            }),
            ProbeBehavior::NoProof => Ok(StorageInfo {
                status: "ok".to_string(),
                reason: String::new(),
                proof: Vec::new(),
                downloaded: 0,
            }),
            ProbeBehavior::Unreachable => Err(anyhow!("adnl query timed out")),
        }
    }
}
