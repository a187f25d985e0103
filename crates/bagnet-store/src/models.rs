//! Row types shared between the repositories and the orchestration loops.
//!
//! Fields mirror the schema columns; identifiers stay in their canonical
//! string form here and are parsed into typed values at the adapter
//! boundary, so a malformed row can be skipped instead of failing a batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A new bag plus its first ownership row, inserted transactionally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBag {
    pub bag_id: String,
    pub description: String,
    /// Bytes including piece and merkle overhead.
    pub bag_size: i64,
    /// Payload bytes.
    pub files_size: i64,
}

/// An unpaid ownership row, as listed back to the user.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserBag {
    pub bag_id: String,
    pub user_address: String,
    pub created_at: DateTime<Utc>,
}

/// A paid ownership row awaiting provider collection: the collector's unit
/// of work.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BagContract {
    pub bag_id: String,
    pub storage_contract: String,
    pub size: i64,
}

/// One `(storage_contract, provider_pubkey)` tuple in the provider
/// notification queue.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProviderNotification {
    pub bag_id: String,
    pub storage_contract: String,
    pub provider_pubkey: String,
    pub size: i64,
    #[sqlx(default)]
    pub downloaded: i64,
}

/// Short bag description keyed by contract, for contract listings.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BagSummary {
    pub storage_contract: String,
    pub bag_id: String,
    pub description: String,
    pub size: i64,
}
