//! Contract-state client with a per-query deadline and retry budget.

use crate::error::{ChainError, Result};
use bagnet_types::{ContractAddress, ProviderKey};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

const GET_PROVIDERS_RETRIES: u32 = 5;
const SINGLE_QUERY_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// A storage provider as listed in a contract's state.
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub key: ProviderKey,
    pub last_proof_at: i64,
    pub rate_per_mb_day: u64,
    pub max_span: u32,
}

/// A contract's provider set plus its remaining balance.
#[derive(Debug, Clone)]
pub struct ContractProviders {
    pub address: ContractAddress,
    pub balance: u64,
    pub providers: Vec<ProviderInfo>,
}

#[derive(Debug, Deserialize)]
struct ContractStateResponse {
    #[serde(default)]
    balance: u64,
    #[serde(default)]
    providers: Vec<ProviderStateEntry>,
}

#[derive(Debug, Deserialize)]
struct ProviderStateEntry {
    pubkey: String,
    #[serde(default)]
    last_proof_at: i64,
    #[serde(default)]
    rate_per_mb_day: u64,
    #[serde(default)]
    max_span: u32,
}

#[derive(Clone)]
pub struct ChainClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ChainClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(SINGLE_QUERY_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    /// Read a contract's provider set. Retries up to the budget with a
    /// linear backoff; provider entries with malformed pubkeys are dropped
    /// with a warning rather than failing the read.
    pub async fn get_providers(&self, contract: &ContractAddress) -> Result<ContractProviders> {
        let state = self.fetch_with_retries(contract).await?;

        let mut providers = Vec::with_capacity(state.providers.len());
        for entry in state.providers {
            match entry.pubkey.parse::<ProviderKey>() {
                Ok(key) => providers.push(ProviderInfo {
                    key,
                    last_proof_at: entry.last_proof_at,
                    rate_per_mb_day: entry.rate_per_mb_day,
                    max_span: entry.max_span,
                }),
                Err(e) => {
                    warn!(
                        contract = %contract,
                        pubkey = %entry.pubkey,
                        error = %e,
                        "Skipping provider with malformed pubkey"
                    );
                }
            }
        }

        Ok(ContractProviders {
            address: contract.clone(),
            balance: state.balance,
            providers,
        })
    }

    async fn fetch_with_retries(
        &self,
        contract: &ContractAddress,
    ) -> Result<ContractStateResponse> {
        let url = format!("{}/api/v1/contract/{}/providers", self.endpoint, contract);

        let mut last_error = String::new();
        for attempt in 1..=GET_PROVIDERS_RETRIES {
            match self.fetch_once(&url).await {
                Ok(state) => return Ok(state),
                Err(e) => {
                    warn!(
                        contract = %contract,
                        attempt,
                        error = %e,
                        "Contract state read failed"
                    );
                    last_error = e.to_string();
                }
            }
            if attempt < GET_PROVIDERS_RETRIES {
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
        }

        Err(ChainError::RetriesExhausted {
            contract: contract.to_string(),
            last_error,
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<ContractStateResponse> {
        let res = self.http.get(url).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(ChainError::Status(status.as_u16()));
        }
        Ok(res.json().await?)
    }
}
