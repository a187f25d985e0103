//! Gateway request/response calls.

use crate::error::{Result, TransportError};
use bagnet_types::{ContractAddress, ProviderKey};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The gateway answers storage-info probes within the provider deadline;
/// the client timeout is a backstop under the caller's own deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A provider's answer to a storage-info challenge probe.
#[derive(Debug, Clone)]
pub struct StorageInfo {
    pub status: String,
    pub reason: String,
    /// Provider-signed proof of possession at the challenged offset.
    /// Empty means the provider has not accepted the contract yet.
    pub proof: Vec<u8>,
    /// Bytes of the bag the provider reports having downloaded.
    pub downloaded: u64,
}

impl StorageInfo {
    pub fn is_error(&self) -> bool {
        self.status == "error"
    }
}

/// A provider's advertised storage offer for a given bag size.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageRates {
    pub available: bool,
    #[serde(default)]
    pub rate_per_mb_day: u64,
    #[serde(default)]
    pub min_bounty: u64,
    #[serde(default)]
    pub space_available_mb: u64,
    #[serde(default)]
    pub min_span: u32,
    #[serde(default)]
    pub max_span: u32,
}

impl StorageRates {
    /// Providers advertise arbitrary proof spans; offers shown to users are
    /// clamped to the broker's configured ceiling.
    pub fn clamped_span(&self, max_allowed_span_days: u32) -> u32 {
        self.max_span.min(max_allowed_span_days * 86_400)
    }
}

#[derive(Debug, Serialize)]
struct StorageInfoRequest<'a> {
    provider: &'a str,
    contract: &'a str,
    challenge_offset: u64,
}

#[derive(Debug, Deserialize)]
struct StorageInfoResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    reason: String,
    /// Base64 on the wire.
    #[serde(default)]
    proof: String,
    #[serde(default)]
    downloaded: u64,
}

#[derive(Debug, Serialize)]
struct StorageRatesRequest<'a> {
    provider: &'a str,
    bag_size: u64,
}

#[derive(Clone)]
pub struct TransportClient {
    http: reqwest::Client,
    endpoint: String,
}

impl TransportClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    /// Challenge a provider to prove possession of the contract's bag at
    /// `challenge_offset`. A non-empty proof in the response is the signal
    /// that the provider has accepted the contract and begun serving.
    pub async fn request_storage_info(
        &self,
        provider: &ProviderKey,
        contract: &ContractAddress,
        challenge_offset: u64,
    ) -> Result<StorageInfo> {
        let provider_hex = provider.to_hex();
        let res: StorageInfoResponse = self
            .post(
                "/api/v1/storage-info",
                &StorageInfoRequest {
                    provider: &provider_hex,
                    contract: contract.as_str(),
                    challenge_offset,
                },
            )
            .await?;

        let proof = if res.proof.is_empty() {
            Vec::new()
        } else {
            BASE64
                .decode(&res.proof)
                .map_err(|e| TransportError::MalformedProof(e.to_string()))?
        };

        Ok(StorageInfo {
            status: res.status,
            reason: res.reason,
            proof,
            downloaded: res.downloaded,
        })
    }

    /// Ask a provider what it would charge to store `bag_size` bytes.
    pub async fn get_storage_rates(
        &self,
        provider: &ProviderKey,
        bag_size: u64,
    ) -> Result<StorageRates> {
        let provider_hex = provider.to_hex();
        self.post(
            "/api/v1/storage-rates",
            &StorageRatesRequest {
                provider: &provider_hex,
                bag_size,
            },
        )
        .await
    }

    async fn post<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}{}", self.endpoint, path);
        let res = self.http.post(&url).json(body).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        Ok(res.json().await?)
    }
}
