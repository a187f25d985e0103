//! Request/response client for the storage daemon.

use crate::error::{Result, StorageError};
use crate::types::{AddRequest, ApiResult, BagDetailed, CreateRequest, CreateResponse, RemoveRequest};
use bagnet_types::BagId;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

#[derive(Clone)]
pub struct StorageClient {
    http: reqwest::Client,
    base: String,
    root_path: String,
    credentials: Option<Credentials>,
}

impl StorageClient {
    pub fn new(
        base: impl Into<String>,
        root_path: impl Into<String>,
        credentials: Option<Credentials>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            base: base.into(),
            root_path: root_path.into(),
            credentials,
        })
    }

    /// Package the files under `path` into a bag. An empty bag id in the
    /// response is a hard failure, never a silent success.
    pub async fn create(&self, description: &str, path: &str) -> Result<BagId> {
        let res: CreateResponse = self
            .post("/api/v1/create", &CreateRequest { description, path })
            .await?;

        if res.bag_id.is_empty() {
            return Err(StorageError::EmptyBagId);
        }

        res.bag_id.parse().map_err(|_| StorageError::Api {
            status: 200,
            message: format!("daemon returned malformed bag id {:?}", res.bag_id),
        })
    }

    pub async fn bag_details(&self, bag_id: &BagId) -> Result<BagDetailed> {
        let url = format!("{}/api/v1/details?bag_id={}", self.base, bag_id);
        let mut req = self.http.get(&url);
        if let Some(creds) = &self.credentials {
            req = req.basic_auth(&creds.login, Some(&creds.password));
        }
        let res = req.send().await?;
        let details: BagDetailed = decode(res).await?;

        if details.info_loaded && details.merkle_hash.is_empty() {
            return Err(StorageError::DaemonTooOld);
        }
        Ok(details)
    }

    /// Ask the daemon to start downloading a bag into the configured root
    /// path.
    pub async fn start_download(&self, bag_id: &BagId, download_all: bool) -> Result<()> {
        let res: ApiResult = self
            .post(
                "/api/v1/add",
                &AddRequest {
                    bag_id: bag_id.as_str(),
                    path: &self.root_path,
                    download_all,
                    files: Vec::new(),
                },
            )
            .await?;
        if !res.ok {
            return Err(StorageError::Api {
                status: 200,
                message: res.error,
            });
        }
        Ok(())
    }

    /// Remove a bag from the daemon. A bag the daemon no longer knows is
    /// success: removal is idempotent across crash-retry.
    pub async fn remove_bag(&self, bag_id: &str, with_files: bool) -> Result<()> {
        let res: Result<ApiResult> = self
            .post("/api/v1/remove", &RemoveRequest { bag_id, with_files })
            .await;

        match res {
            Ok(r) if r.ok => Ok(()),
            Ok(r) if r.error.contains("not found") => {
                debug!(bag_id, "Bag already gone from daemon");
                Ok(())
            }
            Ok(r) => Err(StorageError::Api {
                status: 200,
                message: r.error,
            }),
            Err(StorageError::NotFound) => {
                debug!(bag_id, "Bag already gone from daemon");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base, path);
        let mut req = self.http.post(&url).json(body);
        if let Some(creds) = &self.credentials {
            req = req.basic_auth(&creds.login, Some(&creds.password));
        }
        let res = req.send().await?;
        decode(res).await
    }
}

async fn decode<T: DeserializeOwned>(res: reqwest::Response) -> Result<T> {
    let status = res.status();
    if status == StatusCode::NOT_FOUND {
        return Err(StorageError::NotFound);
    }
    if status != StatusCode::OK {
        let err: ApiResult = res.json().await.unwrap_or_default();
        return Err(StorageError::Api {
            status: status.as_u16(),
            message: err.error,
        });
    }
    Ok(res.json().await?)
}
