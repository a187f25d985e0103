//! Wire types of the storage daemon's v1 API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct CreateRequest<'a> {
    pub description: &'a str,
    pub path: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateResponse {
    #[serde(default)]
    pub bag_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct RemoveRequest<'a> {
    pub bag_id: &'a str,
    pub with_files: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct AddRequest<'a> {
    pub bag_id: &'a str,
    pub path: &'a str,
    pub download_all: bool,
    pub files: Vec<u32>,
}

/// Generic ok/error envelope for mutating daemon calls.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiResult {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub error: String,
}

/// Full bag details as reported by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BagDetailed {
    pub bag_id: String,
    #[serde(default)]
    pub description: String,
    /// Payload bytes.
    pub size: u64,
    /// Bytes including piece and merkle overhead.
    pub bag_size: u64,
    #[serde(default)]
    pub piece_size: u32,
    #[serde(default)]
    pub merkle_hash: String,
    #[serde(default)]
    pub files_count: u64,
    #[serde(default)]
    pub peers: Vec<BagPeer>,
    #[serde(default)]
    pub info_loaded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BagPeer {
    pub addr: String,
    #[serde(default)]
    pub upload_speed: u64,
    #[serde(default)]
    pub download_speed: u64,
}
