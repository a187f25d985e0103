//! Core identifier types shared across the bagnet workspace.
//!
//! Everything that crosses a crate boundary is identified by one of three
//! values: a bag (content hash), a provider (overlay public key), or a
//! storage contract (chain address). Each gets a validating newtype so the
//! rest of the workspace never passes bare strings around.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid bag id: {0}")]
    InvalidBagId(String),

    #[error("invalid provider key: {0}")]
    InvalidProviderKey(String),

    #[error("invalid contract address: {0}")]
    InvalidContractAddress(String),
}

pub type Result<T> = std::result::Result<T, TypeError>;

/// A bag identifier: a 32-byte content hash rendered as 64 lowercase hex
/// characters. The hex rendering is the canonical form everywhere: in the
/// store, on the wire to the storage daemon, and in logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BagId(String);

impl BagId {
    pub fn new(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        if s.len() != 64 {
            return Err(TypeError::InvalidBagId(format!(
                "expected 64 hex chars, got {}",
                s.len()
            )));
        }
        if !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(TypeError::InvalidBagId(
                "must be lowercase hex".to_string(),
            ));
        }
        Ok(Self(s))
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BagId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for BagId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<BagId> for String {
    fn from(id: BagId) -> Self {
        id.0
    }
}

/// A storage provider's overlay public key (32 bytes).
///
/// Rendered as lowercase hex in the store and on the gateway wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProviderKey([u8; 32]);

impl ProviderKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let raw = hex::decode(s)
            .map_err(|e| TypeError::InvalidProviderKey(e.to_string()))?;
        let bytes: [u8; 32] = raw.try_into().map_err(|v: Vec<u8>| {
            TypeError::InvalidProviderKey(format!("expected 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for ProviderKey {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for ProviderKey {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self> {
        Self::from_hex(&s)
    }
}

impl From<ProviderKey> for String {
    fn from(key: ProviderKey) -> Self {
        key.to_hex()
    }
}

/// A storage contract address on the chain. Opaque to the broker: it is
/// validated for shape only and passed through to the chain reader and the
/// provider transport verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContractAddress(String);

impl ContractAddress {
    pub fn new(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        if s.is_empty() || s.len() > 128 {
            return Err(TypeError::InvalidContractAddress(format!(
                "bad length {}",
                s.len()
            )));
        }
        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(TypeError::InvalidContractAddress(
                "contains whitespace or control characters".to_string(),
            ));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContractAddress {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContractAddress {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<ContractAddress> for String {
    fn from(addr: ContractAddress) -> Self {
        addr.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bag_id_accepts_canonical_hex() {
        let id = BagId::new("aa".repeat(32)).unwrap();
        assert_eq!(id.as_str().len(), 64);
        assert_eq!(id.to_string(), "aa".repeat(32));
    }

    #[test]
    fn bag_id_rejects_uppercase_and_short() {
        assert!(BagId::new("AA".repeat(32)).is_err());
        assert!(BagId::new("aa".repeat(31)).is_err());
        assert!(BagId::new("zz".repeat(32)).is_err());
    }

    #[test]
    fn bag_id_roundtrips_bytes() {
        let id = BagId::from_bytes(&[0xab; 32]);
        assert_eq!(id.as_str(), "ab".repeat(32));
    }

    #[test]
    fn provider_key_hex_roundtrip() {
        let key = ProviderKey::from_bytes([7u8; 32]);
        let parsed = ProviderKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn provider_key_rejects_wrong_length() {
        assert!(ProviderKey::from_hex("abcd").is_err());
        assert!(ProviderKey::from_hex(&"ff".repeat(33)).is_err());
    }

    #[test]
    fn contract_address_rejects_whitespace() {
        assert!(ContractAddress::new("EQC foo").is_err());
        assert!(ContractAddress::new("").is_err());
        assert!(ContractAddress::new("EQCabc123_-").is_ok());
    }

    #[test]
    fn serde_uses_string_form() {
        let id = BagId::from_bytes(&[1u8; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(32)));
        let back: BagId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        let bad: std::result::Result<BagId, _> = serde_json::from_str("\"nothex\"");
        assert!(bad.is_err());
    }
}
