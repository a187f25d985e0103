//! Client for the provider overlay gateway.
//!
//! The decentralized overlay itself is opaque to the broker; providers are
//! reached through a request/response gateway speaking JSON. Two calls
//! matter here: asking a provider for its storage rates, and the
//! storage-info challenge probe that asks a provider to commit to a
//! contract and prove possession at a random offset.

pub mod client;
pub mod error;

pub use client::{StorageInfo, StorageRates, TransportClient};
pub use error::{Result, TransportError};
