//! HTTP/JSON adapter for the local content-addressed storage daemon.
//!
//! The daemon owns the actual bag data on disk; the broker only asks it to
//! package uploads into bags, report bag details, start downloads and
//! remove bags. Authentication is HTTP basic; every request carries a 15 s
//! deadline.

pub mod client;
pub mod error;
pub mod types;

pub use client::{Credentials, StorageClient};
pub use error::{Result, StorageError};
pub use types::BagDetailed;
