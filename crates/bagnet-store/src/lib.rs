//! # bagnet store
//!
//! The durable state store for the bagnet broker: a Postgres-backed
//! relational store holding the `bags`, `bag_users` and
//! `provider_notifications` relations plus the notification history
//! archive. All cross-loop coordination in the broker happens through the
//! transactional semantics of this store; there is no in-process queue.

pub mod bags;
pub mod error;
pub mod models;
pub mod notifications;
pub mod pool;
pub mod system;

pub use bags::BagsRepo;
pub use error::{Result, StoreError};
pub use models::{BagContract, BagSummary, NewBag, ProviderNotification, UserBag};
pub use notifications::NotificationsRepo;
pub use pool::{Store, StoreConfig};
pub use system::SystemRepo;
