//! Connection pool setup and schema migration.

use crate::error::{Result, StoreError};
use crate::{BagsRepo, NotificationsRepo, SystemRepo};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Duration;

/// Embedded schema, applied statement-by-statement at startup.
const SCHEMA: &str = include_str!("schema.sql");

/// Current schema version, recorded in `system_params` after migration.
const SCHEMA_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5432,
            user: "bagnet".to_string(),
            password: String::new(),
            database: "bagnet".to_string(),
        }
    }
}

/// The durable state store. The pool is exclusively owned by the broker;
/// there is no external writer.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let opts = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        let pool = PgPoolOptions::new()
            .min_connections(3)
            .max_connections(12)
            .max_lifetime(Duration::from_secs(3600))
            .idle_timeout(Duration::from_secs(1800))
            .acquire_timeout(Duration::from_secs(5))
            .test_before_acquire(true)
            .connect_with(opts)
            .await?;

        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            "Connected to Postgres"
        );

        Ok(Self { pool })
    }

    /// Wrap an existing pool. Used by tests that manage their own database.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded schema and record the schema version.
    pub async fn migrate(&self) -> Result<()> {
        for statement in schema_statements(SCHEMA) {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    StoreError::Migration(format!("{e}: in statement {statement:?}"))
                })?;
        }

        self.system()
            .set_param("schema_version", SCHEMA_VERSION)
            .await?;

        tracing::info!(version = SCHEMA_VERSION, "Schema migrated");
        Ok(())
    }

    pub fn bags(&self) -> BagsRepo {
        BagsRepo::new(self.pool.clone())
    }

    pub fn notifications(&self) -> NotificationsRepo {
        NotificationsRepo::new(self.pool.clone())
    }

    pub fn system(&self) -> SystemRepo {
        SystemRepo::new(self.pool.clone())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Split the embedded schema into executable statements, dropping
/// comment-only fragments.
fn schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}
