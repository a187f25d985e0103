use anyhow::Result;
use bagnet_store::StoreConfig;
use bagnet_workers::{Lifetimes, Limits, WorkerConfig};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub storage: StorageDaemonConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub lifetimes: LifetimesConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5432,
            user: "bagnet".to_string(),
            password: String::new(),
            name: "bagnet".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageDaemonConfig {
    pub base_url: String,
    /// Directory the daemon packages uploads from and downloads into.
    pub bags_dir: String,
    pub login: String,
    pub password: String,
}

impl Default for StorageDaemonConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8192".to_string(),
            bags_dir: "/var/lib/bagnet/bags".to_string(),
            login: String::new(),
            password: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub endpoint: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8291".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    pub endpoint: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8292".to_string(),
        }
    }
}

/// Grace windows, in seconds (days for the history horizon).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifetimesConfig {
    #[serde(default = "default_unpaid_files_lifetime")]
    pub unpaid_files_lifetime: u64,
    #[serde(default = "default_unpaid_files_lifetime_public")]
    pub unpaid_files_lifetime_public: u64,
    #[serde(default = "default_paid_files_lifetime")]
    pub paid_files_lifetime: u64,
    #[serde(default = "default_store_history_days")]
    pub store_history_days: i64,
}

fn default_unpaid_files_lifetime() -> u64 {
    20 * 60
}
fn default_unpaid_files_lifetime_public() -> u64 {
    15 * 60
}
fn default_paid_files_lifetime() -> u64 {
    48 * 3600
}
fn default_store_history_days() -> i64 {
    90
}

impl Default for LifetimesConfig {
    fn default() -> Self {
        Self {
            unpaid_files_lifetime: default_unpaid_files_lifetime(),
            unpaid_files_lifetime_public: default_unpaid_files_lifetime_public(),
            paid_files_lifetime: default_paid_files_lifetime(),
            store_history_days: default_store_history_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_notify_attempts")]
    pub max_notify_attempts: i32,
    #[serde(default = "default_max_download_checks")]
    pub max_download_checks: i32,
    #[serde(default = "default_collector_batch")]
    pub collector_batch: i64,
    #[serde(default = "default_notify_batch")]
    pub notify_batch: i64,
    #[serde(default = "default_check_batch")]
    pub check_batch: i64,
    #[serde(default = "default_reap_limit")]
    pub reap_limit: i64,
    #[serde(default = "default_max_allowed_span_days")]
    pub max_allowed_span_days: u32,
}

fn default_max_notify_attempts() -> i32 {
    3
}
fn default_max_download_checks() -> i32 {
    10
}
fn default_collector_batch() -> i64 {
    10
}
fn default_notify_batch() -> i64 {
    20
}
fn default_check_batch() -> i64 {
    20
}
fn default_reap_limit() -> i64 {
    100
}
fn default_max_allowed_span_days() -> u32 {
    7
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_notify_attempts: default_max_notify_attempts(),
            max_download_checks: default_max_download_checks(),
            collector_batch: default_collector_batch(),
            notify_batch: default_notify_batch(),
            check_batch: default_check_batch(),
            reap_limit: default_reap_limit(),
            max_allowed_span_days: default_max_allowed_span_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty", "json" or "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl NodeConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply environment variable overrides on top of file/default values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = env::var("DB_HOST") {
            self.db.host = host;
        }
        if let Ok(port) = env::var("DB_PORT") {
            if let Ok(port) = port.parse() {
                self.db.port = port;
            }
        }
        if let Ok(user) = env::var("DB_USER") {
            self.db.user = user;
        }
        if let Ok(password) = env::var("DB_PASSWORD") {
            self.db.password = password;
        }
        if let Ok(name) = env::var("DB_NAME") {
            self.db.name = name;
        }

        if let Ok(base_url) = env::var("STORAGE_BASE_URL") {
            self.storage.base_url = base_url;
        }
        if let Ok(login) = env::var("STORAGE_LOGIN") {
            self.storage.login = login;
        }
        if let Ok(password) = env::var("STORAGE_PASSWORD") {
            self.storage.password = password;
        }
        if let Ok(dir) = env::var("BAGS_DIR") {
            self.storage.bags_dir = dir;
        }

        if let Ok(endpoint) = env::var("CHAIN_ENDPOINT") {
            self.chain.endpoint = endpoint;
        }
        if let Ok(endpoint) = env::var("TRANSPORT_ENDPOINT") {
            self.transport.endpoint = endpoint;
        }

        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("LOG_FORMAT") {
            if format == "json" || format == "pretty" || format == "compact" {
                self.logging.format = format;
            }
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            host: self.db.host.clone(),
            port: self.db.port,
            user: self.db.user.clone(),
            password: self.db.password.clone(),
            database: self.db.name.clone(),
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            limits: Limits {
                max_notify_attempts: self.limits.max_notify_attempts,
                max_download_checks: self.limits.max_download_checks,
                collector_batch: self.limits.collector_batch,
                notify_batch: self.limits.notify_batch,
                check_batch: self.limits.check_batch,
                reap_limit: self.limits.reap_limit,
            },
            lifetimes: Lifetimes {
                unpaid_files: Duration::from_secs(self.lifetimes.unpaid_files_lifetime),
                unpaid_files_public: Duration::from_secs(
                    self.lifetimes.unpaid_files_lifetime_public,
                ),
                paid_files: Duration::from_secs(self.lifetimes.paid_files_lifetime),
                store_history_days: self.lifetimes.store_history_days,
            },
        }
    }
}
