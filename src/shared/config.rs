use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub network: NetworkConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub base_url: String,
    /// Seconds. A timeout counts as connectivity absent.
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub auto_sync: bool,
    /// Queue entries older than this are discarded instead of replayed.
    pub expiry_hours: u64,
    pub max_retries: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: default_database_url(),
                max_connections: 5,
                connection_timeout: 30,
            },
            network: NetworkConfig {
                base_url: "http://localhost:8080/api".to_string(),
                request_timeout: 15,
            },
            sync: SyncConfig::default(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            expiry_hours: 24,
            max_retries: 5,
        }
    }
}

/// Ten years; longer horizons are rejected by [`AppConfig::validate`].
pub const MAX_EXPIRY_HOURS: u64 = 24 * 365 * 10;

impl SyncConfig {
    /// Saturates instead of overflowing for unvalidated values.
    pub fn expiry(&self) -> chrono::Duration {
        i64::try_from(self.expiry_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .unwrap_or(chrono::Duration::MAX)
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("TASKBOARD_DATABASE_URL") {
            let v = v.trim();
            if !v.is_empty() {
                cfg.database.url = v.to_string();
            }
        }
        if let Some(v) = lookup("TASKBOARD_DATABASE_MAX_CONNECTIONS")
            && let Some(value) = parse_u32(&v)
        {
            cfg.database.max_connections = value;
        }
        if let Some(v) = lookup("TASKBOARD_API_BASE_URL") {
            let v = v.trim().trim_end_matches('/');
            if !v.is_empty() {
                cfg.network.base_url = v.to_string();
            }
        }
        if let Some(v) = lookup("TASKBOARD_REQUEST_TIMEOUT_SECS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.network.request_timeout = value;
        }
        if let Some(v) = lookup("TASKBOARD_AUTO_SYNC") {
            cfg.sync.auto_sync = parse_bool(&v, cfg.sync.auto_sync);
        }
        if let Some(v) = lookup("TASKBOARD_QUEUE_EXPIRY_HOURS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.sync.expiry_hours = value;
        }
        if let Some(v) = lookup("TASKBOARD_MAX_RETRIES")
            && let Some(value) = parse_u32(&v)
        {
            cfg.sync.max_retries = value;
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.trim().is_empty() {
            return Err("Database url must not be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.network.request_timeout == 0 {
            return Err("Network request_timeout must be greater than 0".to_string());
        }
        if !(self.network.base_url.starts_with("http://")
            || self.network.base_url.starts_with("https://"))
        {
            return Err("Network base_url must be an http(s) url".to_string());
        }
        if self.sync.expiry_hours == 0 {
            return Err("Sync expiry_hours must be greater than 0".to_string());
        }
        if self.sync.expiry_hours > MAX_EXPIRY_HOURS {
            return Err(format!(
                "Sync expiry_hours must be at most {MAX_EXPIRY_HOURS}"
            ));
        }
        if self.sync.max_retries == 0 {
            return Err("Sync max_retries must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn default_database_url() -> String {
    let dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("./data"))
        .join("taskboard");
    format!("sqlite://{}?mode=rwc", dir.join("sync.db").display())
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn parse_u32(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}
