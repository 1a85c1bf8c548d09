//! API configuration
//!
//! Loaded once at startup from `API_*` environment variables (after
//! `dotenvy` has read `.env`) and handed to the components that need it.

use std::path::PathBuf;
use std::time::Duration;

use core_kernel::Timezone;
use domain_ledger::{LedgerConfig, ReportRetention};
use infra_db::DatabaseConfig;
use serde::Deserialize;

/// Where ledger state lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    /// Process-local store, lost on restart
    Memory,
}

/// API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database URL, used when `storage` is `postgres`
    pub database_url: String,
    pub storage: StorageBackend,
    /// Log level or `EnvFilter` directive
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Base of the links returned for generated reports
    pub public_base_url: String,
    /// Directory holding report files
    pub report_dir: PathBuf,
    pub report_retention: ReportRetention,
    /// IANA zone in which report months are interpreted
    pub report_timezone: Timezone,
    pub lock_timeout_ms: u64,
    pub default_page_limit: u64,
    /// Open reservations older than this are released; unset disables the reaper
    pub reservation_ttl_secs: Option<u64>,
    pub reaper_interval_secs: u64,
    pub db_max_connections: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: "postgres://localhost/balance".to_string(),
            storage: StorageBackend::Postgres,
            log_level: "info".to_string(),
            log_json: false,
            public_base_url: "http://localhost:8080".to_string(),
            report_dir: PathBuf::from("reports"),
            report_retention: ReportRetention::KeepHistory,
            report_timezone: Timezone::default(),
            lock_timeout_ms: 5_000,
            default_page_limit: 1_000,
            reservation_ttl_secs: None,
            reaper_interval_secs: 60,
            db_max_connections: 10,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment, falling back to defaults per field
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Absolute link under which a report can be downloaded
    pub fn report_link(&self, hash: &str) -> String {
        format!("{}/api/report/{}", self.public_base_url.trim_end_matches('/'), hash)
    }

    pub fn to_ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
            default_page_limit: self.default_page_limit,
            report_retention: self.report_retention,
            report_timezone: self.report_timezone,
            reservation_ttl: self.reservation_ttl_secs.map(Duration::from_secs),
        }
    }

    pub fn to_database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database_url.clone(), self.db_max_connections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_convert_to_ledger_config() {
        let config = ApiConfig::default();
        let ledger = config.to_ledger_config();

        assert_eq!(ledger.lock_timeout, Duration::from_secs(5));
        assert_eq!(ledger.default_page_limit, 1000);
        assert_eq!(ledger.report_retention, ReportRetention::KeepHistory);
        assert!(ledger.reservation_ttl.is_none());
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_report_link_trims_trailing_slash() {
        let config = ApiConfig {
            public_base_url: "https://balance.example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.report_link("ab"),
            "https://balance.example.com/api/report/ab"
        );
    }

    #[test]
    fn test_database_config_uses_pool_size() {
        let config = ApiConfig {
            db_max_connections: 3,
            ..Default::default()
        };
        let db = config.to_database_config();
        assert_eq!(db.max_connections, 3);
        assert_eq!(db.min_connections, 2);
        assert_eq!(db.url, "postgres://localhost/balance");
    }

    #[test]
    fn test_values_deserialize_from_strings() {
        let config: ApiConfig = config::Config::builder()
            .set_override("storage", "memory")
            .and_then(|b| b.set_override("report_retention", "single_slot"))
            .and_then(|b| b.set_override("report_timezone", "Europe/Moscow"))
            .and_then(|b| b.set_override("reservation_ttl_secs", 900i64))
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.report_retention, ReportRetention::SingleSlot);
        assert_eq!(config.report_timezone.name(), "Europe/Moscow");
        assert_eq!(config.to_ledger_config().reservation_ttl, Some(Duration::from_secs(900)));
        assert_eq!(config.port, 8080);
    }
}
