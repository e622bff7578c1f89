// ABOUTME: Storage and quota configuration types with environment-based loading
// ABOUTME: Handles connection URLs, pool sizing, and cache capacity settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Default number of conversation records retained across all users
pub const DEFAULT_MAX_ENTRIES: i64 = 1000;

fn env_var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_owned())
}

/// Type-safe database connection target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DatabaseUrl {
    /// `SQLite` database with file path
    SQLite {
        /// Path to `SQLite` database file
        path: PathBuf,
    },
    /// `PostgreSQL` connection
    PostgreSQL {
        /// `PostgreSQL` connection string
        connection_string: String,
    },
    /// In-memory `SQLite` (for testing)
    Memory,
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::Memory
    }
}

impl DatabaseUrl {
    /// Parse from string with validation
    ///
    /// # Errors
    ///
    /// Returns an error if the database URL format is invalid or unsupported
    pub fn parse_url(s: &str) -> AppResult<Self> {
        if let Some(path_str) = s.strip_prefix("sqlite:") {
            if path_str == ":memory:" {
                Ok(Self::Memory)
            } else {
                Ok(Self::SQLite {
                    path: PathBuf::from(path_str),
                })
            }
        } else if s.starts_with("postgresql://") || s.starts_with("postgres://") {
            Ok(Self::PostgreSQL {
                connection_string: s.to_owned(),
            })
        } else if s.is_empty() {
            Err(AppError::config("empty database URL"))
        } else {
            // Fallback: treat as SQLite file path
            Ok(Self::SQLite {
                path: PathBuf::from(s),
            })
        }
    }

    /// Convert to connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::PostgreSQL { connection_string } => connection_string.clone(),
            Self::Memory => "sqlite::memory:".into(),
        }
    }

    /// Check if this is an in-memory database
    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }

    /// Check if this is a `SQLite` database
    #[must_use]
    pub const fn is_sqlite(&self) -> bool {
        matches!(self, Self::SQLite { .. } | Self::Memory)
    }
}

/// Backing store configuration for the cache and quota limiters
///
/// The field set mirrors what a `PostgreSQL` deployment needs (host, port,
/// credentials, TLS and GSS modes); for `SQLite` only `url` is consulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database connection target
    pub url: DatabaseUrl,
    /// `PostgreSQL` host
    pub host: String,
    /// `PostgreSQL` port
    pub port: u16,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Database name
    pub dbname: String,
    /// `sslmode` connection parameter (for example `prefer` or `require`)
    pub ssl_mode: String,
    /// Path to CA certificate used for TLS verification
    pub ca_cert_path: Option<PathBuf>,
    /// `gssencmode` connection parameter
    pub gss_encmode: String,
    /// Maximum number of conversation records retained across all users
    pub max_entries: i64,
    /// Connection pool sizing
    pub pool: PoolConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: DatabaseUrl::Memory,
            host: "localhost".to_owned(),
            port: 5432,
            user: "postgres".to_owned(),
            password: String::new(),
            dbname: "cache".to_owned(),
            ssl_mode: "prefer".to_owned(),
            ca_cert_path: None,
            gss_encmode: "prefer".to_owned(),
            max_entries: DEFAULT_MAX_ENTRIES,
            pool: PoolConfig::default(),
        }
    }
}

impl StorageConfig {
    /// Load storage configuration from environment
    ///
    /// `DATABASE_URL`, when set, wins over the individual `POSTGRES_*`
    /// values; otherwise a `PostgreSQL` URL is assembled from them.
    ///
    /// # Errors
    ///
    /// Returns an error if environment values fail to parse
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self {
            host: env_var_or("POSTGRES_HOST", "localhost"),
            port: env_var_or("POSTGRES_PORT", "5432")
                .parse()
                .map_err(|e| AppError::config(format!("invalid POSTGRES_PORT: {e}")))?,
            user: env_var_or("POSTGRES_USER", "postgres"),
            password: env_var_or("POSTGRES_PASSWORD", ""),
            dbname: env_var_or("POSTGRES_DB", "cache"),
            ssl_mode: env_var_or("POSTGRES_SSL_MODE", "prefer"),
            ca_cert_path: env::var("POSTGRES_CA_CERT_PATH").ok().map(PathBuf::from),
            gss_encmode: env_var_or("POSTGRES_GSS_ENCMODE", "prefer"),
            max_entries: env_var_or("CACHE_MAX_ENTRIES", &DEFAULT_MAX_ENTRIES.to_string())
                .parse()
                .map_err(|e| AppError::config(format!("invalid CACHE_MAX_ENTRIES: {e}")))?,
            pool: PoolConfig::from_env(),
            url: DatabaseUrl::Memory,
        };

        config.url = match env::var("DATABASE_URL") {
            Ok(raw) => DatabaseUrl::parse_url(&raw)?,
            Err(_) => DatabaseUrl::PostgreSQL {
                connection_string: config.postgres_connection_string(),
            },
        };

        Ok(config)
    }

    /// Render a `PostgreSQL` connection string from the individual fields,
    /// carrying the TLS and GSS settings as query parameters
    #[must_use]
    pub fn postgres_connection_string(&self) -> String {
        let mut url = format!(
            "postgresql://{}:{}@{}:{}/{}?sslmode={}&gssencmode={}",
            self.user, self.password, self.host, self.port, self.dbname, self.ssl_mode,
            self.gss_encmode,
        );
        if let Some(ca) = &self.ca_cert_path {
            url.push_str(&format!("&sslrootcert={}", ca.display()));
        }
        url
    }

    /// Connection string for the configured target
    #[must_use]
    pub fn connection_string(&self) -> String {
        self.url.to_connection_string()
    }
}

/// Connection pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout_secs: 30,
        }
    }
}

impl PoolConfig {
    /// Load pool configuration from environment (or defaults)
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_connections: env::var("POSTGRES_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_connections),
            min_connections: env::var("POSTGRES_MIN_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.min_connections),
            acquire_timeout_secs: env::var("POSTGRES_ACQUIRE_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.acquire_timeout_secs),
        }
    }
}

/// Quota limiter configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct QuotaConfig {
    /// Budget granted to a subject on first use
    pub initial_quota: i64,
    /// Amount added by each `increase_quota` grant
    pub increase_by: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url_memory() {
        let url = DatabaseUrl::parse_url("sqlite::memory:").unwrap();
        assert!(url.is_memory());
        assert_eq!(url.to_connection_string(), "sqlite::memory:");
    }

    #[test]
    fn test_parse_url_sqlite_file() {
        let url = DatabaseUrl::parse_url("sqlite:data/cache.db").unwrap();
        assert!(url.is_sqlite());
        assert!(!url.is_memory());
    }

    #[test]
    fn test_parse_url_postgres() {
        let url = DatabaseUrl::parse_url("postgresql://user:pw@host:5432/db").unwrap();
        assert!(!url.is_sqlite());
    }

    #[test]
    fn test_parse_url_empty_is_error() {
        assert!(DatabaseUrl::parse_url("").is_err());
    }

    #[test]
    fn test_postgres_connection_string_carries_tls_params() {
        let config = StorageConfig {
            ca_cert_path: Some(PathBuf::from("/etc/certs/ca.crt")),
            ssl_mode: "require".to_owned(),
            ..StorageConfig::default()
        };
        let url = config.postgres_connection_string();
        assert!(url.contains("sslmode=require"));
        assert!(url.contains("sslrootcert=/etc/certs/ca.crt"));
        assert!(url.contains("gssencmode=prefer"));
    }
}
