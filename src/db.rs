// ABOUTME: Storage connection manager shared by the cache and quota limiters
// ABOUTME: Owns pool creation plus the connectivity and readiness probes
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::config::StorageConfig;
use crate::errors::{AppError, AppResult};
use chrono::{SecondsFormat, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{error, info};

#[cfg(feature = "postgresql")]
use sqlx::postgres::PgPoolOptions;
#[cfg(feature = "postgresql")]
use sqlx::PgPool;

/// Fixed-width RFC 3339 timestamp for `SQLite` text columns, chosen so the
/// backend's lexicographic ordering equals chronological ordering
#[must_use]
pub fn sqlite_now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Open a `SQLite` pool for the configured target
///
/// In-memory databases are pinned to a single long-lived connection so the
/// schema and data survive for the lifetime of the pool.
///
/// # Errors
///
/// Returns a storage error when the connection cannot be established
pub async fn connect_sqlite_pool(config: &StorageConfig) -> AppResult<SqlitePool> {
    let url = config.connection_string();
    // Ensure SQLite creates the database file if it doesn't exist
    let connection_options = if config.url.is_memory() {
        url
    } else {
        format!("{url}?mode=rwc")
    };

    info!("Connecting to SQLite storage");
    let options = if config.url.is_memory() {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new()
            .max_connections(config.pool.max_connections)
            .min_connections(config.pool.min_connections)
            .acquire_timeout(Duration::from_secs(config.pool.acquire_timeout_secs))
    };

    options
        .connect(&connection_options)
        .await
        .map_err(|e| AppError::storage("connect", e))
}

/// Open a `PostgreSQL` pool for the configured target
///
/// # Errors
///
/// Returns a storage error when the connection cannot be established
#[cfg(feature = "postgresql")]
pub async fn connect_postgres_pool(config: &StorageConfig) -> AppResult<PgPool> {
    info!("Connecting to PostgreSQL storage");
    PgPoolOptions::new()
        .max_connections(config.pool.max_connections)
        .min_connections(config.pool.min_connections)
        .acquire_timeout(Duration::from_secs(config.pool.acquire_timeout_secs))
        .connect(&config.connection_string())
        .await
        .map_err(|e| AppError::storage("connect", e))
}

/// Trivial round-trip probe (`SELECT 1`); false on any operational failure
pub async fn sqlite_connected(pool: &SqlitePool) -> bool {
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => true,
        Err(e) => {
            error!("Disconnected from storage: {e}");
            false
        }
    }
}

/// Trivial round-trip probe (`SELECT 1`); false on any operational failure
#[cfg(feature = "postgresql")]
pub async fn postgres_connected(pool: &PgPool) -> bool {
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => true,
        Err(e) => {
            error!("Disconnected from storage: {e}");
            false
        }
    }
}

/// Cheap readiness probe: the pool is open and an idle connection is
/// immediately acquirable. Performs no query round trip.
pub fn sqlite_ready(pool: &SqlitePool) -> bool {
    if pool.is_closed() {
        return false;
    }
    pool.try_acquire().is_some()
}

/// Cheap readiness probe: the pool is open and an idle connection is
/// immediately acquirable. Performs no query round trip.
#[cfg(feature = "postgresql")]
pub fn postgres_ready(pool: &PgPool) -> bool {
    if pool.is_closed() {
        return false;
    }
    pool.try_acquire().is_some()
}
