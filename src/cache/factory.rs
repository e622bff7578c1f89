// ABOUTME: Cache factory with URL-based backend detection and enum dispatch
// ABOUTME: Follows the provider pattern: SQLite by default, PostgreSQL behind a feature
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{sqlite::SqliteCache, ConversationCache};
use crate::config::StorageConfig;
use crate::errors::AppResult;
use crate::models::{CacheEntry, ConversationSummary};
use async_trait::async_trait;
use tracing::info;

#[cfg(feature = "postgresql")]
use super::postgres::PostgresCache;

/// Cache instance wrapper that delegates to the appropriate backend
#[derive(Clone, Debug)]
pub enum Cache {
    /// `SQLite` backend (local development and tests)
    SQLite(SqliteCache),
    /// `PostgreSQL` backend (production)
    #[cfg(feature = "postgresql")]
    PostgreSQL(PostgresCache),
}

impl Cache {
    /// Get a descriptive string for the current backend
    #[must_use]
    pub const fn backend_info(&self) -> &'static str {
        match self {
            Self::SQLite(_) => "SQLite",
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(_) => "PostgreSQL",
        }
    }

    /// Create a new cache instance for the configured backend
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the connection URL names a backend whose feature is not enabled
    /// - the connection or schema initialization fails
    pub async fn new(config: &StorageConfig) -> AppResult<Self> {
        if config.url.is_sqlite() {
            info!("Initializing SQLite conversation cache");
            let cache = SqliteCache::new(config).await?;
            Ok(Self::SQLite(cache))
        } else {
            #[cfg(feature = "postgresql")]
            {
                info!("Initializing PostgreSQL conversation cache");
                let cache = PostgresCache::new(config).await?;
                Ok(Self::PostgreSQL(cache))
            }
            #[cfg(not(feature = "postgresql"))]
            {
                Err(crate::errors::AppError::config(
                    "PostgreSQL support not enabled. Enable the 'postgresql' feature flag.",
                ))
            }
        }
    }

    /// Create a cache from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if the environment configuration is invalid or the
    /// backend cannot be reached
    pub async fn from_env() -> AppResult<Self> {
        let config = StorageConfig::from_env()?;
        Self::new(&config).await
    }
}

#[async_trait]
impl ConversationCache for Cache {
    async fn get(
        &self,
        user_id: &str,
        conversation_id: &str,
        skip_user_id_check: bool,
    ) -> AppResult<Vec<CacheEntry>> {
        match self {
            Self::SQLite(cache) => cache.get(user_id, conversation_id, skip_user_id_check).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(cache) => {
                cache.get(user_id, conversation_id, skip_user_id_check).await
            }
        }
    }

    async fn insert_or_append(
        &self,
        user_id: &str,
        conversation_id: &str,
        entry: CacheEntry,
        topic_summary: &str,
        skip_user_id_check: bool,
    ) -> AppResult<()> {
        match self {
            Self::SQLite(cache) => {
                cache
                    .insert_or_append(
                        user_id,
                        conversation_id,
                        entry,
                        topic_summary,
                        skip_user_id_check,
                    )
                    .await
            }
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(cache) => {
                cache
                    .insert_or_append(
                        user_id,
                        conversation_id,
                        entry,
                        topic_summary,
                        skip_user_id_check,
                    )
                    .await
            }
        }
    }

    async fn delete(
        &self,
        user_id: &str,
        conversation_id: &str,
        skip_user_id_check: bool,
    ) -> AppResult<bool> {
        match self {
            Self::SQLite(cache) => {
                cache
                    .delete(user_id, conversation_id, skip_user_id_check)
                    .await
            }
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(cache) => {
                cache
                    .delete(user_id, conversation_id, skip_user_id_check)
                    .await
            }
        }
    }

    async fn list(
        &self,
        user_id: &str,
        skip_user_id_check: bool,
    ) -> AppResult<Vec<ConversationSummary>> {
        match self {
            Self::SQLite(cache) => cache.list(user_id, skip_user_id_check).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(cache) => cache.list(user_id, skip_user_id_check).await,
        }
    }

    async fn connected(&self) -> bool {
        match self {
            Self::SQLite(cache) => cache.connected().await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(cache) => cache.connected().await,
        }
    }

    fn ready(&self) -> bool {
        match self {
            Self::SQLite(cache) => cache.ready(),
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(cache) => cache.ready(),
        }
    }
}
