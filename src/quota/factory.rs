// ABOUTME: Quota limiter factory with URL-based backend detection and enum dispatch
// ABOUTME: Mirrors the cache factory: SQLite by default, PostgreSQL behind a feature
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{sqlite::SqliteQuotaLimiter, QuotaLimiter, QuotaSubject};
use crate::config::{QuotaConfig, StorageConfig};
use crate::errors::AppResult;
use async_trait::async_trait;
use tracing::info;

#[cfg(feature = "postgresql")]
use super::postgres::PostgresQuotaLimiter;

/// Quota limiter wrapper that delegates to the appropriate backend
#[derive(Clone)]
pub enum Quota {
    /// `SQLite` backend (local development and tests)
    SQLite(SqliteQuotaLimiter),
    /// `PostgreSQL` backend (production)
    #[cfg(feature = "postgresql")]
    PostgreSQL(PostgresQuotaLimiter),
}

impl Quota {
    /// Create a new quota limiter for the configured backend
    ///
    /// The subject kind is bound here once; per-call subject identifiers are
    /// the only varying input afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the connection URL names a backend whose feature is not enabled
    /// - the connection or schema initialization fails
    pub async fn new(
        config: &StorageConfig,
        quota: QuotaConfig,
        subject: QuotaSubject,
    ) -> AppResult<Self> {
        if config.url.is_sqlite() {
            info!("Initializing SQLite quota limiter ({subject:?})");
            let limiter = SqliteQuotaLimiter::new(config, quota, subject).await?;
            Ok(Self::SQLite(limiter))
        } else {
            #[cfg(feature = "postgresql")]
            {
                info!("Initializing PostgreSQL quota limiter ({subject:?})");
                let limiter = PostgresQuotaLimiter::new(config, quota, subject).await?;
                Ok(Self::PostgreSQL(limiter))
            }
            #[cfg(not(feature = "postgresql"))]
            {
                Err(crate::errors::AppError::config(
                    "PostgreSQL support not enabled. Enable the 'postgresql' feature flag.",
                ))
            }
        }
    }
}

#[async_trait]
impl QuotaLimiter for Quota {
    async fn available_quota(&self, subject_id: &str) -> AppResult<i64> {
        match self {
            Self::SQLite(limiter) => limiter.available_quota(subject_id).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(limiter) => limiter.available_quota(subject_id).await,
        }
    }

    async fn ensure_available_quota(&self, subject_id: &str) -> AppResult<()> {
        match self {
            Self::SQLite(limiter) => limiter.ensure_available_quota(subject_id).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(limiter) => limiter.ensure_available_quota(subject_id).await,
        }
    }

    async fn consume_tokens(
        &self,
        input_tokens: i64,
        output_tokens: i64,
        subject_id: &str,
    ) -> AppResult<()> {
        match self {
            Self::SQLite(limiter) => {
                limiter
                    .consume_tokens(input_tokens, output_tokens, subject_id)
                    .await
            }
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(limiter) => {
                limiter
                    .consume_tokens(input_tokens, output_tokens, subject_id)
                    .await
            }
        }
    }

    async fn revoke_quota(&self, subject_id: &str) -> AppResult<()> {
        match self {
            Self::SQLite(limiter) => limiter.revoke_quota(subject_id).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(limiter) => limiter.revoke_quota(subject_id).await,
        }
    }

    async fn increase_quota(&self, subject_id: &str) -> AppResult<()> {
        match self {
            Self::SQLite(limiter) => limiter.increase_quota(subject_id).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(limiter) => limiter.increase_quota(subject_id).await,
        }
    }
}
