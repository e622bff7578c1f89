// ABOUTME: PostgreSQL-backed quota limiter for production deployments
// ABOUTME: Single-statement clamped decrements keep budgets non-negative under concurrency
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{QuotaLimiter, QuotaSubject};
use crate::config::{QuotaConfig, StorageConfig};
use crate::db;
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

const CREATE_QUOTA_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS quota_limits (
        id          TEXT NOT NULL,
        subject     TEXT NOT NULL,
        quota_limit BIGINT,
        available   BIGINT,
        updated_at  TIMESTAMPTZ,
        revoked_at  TIMESTAMPTZ,
        PRIMARY KEY (id, subject)
    )
    ";

/// `PostgreSQL`-backed quota limiter
#[derive(Clone)]
pub struct PostgresQuotaLimiter {
    pool: PgPool,
    subject: QuotaSubject,
    initial_quota: i64,
    increase_by: i64,
}

impl PostgresQuotaLimiter {
    /// Connect to the configured database and initialize the quota table
    ///
    /// On schema failure the pool is closed before the error propagates.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the connection or schema setup fails
    pub async fn new(
        config: &StorageConfig,
        quota: QuotaConfig,
        subject: QuotaSubject,
    ) -> AppResult<Self> {
        let pool = db::connect_postgres_pool(config).await?;

        info!("Initializing table for quota limiter");
        if let Err(e) = sqlx::query(CREATE_QUOTA_TABLE).execute(&pool).await {
            pool.close().await;
            return Err(AppError::storage(
                "PostgresQuotaLimiter.initialize_schema",
                e,
            ));
        }

        Ok(Self {
            pool,
            subject,
            initial_quota: quota.initial_quota,
            increase_by: quota.increase_by,
        })
    }

    /// Create the budget record for a subject seen for the first time
    async fn init_quota(&self, subject_id: &str) -> Result<(), sqlx::Error> {
        debug!(
            "Initializing quota record for subject '{subject_id}' with {} tokens",
            self.initial_quota
        );
        sqlx::query(
            r"
            INSERT INTO quota_limits (id, subject, quota_limit, available, updated_at)
            VALUES ($1, $2, $3, $3, $4)
            ON CONFLICT (id, subject) DO NOTHING
            ",
        )
        .bind(subject_id)
        .bind(self.subject.as_str())
        .bind(self.initial_quota)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn select_available(&self, subject_id: &str) -> Result<Option<i64>, sqlx::Error> {
        let row = sqlx::query(
            r"
            SELECT available FROM quota_limits
            WHERE id = $1 AND subject = $2
            ",
        )
        .bind(subject_id)
        .bind(self.subject.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get::<Option<i64>, _>("available").unwrap_or(0)))
    }
}

#[async_trait]
impl QuotaLimiter for PostgresQuotaLimiter {
    async fn available_quota(&self, subject_id: &str) -> AppResult<i64> {
        let available = self
            .select_available(subject_id)
            .await
            .map_err(|e| AppError::storage("PostgresQuotaLimiter.available_quota", e))?;

        match available {
            Some(value) => Ok(value),
            None => {
                self.init_quota(subject_id)
                    .await
                    .map_err(|e| AppError::storage("PostgresQuotaLimiter.available_quota", e))?;
                Ok(self.initial_quota)
            }
        }
    }

    async fn ensure_available_quota(&self, subject_id: &str) -> AppResult<()> {
        let available = self.available_quota(subject_id).await?;
        if available <= 0 {
            return Err(AppError::quota_exceeded(format!(
                "no tokens left for subject '{subject_id}'"
            )));
        }
        Ok(())
    }

    async fn consume_tokens(
        &self,
        input_tokens: i64,
        output_tokens: i64,
        subject_id: &str,
    ) -> AppResult<()> {
        let total = input_tokens + output_tokens;
        debug!("Consuming {total} token(s) for subject '{subject_id}'");

        // Clamped in one statement so the counter never observes a negative
        // value, even with concurrent consumers
        let update = r"
            UPDATE quota_limits
            SET available = GREATEST(available - $1, 0), updated_at = $2
            WHERE id = $3 AND subject = $4
            ";

        let result = sqlx::query(update)
            .bind(total)
            .bind(Utc::now())
            .bind(subject_id)
            .bind(self.subject.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::storage("PostgresQuotaLimiter.consume_tokens", e))?;

        if result.rows_affected() == 0 {
            self.init_quota(subject_id)
                .await
                .map_err(|e| AppError::storage("PostgresQuotaLimiter.consume_tokens", e))?;
            sqlx::query(update)
                .bind(total)
                .bind(Utc::now())
                .bind(subject_id)
                .bind(self.subject.as_str())
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::storage("PostgresQuotaLimiter.consume_tokens", e))?;
        }

        Ok(())
    }

    async fn revoke_quota(&self, subject_id: &str) -> AppResult<()> {
        debug!("Revoking quota for subject '{subject_id}'");
        let result = sqlx::query(
            r"
            UPDATE quota_limits
            SET available = quota_limit, revoked_at = $1
            WHERE id = $2 AND subject = $3
            ",
        )
        .bind(Utc::now())
        .bind(subject_id)
        .bind(self.subject.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::storage("PostgresQuotaLimiter.revoke_quota", e))?;

        if result.rows_affected() == 0 {
            self.init_quota(subject_id)
                .await
                .map_err(|e| AppError::storage("PostgresQuotaLimiter.revoke_quota", e))?;
        }

        Ok(())
    }

    async fn increase_quota(&self, subject_id: &str) -> AppResult<()> {
        debug!(
            "Increasing quota for subject '{subject_id}' by {}",
            self.increase_by
        );
        let update = r"
            UPDATE quota_limits
            SET available = available + $1, revoked_at = $2
            WHERE id = $3 AND subject = $4
            ";

        let result = sqlx::query(update)
            .bind(self.increase_by)
            .bind(Utc::now())
            .bind(subject_id)
            .bind(self.subject.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::storage("PostgresQuotaLimiter.increase_quota", e))?;

        if result.rows_affected() == 0 {
            self.init_quota(subject_id)
                .await
                .map_err(|e| AppError::storage("PostgresQuotaLimiter.increase_quota", e))?;
            sqlx::query(update)
                .bind(self.increase_by)
                .bind(Utc::now())
                .bind(subject_id)
                .bind(self.subject.as_str())
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::storage("PostgresQuotaLimiter.increase_quota", e))?;
        }

        Ok(())
    }
}
