// ABOUTME: Token usage history keyed by user, provider, and model
// ABOUTME: Running totals are upserted in one statement per consumption event
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::config::StorageConfig;
use crate::db::{self, sqlite_now_stamp};
use crate::errors::{AppError, AppResult};
use sqlx::SqlitePool;
use tracing::{debug, info};

#[cfg(feature = "postgresql")]
use chrono::Utc;
#[cfg(feature = "postgresql")]
use sqlx::PgPool;

const CREATE_TOKEN_USAGE_TABLE_SQLITE: &str = r"
    CREATE TABLE IF NOT EXISTS token_usage (
        user_id       TEXT NOT NULL,
        provider      TEXT NOT NULL,
        model         TEXT NOT NULL,
        input_tokens  INTEGER,
        output_tokens INTEGER,
        updated_at    TEXT,
        PRIMARY KEY (user_id, provider, model)
    )
    ";

#[cfg(feature = "postgresql")]
const CREATE_TOKEN_USAGE_TABLE_POSTGRES: &str = r"
    CREATE TABLE IF NOT EXISTS token_usage (
        user_id       TEXT NOT NULL,
        provider      TEXT NOT NULL,
        model         TEXT NOT NULL,
        input_tokens  BIGINT,
        output_tokens BIGINT,
        updated_at    TIMESTAMPTZ,
        PRIMARY KEY (user_id, provider, model)
    )
    ";

const CONSUME_TOKENS_UPSERT: &str = r"
    INSERT INTO token_usage (user_id, provider, model, input_tokens, output_tokens, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT (user_id, provider, model)
    DO UPDATE SET
        input_tokens = token_usage.input_tokens + $4,
        output_tokens = token_usage.output_tokens + $5,
        updated_at = $6
    ";

#[derive(Clone)]
enum UsageBackend {
    SQLite(SqlitePool),
    #[cfg(feature = "postgresql")]
    PostgreSQL(PgPool),
}

/// Storage for per-user, per-model token usage history
#[derive(Clone)]
pub struct TokenUsageHistory {
    backend: UsageBackend,
}

impl TokenUsageHistory {
    /// Connect to the configured database and initialize the usage table
    ///
    /// On schema failure the pool is closed before the error propagates.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the connection URL names a backend whose feature is not enabled
    /// - the connection or schema initialization fails
    pub async fn new(config: &StorageConfig) -> AppResult<Self> {
        if config.url.is_sqlite() {
            let pool = db::connect_sqlite_pool(config).await?;
            info!("Initializing table for token usage history");
            if let Err(e) = sqlx::query(CREATE_TOKEN_USAGE_TABLE_SQLITE)
                .execute(&pool)
                .await
            {
                pool.close().await;
                return Err(AppError::storage("TokenUsageHistory.initialize_schema", e));
            }
            Ok(Self {
                backend: UsageBackend::SQLite(pool),
            })
        } else {
            #[cfg(feature = "postgresql")]
            {
                let pool = db::connect_postgres_pool(config).await?;
                info!("Initializing table for token usage history");
                if let Err(e) = sqlx::query(CREATE_TOKEN_USAGE_TABLE_POSTGRES)
                    .execute(&pool)
                    .await
                {
                    pool.close().await;
                    return Err(AppError::storage("TokenUsageHistory.initialize_schema", e));
                }
                Ok(Self {
                    backend: UsageBackend::PostgreSQL(pool),
                })
            }
            #[cfg(not(feature = "postgresql"))]
            {
                Err(AppError::config(
                    "PostgreSQL support not enabled. Enable the 'postgresql' feature flag.",
                ))
            }
        }
    }

    /// Add consumed token counts to the running totals for
    /// `(user_id, provider, model)`
    ///
    /// # Errors
    ///
    /// Returns a storage error on backend failure
    pub async fn record_usage(
        &self,
        user_id: &str,
        provider: &str,
        model: &str,
        input_tokens: i64,
        output_tokens: i64,
    ) -> AppResult<()> {
        debug!(
            "Token usage for user {user_id}, provider {provider} and model {model} \
             changed by {input_tokens}, {output_tokens} tokens"
        );

        match &self.backend {
            UsageBackend::SQLite(pool) => {
                sqlx::query(CONSUME_TOKENS_UPSERT)
                    .bind(user_id)
                    .bind(provider)
                    .bind(model)
                    .bind(input_tokens)
                    .bind(output_tokens)
                    .bind(sqlite_now_stamp())
                    .execute(pool)
                    .await
                    .map_err(|e| AppError::storage("TokenUsageHistory.record_usage", e))?;
            }
            #[cfg(feature = "postgresql")]
            UsageBackend::PostgreSQL(pool) => {
                sqlx::query(CONSUME_TOKENS_UPSERT)
                    .bind(user_id)
                    .bind(provider)
                    .bind(model)
                    .bind(input_tokens)
                    .bind(output_tokens)
                    .bind(Utc::now())
                    .execute(pool)
                    .await
                    .map_err(|e| AppError::storage("TokenUsageHistory.record_usage", e))?;
            }
        }

        Ok(())
    }

    /// Read back the running totals for `(user_id, provider, model)`
    ///
    /// Returns `None` when no usage has been recorded yet.
    ///
    /// # Errors
    ///
    /// Returns a storage error on backend failure
    pub async fn usage_totals(
        &self,
        user_id: &str,
        provider: &str,
        model: &str,
    ) -> AppResult<Option<(i64, i64)>> {
        const SELECT_TOTALS: &str = r"
            SELECT input_tokens, output_tokens FROM token_usage
            WHERE user_id = $1 AND provider = $2 AND model = $3
            ";

        use sqlx::Row;

        match &self.backend {
            UsageBackend::SQLite(pool) => {
                let row = sqlx::query(SELECT_TOTALS)
                    .bind(user_id)
                    .bind(provider)
                    .bind(model)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| AppError::storage("TokenUsageHistory.usage_totals", e))?;
                Ok(row.map(|r| {
                    (
                        r.get::<Option<i64>, _>("input_tokens").unwrap_or(0),
                        r.get::<Option<i64>, _>("output_tokens").unwrap_or(0),
                    )
                }))
            }
            #[cfg(feature = "postgresql")]
            UsageBackend::PostgreSQL(pool) => {
                let row = sqlx::query(SELECT_TOTALS)
                    .bind(user_id)
                    .bind(provider)
                    .bind(model)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| AppError::storage("TokenUsageHistory.usage_totals", e))?;
                Ok(row.map(|r| {
                    (
                        r.get::<Option<i64>, _>("input_tokens").unwrap_or(0),
                        r.get::<Option<i64>, _>("output_tokens").unwrap_or(0),
                    )
                }))
            }
        }
    }

    /// Full connectivity probe (one query round trip); never errors
    pub async fn connected(&self) -> bool {
        match &self.backend {
            UsageBackend::SQLite(pool) => db::sqlite_connected(pool).await,
            #[cfg(feature = "postgresql")]
            UsageBackend::PostgreSQL(pool) => db::postgres_connected(pool).await,
        }
    }
}
