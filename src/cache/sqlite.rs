// ABOUTME: SQLite-backed conversation cache used for local deployments and tests
// ABOUTME: Stores entry lists as JSON blobs with RFC 3339 timestamps for eviction order
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::ConversationCache;
use crate::config::StorageConfig;
use crate::db::{self, sqlite_now_stamp as now_stamp};
use crate::errors::{AppError, AppResult};
use crate::models::{decode_entries, encode_entries, CacheEntry, ConversationSummary};
use crate::utils::{validate_conversation_key, validate_user_id};
use async_trait::async_trait;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info};

const CREATE_CACHE_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS cache (
        user_id         TEXT NOT NULL,
        conversation_id TEXT NOT NULL,
        value           BLOB,
        topic_summary   TEXT,
        updated_at      TEXT,
        PRIMARY KEY (user_id, conversation_id)
    )
    ";

const CREATE_TIMESTAMP_INDEX: &str = r"
    CREATE INDEX IF NOT EXISTS timestamps ON cache (updated_at)
    ";

/// `SQLite`-backed conversation cache
#[derive(Clone, Debug)]
pub struct SqliteCache {
    pool: SqlitePool,
    capacity: i64,
}

impl SqliteCache {
    /// Connect to the configured database and initialize the schema
    ///
    /// Schema initialization runs as part of connecting; if it fails the
    /// pool is closed before the error propagates, so a value of this type
    /// is never connected-but-uninitialized.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the connection or schema setup fails
    pub async fn new(config: &StorageConfig) -> AppResult<Self> {
        let pool = db::connect_sqlite_pool(config).await?;

        if let Err(e) = Self::initialize_schema(&pool).await {
            pool.close().await;
            return Err(e);
        }

        Ok(Self {
            pool,
            capacity: config.max_entries,
        })
    }

    async fn initialize_schema(pool: &SqlitePool) -> AppResult<()> {
        info!("Initializing table for conversation cache");
        sqlx::query(CREATE_CACHE_TABLE)
            .execute(pool)
            .await
            .map_err(|e| AppError::storage("SqliteCache.initialize_schema", e))?;

        info!("Initializing index for conversation cache");
        sqlx::query(CREATE_TIMESTAMP_INDEX)
            .execute(pool)
            .await
            .map_err(|e| AppError::storage("SqliteCache.initialize_schema", e))?;

        Ok(())
    }

    /// Access the underlying pool (for the connection probes)
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn select_value(
        conn: &mut SqliteConnection,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Option<Vec<u8>>, sqlx::Error> {
        let row = sqlx::query(
            r"
            SELECT value FROM cache
            WHERE user_id = $1 AND conversation_id = $2
            LIMIT 1
            ",
        )
        .bind(user_id)
        .bind(conversation_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.and_then(|r| r.get::<Option<Vec<u8>>, _>("value")))
    }

    /// Delete the globally oldest records until the capacity bound holds.
    /// Runs inside the insert transaction; the count is approximate under
    /// concurrent insert load but converges.
    async fn evict(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cache")
            .fetch_one(&mut *conn)
            .await?;

        let overflow = count - self.capacity;
        if overflow > 0 {
            sqlx::query(
                r"
                DELETE FROM cache WHERE rowid IN
                    (SELECT rowid FROM cache ORDER BY updated_at ASC LIMIT $1)
                ",
            )
            .bind(overflow)
            .execute(&mut *conn)
            .await?;
            debug!("Evicted {overflow} conversation record(s) to enforce capacity");
        }

        Ok(())
    }

    /// Select-then-write sequence run inside the immediate transaction held
    /// on `conn`; the caller commits or rolls back
    async fn append_locked(
        &self,
        conn: &mut SqliteConnection,
        user_id: &str,
        conversation_id: &str,
        entry: CacheEntry,
        topic_summary: &str,
    ) -> AppResult<()> {
        let existing = Self::select_value(conn, user_id, conversation_id)
            .await
            .map_err(|e| AppError::storage("SqliteCache.insert_or_append", e))?;

        match existing {
            Some(value) => {
                let mut entries = decode_entries(&value)?;
                entries.push(entry);
                sqlx::query(
                    r"
                    UPDATE cache
                    SET value = $1, updated_at = $2
                    WHERE user_id = $3 AND conversation_id = $4
                    ",
                )
                .bind(encode_entries(&entries)?)
                .bind(now_stamp())
                .bind(user_id)
                .bind(conversation_id)
                .execute(&mut *conn)
                .await
                .map_err(|e| AppError::storage("SqliteCache.insert_or_append", e))?;
            }
            None => {
                sqlx::query(
                    r"
                    INSERT INTO cache (user_id, conversation_id, value, topic_summary, updated_at)
                    VALUES ($1, $2, $3, $4, $5)
                    ",
                )
                .bind(user_id)
                .bind(conversation_id)
                .bind(encode_entries(std::slice::from_ref(&entry))?)
                .bind(topic_summary)
                .bind(now_stamp())
                .execute(&mut *conn)
                .await
                .map_err(|e| AppError::storage("SqliteCache.insert_or_append", e))?;

                // Only the insert branch grows the record count
                self.evict(conn)
                    .await
                    .map_err(|e| AppError::storage("SqliteCache.insert_or_append", e))?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ConversationCache for SqliteCache {
    async fn get(
        &self,
        user_id: &str,
        conversation_id: &str,
        skip_user_id_check: bool,
    ) -> AppResult<Vec<CacheEntry>> {
        validate_conversation_key(user_id, conversation_id, skip_user_id_check)?;

        let row = sqlx::query(
            r"
            SELECT value FROM cache
            WHERE user_id = $1 AND conversation_id = $2
            LIMIT 1
            ",
        )
        .bind(user_id)
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::storage("SqliteCache.get", e))?;

        match row.and_then(|r| r.get::<Option<Vec<u8>>, _>("value")) {
            Some(value) => decode_entries(&value),
            None => Ok(Vec::new()),
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
        validate_conversation_key(user_id, conversation_id, skip_user_id_check)?;

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::storage("SqliteCache.insert_or_append", e))?;

        // Take the write lock up front. A deferred transaction would start
        // as a read and fail at the write upgrade when another connection
        // appends concurrently; with an immediate one the writers queue on
        // the busy timeout and appends to the same key all land.
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::storage("SqliteCache.insert_or_append", e))?;

        match self
            .append_locked(&mut conn, user_id, conversation_id, entry, topic_summary)
            .await
        {
            Ok(()) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| AppError::storage("SqliteCache.insert_or_append", e))?;
                Ok(())
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }

    async fn delete(
        &self,
        user_id: &str,
        conversation_id: &str,
        skip_user_id_check: bool,
    ) -> AppResult<bool> {
        validate_conversation_key(user_id, conversation_id, skip_user_id_check)?;

        let result = sqlx::query(
            r"
            DELETE FROM cache
            WHERE user_id = $1 AND conversation_id = $2
            ",
        )
        .bind(user_id)
        .bind(conversation_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::storage("SqliteCache.delete", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(
        &self,
        user_id: &str,
        skip_user_id_check: bool,
    ) -> AppResult<Vec<ConversationSummary>> {
        validate_user_id(user_id, skip_user_id_check)?;

        let rows = sqlx::query(
            r"
            SELECT conversation_id, topic_summary
            FROM cache
            WHERE user_id = $1
            ORDER BY updated_at DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::storage("SqliteCache.list", e))?;

        Ok(rows
            .into_iter()
            .map(|r| ConversationSummary {
                conversation_id: r.get("conversation_id"),
                topic_summary: r
                    .get::<Option<String>, _>("topic_summary")
                    .unwrap_or_default(),
            })
            .collect())
    }

    async fn connected(&self) -> bool {
        db::sqlite_connected(&self.pool).await
    }

    fn ready(&self) -> bool {
        db::sqlite_ready(&self.pool)
    }
}
