// ABOUTME: Conversation cache abstraction with pluggable relational backends
// ABOUTME: Bounded by a global capacity enforced through LRU-by-last-write eviction
//
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Cache factory for backend selection from the connection URL
pub mod factory;
/// `SQLite` cache implementation
pub mod sqlite;

#[cfg(feature = "postgresql")]
/// `PostgreSQL` cache implementation
pub mod postgres;

use crate::errors::AppResult;
use crate::models::{CacheEntry, ConversationSummary};
use async_trait::async_trait;

pub use factory::Cache;

/// Conversation cache contract
///
/// Maps `(user_id, conversation_id)` to an ordered list of conversation
/// turns. A record exists if and only if at least one entry has been
/// inserted for its key, and the total record count never exceeds the
/// configured capacity: enforcement happens synchronously inside the insert
/// path, evicting the globally least-recently-updated records across all
/// users. Both identifiers are validated as canonical UUIDs before any
/// backend I/O unless `skip_user_id_check` relaxes the `user_id` check.
#[async_trait]
pub trait ConversationCache: Send + Sync {
    /// Get the conversation history for the given key
    ///
    /// Returns an empty list (not an error) when no record exists.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdentifier` on malformed identifiers (before any
    /// backend call), or a storage error wrapping the underlying cause.
    async fn get(
        &self,
        user_id: &str,
        conversation_id: &str,
        skip_user_id_check: bool,
    ) -> AppResult<Vec<CacheEntry>>;

    /// Append an entry to the conversation, creating the record on first use
    ///
    /// Runs as one transaction: the current entry list is re-read, the entry
    /// appended and written back with a refreshed timestamp; a brand-new
    /// record also stores `topic_summary` and triggers capacity enforcement.
    /// Concurrent appends to the same key serialize; no partial update is
    /// ever visible.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdentifier` on malformed identifiers, or a storage
    /// error if any step of the transaction fails (the whole step rolls
    /// back).
    async fn insert_or_append(
        &self,
        user_id: &str,
        conversation_id: &str,
        entry: CacheEntry,
        topic_summary: &str,
        skip_user_id_check: bool,
    ) -> AppResult<()>;

    /// Delete the conversation record, reporting whether it existed
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdentifier` on malformed identifiers, or a storage
    /// error on backend failure
    async fn delete(
        &self,
        user_id: &str,
        conversation_id: &str,
        skip_user_id_check: bool,
    ) -> AppResult<bool>;

    /// List the user's conversations, most recently active first
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdentifier` on a malformed `user_id`, or a storage
    /// error on backend failure
    async fn list(
        &self,
        user_id: &str,
        skip_user_id_check: bool,
    ) -> AppResult<Vec<ConversationSummary>>;

    /// Full connectivity probe (one query round trip); never errors
    async fn connected(&self) -> bool;

    /// Cheap readiness probe; no query round trip
    fn ready(&self) -> bool;
}
