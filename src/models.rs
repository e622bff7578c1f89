// ABOUTME: Record types for conversation histories and listing summaries
// ABOUTME: Handles serialization of entry lists stored in the cache value column
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Role of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// Turn produced by the end user
    Human,
    /// Turn produced by the model
    Assistant,
}

impl MessageRole {
    /// Get the string representation of this role
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Assistant => "assistant",
        }
    }
}

/// One conversational turn stored in a conversation history
///
/// Immutable once created; owned by the entry list it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Who produced the turn
    pub role: MessageRole,
    /// Opaque textual content of the turn
    pub content: String,
}

impl CacheEntry {
    /// Create a new entry
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Summary of a conversation for listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation ID
    pub conversation_id: String,
    /// Summary of the conversation's initial topic, set at creation time
    pub topic_summary: String,
}

/// Encode an entry list to the UTF-8 JSON bytes stored in the value column
///
/// # Errors
///
/// Returns a storage error if serialization fails
pub fn encode_entries(entries: &[CacheEntry]) -> AppResult<Vec<u8>> {
    serde_json::to_vec(entries).map_err(|e| AppError::storage("encode_entries", e))
}

/// Decode the stored value column bytes back into an entry list
///
/// # Errors
///
/// Returns a storage error if the stored payload is malformed
pub fn decode_entries(value: &[u8]) -> AppResult<Vec<CacheEntry>> {
    serde_json::from_slice(value).map_err(|e| AppError::storage("decode_entries", e))
}
