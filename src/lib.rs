// ABOUTME: Library entry point for the conversation cache and quota subsystem
// ABOUTME: Exposes the cache, quota limiter, and token usage history APIs
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

//! # Conversation Cache
//!
//! Bounded conversation history storage and token quota tracking for LLM
//! assistant services, backed by a relational store (`SQLite` for local
//! development and tests, `PostgreSQL` for production).
//!
//! ## Features
//!
//! - **Conversation cache**: ordered per-conversation turn histories keyed
//!   by `(user_id, conversation_id)`, with a global capacity bound enforced
//!   by LRU-by-last-write eviction
//! - **Quota limiter**: per-user or cluster-wide token budgets with atomic,
//!   clamped consumption and administrative reset/grant operations
//! - **Usage history**: running input/output token totals per user,
//!   provider, and model
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use conversation_cache::cache::{Cache, ConversationCache};
//! use conversation_cache::config::StorageConfig;
//! use conversation_cache::models::{CacheEntry, MessageRole};
//!
//! # async fn example() -> conversation_cache::errors::AppResult<()> {
//! let config = StorageConfig::from_env()?;
//! let cache = Cache::new(&config).await?;
//!
//! let user = "7d2fb022-4370-4b39-bd0c-6d3e2ba3bd4d";
//! let conversation = "cc99f776-07f5-4d0a-a572-7e7bcfc70f9a";
//!
//! let history = cache.get(user, conversation, false).await?;
//! // ... build a prompt from `history`, produce a response ...
//! cache
//!     .insert_or_append(
//!         user,
//!         conversation,
//!         CacheEntry::new(MessageRole::Human, "how do I scale a deployment?"),
//!         "scaling deployments",
//!         false,
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

/// Conversation cache trait, backends, and factory
pub mod cache;
/// Storage and quota configuration
pub mod config;
/// Storage connection manager (pools and liveness probes)
pub mod db;
/// Error codes and the unified error type
pub mod errors;
/// Structured logging setup
pub mod logging;
/// Conversation record and entry types
pub mod models;
/// Quota limiter trait, backends, and usage history
pub mod quota;
/// Identifier validation helpers
pub mod utils;

pub use cache::{Cache, ConversationCache};
pub use errors::{AppError, AppResult, ErrorCode};
pub use models::{CacheEntry, ConversationSummary, MessageRole};
pub use quota::{Quota, QuotaLimiter, QuotaSubject, TokenUsageHistory};
