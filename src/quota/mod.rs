// ABOUTME: Token quota limiter abstraction with pluggable relational backends
// ABOUTME: Tracks remaining budgets per subject and meters consumption atomically
//
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Quota factory for backend selection from the connection URL
pub mod factory;
/// `SQLite` quota limiter implementation
pub mod sqlite;
/// Token usage history accounting
pub mod usage;

#[cfg(feature = "postgresql")]
/// `PostgreSQL` quota limiter implementation
pub mod postgres;

use crate::errors::AppResult;
use async_trait::async_trait;

pub use factory::Quota;
pub use usage::TokenUsageHistory;

/// Identity kind a limiter instance tracks budgets against
///
/// Bound once at construction so per-call subject identifiers stay the only
/// varying input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaSubject {
    /// One budget per user
    User,
    /// One shared budget for the whole cluster
    Cluster,
}

impl QuotaSubject {
    /// Single-character tag stored in the subject column
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "u",
            Self::Cluster => "c",
        }
    }
}

/// Token quota limiter contract
///
/// Budgets are created lazily on first use with the configured initial
/// quota, decremented by consumption and restored by administrative resets
/// and grants. The remaining budget is never negative: consumption clamps
/// at zero.
#[async_trait]
pub trait QuotaLimiter: Send + Sync {
    /// Current remaining budget for the subject
    ///
    /// Lazily initializes an absent record to the configured initial quota.
    ///
    /// # Errors
    ///
    /// Returns a storage error on backend failure
    async fn available_quota(&self, subject_id: &str) -> AppResult<i64>;

    /// Fail when the subject has no remaining budget; no side effect on
    /// success beyond lazy record creation
    ///
    /// # Errors
    ///
    /// Returns `QuotaExceeded` when the remaining budget is not positive,
    /// or a storage error on backend failure
    async fn ensure_available_quota(&self, subject_id: &str) -> AppResult<()>;

    /// Atomically decrement the subject's budget by `input + output` tokens,
    /// clamping at zero
    ///
    /// # Errors
    ///
    /// Returns a storage error on backend failure
    async fn consume_tokens(
        &self,
        input_tokens: i64,
        output_tokens: i64,
        subject_id: &str,
    ) -> AppResult<()>;

    /// Administrative reset: restore the subject's budget to its quota limit
    ///
    /// Idempotent with respect to the subject context bound at construction.
    ///
    /// # Errors
    ///
    /// Returns a storage error on backend failure
    async fn revoke_quota(&self, subject_id: &str) -> AppResult<()>;

    /// Administrative grant: add the configured increment to the subject's
    /// budget
    ///
    /// # Errors
    ///
    /// Returns a storage error on backend failure
    async fn increase_quota(&self, subject_id: &str) -> AppResult<()>;
}
