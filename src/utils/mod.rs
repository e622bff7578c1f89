// ABOUTME: Identifier validation utilities shared by cache operations
// ABOUTME: Enforces canonical UUID format before any backend I/O happens
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::{AppError, AppResult};
use uuid::Uuid;

/// Check if a string is a canonical UUID
#[must_use]
pub fn is_valid_suid(candidate: &str) -> bool {
    Uuid::try_parse(candidate).is_ok()
}

/// Validate a `(user_id, conversation_id)` cache key
///
/// The `conversation_id` is always checked; the `user_id` check can be
/// skipped for deployments whose authentication layer hands out non-UUID
/// user identifiers.
///
/// # Errors
///
/// Returns `InvalidIdentifier` when either identifier is malformed. No
/// backend I/O happens before this check.
pub fn validate_conversation_key(
    user_id: &str,
    conversation_id: &str,
    skip_user_id_check: bool,
) -> AppResult<()> {
    if !skip_user_id_check && !is_valid_suid(user_id) {
        return Err(AppError::invalid_identifier(format!(
            "invalid user ID: '{user_id}'"
        )));
    }
    if !is_valid_suid(conversation_id) {
        return Err(AppError::invalid_identifier(format!(
            "invalid conversation ID: '{conversation_id}'"
        )));
    }
    Ok(())
}

/// Validate a bare `user_id`
///
/// # Errors
///
/// Returns `InvalidIdentifier` when the identifier is malformed
pub fn validate_user_id(user_id: &str, skip_user_id_check: bool) -> AppResult<()> {
    if !skip_user_id_check && !is_valid_suid(user_id) {
        return Err(AppError::invalid_identifier(format!(
            "invalid user ID: '{user_id}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    #[test]
    fn test_valid_uuid_passes() {
        let id = Uuid::new_v4().to_string();
        assert!(validate_conversation_key(&id, &id, false).is_ok());
    }

    #[test]
    fn test_malformed_user_id_rejected() {
        let conv = Uuid::new_v4().to_string();
        let err = validate_conversation_key("not-a-uuid", &conv, false).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidIdentifier);
    }

    #[test]
    fn test_skip_user_id_check_only_skips_user_id() {
        let conv = Uuid::new_v4().to_string();
        assert!(validate_conversation_key("opaque-subject", &conv, true).is_ok());
        assert!(validate_conversation_key("opaque-subject", "nope", true).is_err());
    }
}
