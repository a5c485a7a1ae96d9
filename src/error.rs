//! Error taxonomy for authentication operations.
//!
//! Callers branch on the variant, never on message text: a presentation
//! layer can show `Validation` and `Conflict` messages verbatim, retry on
//! `Dispatch`, and render the remaining-attempt count carried by
//! `InvalidCredentials`.

use std::time::SystemTime;

/// The main error type for breakwater operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Malformed input: empty fields, short password, mismatched confirmation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Username already exists, or a contact value is already bound.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unknown username or unbound contact.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The one-time code's expiry window has elapsed.
    #[error("Verification code expired")]
    ExpiredCode,

    /// The one-time code does not match the issued one.
    #[error("Invalid verification code")]
    InvalidCode,

    /// A first- or second-factor check failed; `remaining` attempts are left
    /// before the account locks.
    #[error("Invalid credentials ({remaining} attempts remaining)")]
    InvalidCredentials { remaining: u32 },

    /// The account is temporarily locked after repeated failures.
    #[error("Account locked, try again later")]
    LockedAccount { until: SystemTime },

    /// A message gateway failed; the in-progress issuance was aborted and
    /// nothing was persisted. Retryable by the user.
    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    /// Missing or invalid startup configuration (e.g. no vault key).
    /// Fatal at process startup, not recoverable per call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AuthError>;

impl AuthError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn dispatch(msg: impl Into<String>) -> Self {
        Self::Dispatch(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the caller may retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Dispatch(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_attempts_in_message() {
        let err = AuthError::InvalidCredentials { remaining: 2 };
        assert_eq!(err.to_string(), "Invalid credentials (2 attempts remaining)");
    }

    #[test]
    fn test_only_dispatch_is_retryable() {
        assert!(AuthError::dispatch("gateway timeout").is_retryable());
        assert!(!AuthError::ExpiredCode.is_retryable());
        assert!(!AuthError::conflict("duplicate").is_retryable());
    }
}
