//! Append-only record of login attempts.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

/// One recorded login attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginAttempt {
    pub username: String,
    pub success: bool,
    /// Short machine-readable reason, e.g. "bad_password" or "totp".
    pub reason: String,
    pub timestamp: SystemTime,
}

impl LoginAttempt {
    pub fn success(username: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            success: true,
            reason: reason.into(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn failure(username: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            success: false,
            reason: reason.into(),
            timestamp: SystemTime::now(),
        }
    }
}

/// Sink for login attempt records.
///
/// Recording must never fail a login: implementations report errors, and the
/// flows log and discard them.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, attempt: LoginAttempt) -> Result<()>;

    /// All attempts for one account, oldest first.
    async fn history(&self, username: &str) -> Result<Vec<LoginAttempt>>;
}

/// In-memory audit log for tests and development.
#[derive(Default, Clone)]
pub struct MemoryAuditLog {
    attempts: Arc<RwLock<Vec<LoginAttempt>>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every attempt recorded so far, across all accounts.
    pub fn all(&self) -> Vec<LoginAttempt> {
        self.attempts.read().expect("audit log lock poisoned").clone()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn record(&self, attempt: LoginAttempt) -> Result<()> {
        self.attempts
            .write()
            .expect("audit log lock poisoned")
            .push(attempt);
        Ok(())
    }

    async fn history(&self, username: &str) -> Result<Vec<LoginAttempt>> {
        let attempts = self.attempts.read().expect("audit log lock poisoned");
        Ok(attempts
            .iter()
            .filter(|a| a.username == username)
            .cloned()
            .collect())
    }
}
