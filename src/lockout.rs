//! Failed-attempt tracking and temporary account locks.
//!
//! The manager counts failures per account, applies a timed lock when the
//! allowance is exhausted, and lifts state on successful authentication.
//! What to tell the caller about a lock belongs to the login flow.

use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use crate::store::CredentialStore;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Policy knobs for lockout behavior.
#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    /// Consecutive failures tolerated before a lock.
    pub max_attempts: u32,
    /// How long a lock lasts.
    pub lock_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lock_duration: Duration::from_secs(300),
        }
    }
}

impl From<&AuthConfig> for LockoutPolicy {
    fn from(config: &AuthConfig) -> Self {
        Self {
            max_attempts: config.max_failed_attempts,
            lock_duration: config.lock_duration,
        }
    }
}

/// Tracks failed first-factor attempts per account.
pub struct LockoutManager<S> {
    policy: LockoutPolicy,
    store: Arc<S>,
}

impl<S: CredentialStore> LockoutManager<S> {
    pub fn new(policy: LockoutPolicy, store: Arc<S>) -> Self {
        Self { policy, store }
    }

    pub fn policy(&self) -> LockoutPolicy {
        self.policy
    }

    /// Whether the account is currently locked; returns the expiry if so.
    ///
    /// A lock whose expiry has passed reads as unlocked. The stale
    /// `locked_until` field is cleared lazily by [`reset`](Self::reset)
    /// on the next successful authentication.
    pub async fn is_locked(&self, username: &str) -> Result<Option<SystemTime>> {
        let record = self.store.get(username).await?;
        let locked_until = record.and_then(|r| r.locked_until);
        match locked_until {
            Some(until) if until > SystemTime::now() => Ok(Some(until)),
            _ => Ok(None),
        }
    }

    /// Record one failed attempt and return how many remain before a lock.
    ///
    /// When the count reaches the policy maximum the lock is applied in the
    /// same store update, so a concurrent attempt cannot slip between the
    /// increment and the lock. Unknown accounts are not tracked; a count one
    /// below the allowance is reported so the response cannot reveal whether
    /// the account exists.
    pub async fn record_failure(&self, username: &str) -> Result<u32> {
        let max = self.policy.max_attempts;
        let until = SystemTime::now() + self.policy.lock_duration;
        let updated = self
            .store
            .update(
                username,
                Box::new(move |rec| {
                    rec.failed_attempts += 1;
                    if rec.failed_attempts >= max {
                        rec.locked_until = Some(until);
                    }
                }),
            )
            .await?;

        let Some(record) = updated else {
            return Ok(self.policy.max_attempts.saturating_sub(1));
        };

        let remaining = self.policy.max_attempts.saturating_sub(record.failed_attempts);
        if remaining == 0 {
            tracing::warn!(
                target: "auth.lockout.account_locked",
                username = %username,
                lock_secs = self.policy.lock_duration.as_secs(),
                "account locked after repeated failures"
            );
        } else {
            tracing::debug!(
                target: "auth.lockout.failure",
                username = %username,
                failed_attempts = record.failed_attempts,
                remaining,
                "failed attempt recorded"
            );
        }
        Ok(remaining)
    }

    /// Attempts remaining before the account locks.
    pub async fn remaining_attempts(&self, username: &str) -> Result<u32> {
        let record = self.store.get(username).await?;
        let failed = record.map(|r| r.failed_attempts).unwrap_or(0);
        Ok(self.policy.max_attempts.saturating_sub(failed))
    }

    /// Lock the account for the policy's duration; returns the expiry.
    pub async fn lock(&self, username: &str) -> Result<SystemTime> {
        let until = SystemTime::now() + self.policy.lock_duration;
        let updated = self
            .store
            .update(
                username,
                Box::new(move |rec| {
                    rec.locked_until = Some(until);
                }),
            )
            .await?;
        if updated.is_none() {
            return Err(AuthError::not_found(format!("no account named '{username}'")));
        }

        tracing::warn!(
            target: "auth.lockout.account_locked",
            username = %username,
            lock_secs = self.policy.lock_duration.as_secs(),
            "account locked after repeated failures"
        );
        Ok(until)
    }

    /// Clear the failure counter and any lock after a successful login.
    pub async fn reset(&self, username: &str) -> Result<()> {
        self.store
            .update(
                username,
                Box::new(|rec| {
                    rec.failed_attempts = 0;
                    rec.locked_until = None;
                }),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryCredentialStore, UserRecord};
    use std::collections::HashMap;

    fn record(username: &str) -> UserRecord {
        UserRecord {
            username: username.into(),
            password_hash: "digest".into(),
            encrypted_totp_secret: "ciphertext".into(),
            email: None,
            phone: None,
            recovery_codes: vec![],
            failed_attempts: 0,
            locked_until: None,
            verification_codes: HashMap::new(),
            last_totp_step: None,
        }
    }

    async fn manager_with_user(username: &str) -> (LockoutManager<MemoryCredentialStore>, Arc<MemoryCredentialStore>) {
        let store = Arc::new(MemoryCredentialStore::new());
        store.insert(record(username)).await.unwrap();
        (
            LockoutManager::new(LockoutPolicy::default(), Arc::clone(&store)),
            store,
        )
    }

    #[tokio::test]
    async fn test_failures_count_down_and_lock_on_exhaustion() {
        let (manager, _store) = manager_with_user("alice").await;

        assert_eq!(manager.remaining_attempts("alice").await.unwrap(), 5);
        assert_eq!(manager.record_failure("alice").await.unwrap(), 4);
        assert_eq!(manager.record_failure("alice").await.unwrap(), 3);
        assert_eq!(manager.record_failure("alice").await.unwrap(), 2);
        assert_eq!(manager.record_failure("alice").await.unwrap(), 1);
        assert!(manager.is_locked("alice").await.unwrap().is_none());

        // The fifth failure exhausts the allowance and locks.
        assert_eq!(manager.record_failure("alice").await.unwrap(), 0);
        assert!(manager.is_locked("alice").await.unwrap().is_some());

        // Past the limit the count saturates rather than underflowing.
        assert_eq!(manager.record_failure("alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_lock_and_expiry() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.insert(record("alice")).await.unwrap();
        let policy = LockoutPolicy {
            max_attempts: 5,
            lock_duration: Duration::from_millis(30),
        };
        let manager = LockoutManager::new(policy, Arc::clone(&store));

        assert!(manager.is_locked("alice").await.unwrap().is_none());
        let until = manager.lock("alice").await.unwrap();
        assert_eq!(manager.is_locked("alice").await.unwrap(), Some(until));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(manager.is_locked("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reset_clears_counter_and_lock() {
        let (manager, store) = manager_with_user("alice").await;

        manager.record_failure("alice").await.unwrap();
        manager.record_failure("alice").await.unwrap();
        manager.lock("alice").await.unwrap();

        manager.reset("alice").await.unwrap();

        let rec = store.get("alice").await.unwrap().unwrap();
        assert_eq!(rec.failed_attempts, 0);
        assert!(rec.locked_until.is_none());
        assert_eq!(manager.remaining_attempts("alice").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_unknown_account_not_tracked() {
        let (manager, store) = manager_with_user("alice").await;

        // Reports one fewer than the allowance without creating a record.
        assert_eq!(manager.record_failure("ghost").await.unwrap(), 4);
        assert!(store.get("ghost").await.unwrap().is_none());

        assert!(matches!(
            manager.lock("ghost").await.unwrap_err(),
            AuthError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_policy_from_config() {
        let config = AuthConfig::new("TestApp")
            .max_failed_attempts(3)
            .lock_duration(Duration::from_secs(60));
        let policy = LockoutPolicy::from(&config);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.lock_duration, Duration::from_secs(60));
    }
}
