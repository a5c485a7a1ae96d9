//! Login flow: first factor, then second factor, with lockout wrapped
//! around every decision point.

use crate::audit::{AuditLog, LoginAttempt};
use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use crate::lockout::LockoutManager;
use crate::password::PasswordHasher;
use crate::recovery;
use crate::store::{CredentialStore, DeliveryMethod};
use crate::totp::TotpService;
use crate::verification::{check_code, CodeCheck, CodeSender};
use std::sync::Arc;
use std::time::SystemTime;

use super::types::{Authenticated, FirstFactor, SecondFactorKind, SecondFactorPending};

/// Handles the login flow.
pub struct LoginFlow<S> {
    store: Arc<S>,
    sender: CodeSender<S>,
    hasher: PasswordHasher,
    totp: TotpService<S>,
    lockout: LockoutManager<S>,
    audit: Arc<dyn AuditLog>,
    config: AuthConfig,
}

impl<S: CredentialStore> LoginFlow<S> {
    pub fn new(
        store: Arc<S>,
        sender: CodeSender<S>,
        totp: TotpService<S>,
        lockout: LockoutManager<S>,
        audit: Arc<dyn AuditLog>,
        config: AuthConfig,
    ) -> Self {
        Self {
            store,
            sender,
            hasher: PasswordHasher::new(),
            totp,
            lockout,
            audit,
            config,
        }
    }

    /// Issue a one-time login code to a bound contact.
    pub async fn send_code(&self, contact: &str, method: DeliveryMethod) -> Result<()> {
        self.sender.issue_for_login(contact.trim(), method).await
    }

    /// Check the first factor: a password or a previously issued code.
    ///
    /// A failure counts against the lockout allowance; exhausting it locks
    /// the account. Success does not reset the counter; only a completed
    /// second factor does.
    pub async fn first_factor(
        &self,
        username: &str,
        factor: FirstFactor,
    ) -> Result<SecondFactorPending> {
        let username = username.trim();
        self.ensure_unlocked(username).await?;

        let record = self
            .store
            .get(username)
            .await?
            .ok_or_else(|| AuthError::not_found(format!("no account named '{username}'")))?;

        match factor {
            FirstFactor::Password(password) => {
                if !self.hasher.verify(&password, &record.password_hash) {
                    return Err(self.register_failure(username, "bad_password").await);
                }
            }
            FirstFactor::Code { method, code } => {
                let check = check_code(
                    &code,
                    record.verification_codes.get(&method),
                    self.config.code_expiry,
                    SystemTime::now(),
                );
                match check {
                    CodeCheck::Valid => {
                        // Single use: a leaked code must not be replayable.
                        self.store
                            .update(
                                username,
                                Box::new(move |rec| {
                                    rec.verification_codes.remove(&method);
                                }),
                            )
                            .await?;
                    }
                    CodeCheck::Expired => {
                        let err = self.register_failure(username, "expired_code").await;
                        return Err(match err {
                            AuthError::InvalidCredentials { .. } => AuthError::ExpiredCode,
                            locked => locked,
                        });
                    }
                    CodeCheck::Missing | CodeCheck::Mismatch => {
                        return Err(self.register_failure(username, "bad_code").await);
                    }
                }
            }
        }

        self.record_attempt(LoginAttempt::success(username, "first_factor")).await;
        tracing::debug!(
            target: "auth.login.first_factor",
            username = %username,
            "first factor accepted"
        );
        Ok(SecondFactorPending {
            username: username.to_string(),
        })
    }

    /// Check the second factor: a current TOTP code or a recovery code.
    ///
    /// Success resets the failure counter and completes the login. An
    /// accepted recovery code is removed from the account.
    pub async fn second_factor(
        &self,
        pending: &SecondFactorPending,
        code: &str,
    ) -> Result<Authenticated> {
        let username = pending.username.as_str();
        self.ensure_unlocked(username).await?;

        let code = code.trim();
        let kind = if self.totp.verify_for_user(username, code).await? {
            SecondFactorKind::Totp
        } else if self.consume_recovery_code(username, code).await? {
            SecondFactorKind::RecoveryCode
        } else {
            return Err(self.register_failure(username, "bad_second_factor").await);
        };

        self.lockout.reset(username).await?;
        let reason = match kind {
            SecondFactorKind::Totp => "totp",
            SecondFactorKind::RecoveryCode => "recovery_code",
        };
        self.record_attempt(LoginAttempt::success(username, reason)).await;
        tracing::info!(
            target: "auth.login.authenticated",
            username = %username,
            second_factor = reason,
            "login complete"
        );
        Ok(Authenticated {
            username: username.to_string(),
            second_factor: kind,
        })
    }

    async fn ensure_unlocked(&self, username: &str) -> Result<()> {
        if let Some(until) = self.lockout.is_locked(username).await? {
            self.record_attempt(LoginAttempt::failure(username, "locked")).await;
            return Err(AuthError::LockedAccount { until });
        }
        Ok(())
    }

    /// Remove a matching recovery code from the account; true if one matched.
    ///
    /// Matching and removal happen inside one store update, so two logins
    /// racing on the same code cannot both consume it.
    async fn consume_recovery_code(&self, username: &str, code: &str) -> Result<bool> {
        let Some(before) = self.store.get(username).await? else {
            return Ok(false);
        };
        let input = code.to_string();
        let updated = self
            .store
            .update(
                username,
                Box::new(move |rec| {
                    if let Some(index) = recovery::match_code(&input, &rec.recovery_codes) {
                        rec.recovery_codes.remove(index);
                    }
                }),
            )
            .await?;
        let Some(after) = updated else {
            return Ok(false);
        };
        Ok(after.recovery_codes.len() < before.recovery_codes.len())
    }

    /// Count a failure, possibly locking the account, and build the error
    /// the caller should see.
    async fn register_failure(&self, username: &str, reason: &str) -> AuthError {
        self.record_attempt(LoginAttempt::failure(username, reason)).await;
        let remaining = match self.lockout.record_failure(username).await {
            Ok(remaining) => remaining,
            Err(e) => return e,
        };
        if remaining == 0 {
            match self.lockout.is_locked(username).await {
                Ok(Some(until)) => AuthError::LockedAccount { until },
                Ok(None) => AuthError::InvalidCredentials { remaining: 0 },
                Err(e) => e,
            }
        } else {
            AuthError::InvalidCredentials { remaining }
        }
    }

    /// Audit recording never fails a login.
    async fn record_attempt(&self, attempt: LoginAttempt) {
        if let Err(e) = self.audit.record(attempt).await {
            tracing::warn!(error = %e, "failed to record login attempt");
        }
    }
}
