//! TOTP (Time-based One-Time Password) second factor.
//!
//! Secrets are generated here but stored encrypted; [`TotpService`] pulls
//! them through the vault at verification time. The last accepted time step
//! is persisted so the same code cannot be replayed within its window.

use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use crate::store::CredentialStore;
use crate::vault::SecretVault;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
use totp_rs::{Algorithm, Secret, TOTP};

/// Configuration for TOTP generation.
#[derive(Clone)]
pub struct TotpConfig {
    /// Issuer name shown in authenticator apps (e.g., "Breakwater").
    pub issuer: String,
    /// Number of digits in the code (default: 6).
    pub digits: usize,
    /// Time step in seconds (default: 30).
    pub step: u64,
    /// Accepted drift in steps on either side of now (default: 1).
    pub skew: u8,
    /// Algorithm (default: SHA1 for authenticator-app compatibility).
    pub algorithm: Algorithm,
}

impl Default for TotpConfig {
    fn default() -> Self {
        Self {
            issuer: "Breakwater".to_string(),
            digits: 6,
            step: 30,
            skew: 1,
            algorithm: Algorithm::SHA1,
        }
    }
}

impl TotpConfig {
    /// Create a new TOTP config with the given issuer name.
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            ..Default::default()
        }
    }

    /// Set the number of digits.
    pub fn digits(mut self, digits: usize) -> Self {
        self.digits = digits;
        self
    }

    /// Set the time step in seconds.
    pub fn step(mut self, step: u64) -> Self {
        self.step = step;
        self
    }
}

impl From<&AuthConfig> for TotpConfig {
    fn from(config: &AuthConfig) -> Self {
        Self::new(config.issuer.clone())
    }
}

/// Manages TOTP secret generation and code verification.
#[derive(Clone)]
pub struct TotpManager {
    config: TotpConfig,
}

impl TotpManager {
    /// Create a new TOTP manager with the given configuration.
    pub fn new(config: TotpConfig) -> Self {
        Self { config }
    }

    /// Generate a fresh base32-encoded secret.
    pub fn generate_secret(&self) -> String {
        Secret::generate_secret().to_encoded().to_string()
    }

    /// Build the otpauth:// URI for enrolling an authenticator app.
    pub fn provisioning_uri(&self, secret: &str, account_name: &str) -> Result<String> {
        let totp = self.build_totp(secret, account_name)?;
        Ok(totp.get_url())
    }

    /// Verify a code against the current time.
    ///
    /// Returns the time step the code matched at, or `None` for no match.
    /// A system-clock failure logs a warning and reads as no match rather
    /// than an error, so callers cannot distinguish the two.
    pub fn verify(&self, secret: &str, code: &str, account_name: &str) -> Result<Option<u64>> {
        let time = match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_secs(),
            Err(e) => {
                tracing::warn!(error = %e, "TOTP verification error (system time issue?)");
                return Ok(None);
            }
        };
        self.verify_at(secret, code, account_name, time)
    }

    /// Verify a code at a specific Unix timestamp (useful for testing).
    ///
    /// Returns the matching time step, checking the current step and `skew`
    /// steps on either side to tolerate clock drift.
    pub fn verify_at(
        &self,
        secret: &str,
        code: &str,
        account_name: &str,
        time: u64,
    ) -> Result<Option<u64>> {
        let totp = self.build_totp(secret, account_name)?;

        // Clean the code (remove spaces, dashes)
        let code = code.replace([' ', '-'], "");

        let current_step = time / self.config.step;
        let skew = u64::from(self.config.skew);
        let first = current_step.saturating_sub(skew);
        for step in first..=current_step + skew {
            let expected = totp.generate(step * self.config.step);
            let matches: bool = expected.as_bytes().ct_eq(code.as_bytes()).into();
            if matches {
                return Ok(Some(step));
            }
        }
        Ok(None)
    }

    /// Generate the code for the current time step.
    pub fn generate_current(&self, secret: &str, account_name: &str) -> Result<String> {
        let totp = self.build_totp(secret, account_name)?;
        totp.generate_current()
            .map_err(|e| AuthError::internal(format!("failed to generate TOTP: {e}")))
    }

    /// Generate the code for a specific Unix timestamp.
    pub fn generate_at(&self, secret: &str, account_name: &str, time: u64) -> Result<String> {
        let totp = self.build_totp(secret, account_name)?;
        Ok(totp.generate(time))
    }

    /// The time step in seconds.
    pub fn step_seconds(&self) -> u64 {
        self.config.step
    }

    /// The step index containing the given Unix timestamp.
    pub fn current_step(&self, time: u64) -> u64 {
        time / self.config.step
    }

    fn build_totp(&self, secret: &str, account_name: &str) -> Result<TOTP> {
        TOTP::new(
            self.config.algorithm,
            self.config.digits,
            self.config.skew,
            self.config.step,
            Secret::Encoded(secret.to_string())
                .to_bytes()
                .map_err(|e| AuthError::internal(format!("invalid TOTP secret: {e}")))?,
            Some(self.config.issuer.clone()),
            account_name.to_string(),
        )
        .map_err(|e| AuthError::internal(format!("failed to create TOTP: {e}")))
    }
}

/// Verifies TOTP codes for stored accounts.
///
/// Decrypts the account's secret through the vault, checks the code, and
/// records the accepted time step so the same code is rejected if presented
/// again within its validity window.
pub struct TotpService<S> {
    manager: TotpManager,
    vault: SecretVault,
    store: Arc<S>,
}

impl<S: CredentialStore> TotpService<S> {
    pub fn new(manager: TotpManager, vault: SecretVault, store: Arc<S>) -> Self {
        Self {
            manager,
            vault,
            store,
        }
    }

    pub fn manager(&self) -> &TotpManager {
        &self.manager
    }

    /// Verify a code for a stored account at the current time.
    pub async fn verify_for_user(&self, username: &str, code: &str) -> Result<bool> {
        let time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AuthError::internal(format!("system clock before Unix epoch: {e}")))?
            .as_secs();
        self.verify_for_user_at(username, code, time).await
    }

    /// Verify a code for a stored account at a specific Unix timestamp.
    pub async fn verify_for_user_at(&self, username: &str, code: &str, time: u64) -> Result<bool> {
        let record = self
            .store
            .get(username)
            .await?
            .ok_or_else(|| AuthError::not_found(format!("no account named '{username}'")))?;

        let secret = self.vault.decrypt(&record.encrypted_totp_secret)?;
        let Some(step) = self.manager.verify_at(&secret, code, username, time)? else {
            return Ok(false);
        };

        if record.last_totp_step == Some(step) {
            tracing::warn!(
                target: "auth.totp.replay",
                username = %username,
                "TOTP code replayed within its time step"
            );
            return Ok(false);
        }

        self.store
            .update(
                username,
                Box::new(move |rec| {
                    rec.last_totp_step = Some(step);
                }),
            )
            .await?;
        Ok(true)
    }
}
