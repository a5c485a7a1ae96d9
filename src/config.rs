//! Configuration for the authentication engine.
//!
//! [`AuthConfig`] carries the tunable policy knobs; [`VaultKey`] is the
//! process-wide key protecting TOTP secrets at rest. The key is a hard
//! startup precondition: construction fails with
//! [`AuthError::Configuration`] when it is missing, because an engine
//! running without it cannot protect stored secrets.

use crate::error::{AuthError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Policy configuration for the authentication engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// How long an issued one-time code stays valid.
    #[serde(default = "default_code_expiry")]
    pub code_expiry: Duration,
    /// Failed first- or second-factor attempts before the account locks.
    #[serde(default = "default_max_failed_attempts")]
    pub max_failed_attempts: u32,
    /// How long a locked account stays locked.
    #[serde(default = "default_lock_duration")]
    pub lock_duration: Duration,
    /// Number of single-use recovery codes generated at registration.
    #[serde(default = "default_recovery_code_count")]
    pub recovery_code_count: usize,
    /// Issuer label shown in authenticator apps.
    #[serde(default = "default_issuer")]
    pub issuer: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            code_expiry: default_code_expiry(),
            max_failed_attempts: default_max_failed_attempts(),
            lock_duration: default_lock_duration(),
            recovery_code_count: default_recovery_code_count(),
            issuer: default_issuer(),
        }
    }
}

impl AuthConfig {
    /// Create a config with default settings and the given issuer label.
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            ..Default::default()
        }
    }

    /// Set the one-time code expiry window.
    #[must_use]
    pub fn code_expiry(mut self, expiry: Duration) -> Self {
        self.code_expiry = expiry;
        self
    }

    /// Set the maximum failed attempts before lockout.
    #[must_use]
    pub fn max_failed_attempts(mut self, max: u32) -> Self {
        self.max_failed_attempts = max;
        self
    }

    /// Set the lockout duration.
    #[must_use]
    pub fn lock_duration(mut self, duration: Duration) -> Self {
        self.lock_duration = duration;
        self
    }

    /// Set the number of recovery codes generated at registration.
    #[must_use]
    pub fn recovery_code_count(mut self, count: usize) -> Self {
        self.recovery_code_count = count;
        self
    }

    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Reads `BREAKWATER_ISSUER`, `BREAKWATER_CODE_EXPIRY_SECS`,
    /// `BREAKWATER_MAX_FAILED_ATTEMPTS`, `BREAKWATER_LOCK_DURATION_SECS`,
    /// and `BREAKWATER_RECOVERY_CODE_COUNT`; unset or unparsable values keep
    /// their defaults.
    pub fn from_env() -> Self {
        fn parsed<T: std::str::FromStr>(var: &str) -> Option<T> {
            std::env::var(var).ok().and_then(|v| v.parse().ok())
        }

        let mut config = Self::default();
        if let Ok(issuer) = std::env::var("BREAKWATER_ISSUER") {
            config.issuer = issuer;
        }
        if let Some(secs) = parsed::<u64>("BREAKWATER_CODE_EXPIRY_SECS") {
            config.code_expiry = Duration::from_secs(secs);
        }
        if let Some(max) = parsed("BREAKWATER_MAX_FAILED_ATTEMPTS") {
            config.max_failed_attempts = max;
        }
        if let Some(secs) = parsed::<u64>("BREAKWATER_LOCK_DURATION_SECS") {
            config.lock_duration = Duration::from_secs(secs);
        }
        if let Some(count) = parsed("BREAKWATER_RECOVERY_CODE_COUNT") {
            config.recovery_code_count = count;
        }
        config
    }
}

fn default_code_expiry() -> Duration {
    Duration::from_secs(300)
}

fn default_max_failed_attempts() -> u32 {
    5
}

fn default_lock_duration() -> Duration {
    Duration::from_secs(300)
}

fn default_recovery_code_count() -> usize {
    5
}

fn default_issuer() -> String {
    "Breakwater".to_string()
}

/// 32-byte symmetric key protecting TOTP secrets at rest.
///
/// Loss of this key permanently invalidates every stored secret.
#[derive(Clone)]
pub struct VaultKey([u8; 32]);

impl VaultKey {
    /// Environment variable read by [`VaultKey::from_env`].
    pub const ENV_VAR: &'static str = "BREAKWATER_VAULT_KEY";

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random key. Intended for provisioning tooling;
    /// the running process must load the same key every start.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Decode a key from standard base64.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| AuthError::configuration(format!("vault key is not valid base64: {e}")))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AuthError::configuration("vault key must decode to exactly 32 bytes"))?;
        Ok(Self(bytes))
    }

    /// Load the key from `BREAKWATER_VAULT_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the variable is unset or does
    /// not decode to a 32-byte key. Treat this as fatal at startup.
    pub fn from_env() -> Result<Self> {
        let encoded = std::env::var(Self::ENV_VAR).map_err(|_| {
            AuthError::configuration(format!("{} environment variable not set", Self::ENV_VAR))
        })?;
        Self::from_base64(&encoded)
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

// Never print key material.
impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VaultKey([redacted])")
    }
}
