//! Breakwater - a multi-factor authentication engine
//!
//! Breakwater drives account registration and login as explicit state
//! machines: password or out-of-band one-time code as the first factor,
//! TOTP or a single-use recovery code as the second, with failed-attempt
//! counting and temporary lockout wrapped around every decision point.
//!
//! # Features
//!
//! - **First factor**: password digest verification, or 6-digit codes
//!   delivered over email/SMS gateways
//! - **Second factor**: TOTP (RFC 6238) with replay rejection, recovery
//!   codes consumed on use
//! - **Lockout**: configurable failed-attempt allowance and lock duration
//! - **Storage**: pluggable async credential store with per-record updates
//!   (in-memory and JSON-file backends included)
//! - **Secrets**: TOTP secrets encrypted at rest with ChaCha20-Poly1305
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use breakwater::{
//!     AuthConfig, Authenticator, FirstFactor, MemoryAuditLog, MemoryCredentialStore,
//!     RegisterRequest, VaultKey,
//! };
//! use breakwater::dispatch::{ConsoleEmailGateway, ConsoleSmsGateway};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> breakwater::Result<()> {
//!     breakwater::init_tracing();
//!
//!     let auth = Authenticator::new(
//!         AuthConfig::new("MyApp"),
//!         &VaultKey::from_env()?,
//!         Arc::new(MemoryCredentialStore::new()),
//!         Arc::new(ConsoleEmailGateway::new()),
//!         Arc::new(ConsoleSmsGateway::new()),
//!         Arc::new(MemoryAuditLog::new()),
//!     );
//!
//!     let pending = auth
//!         .register_begin(RegisterRequest::new("alice", "password123", "password123"))
//!         .await?;
//!     let outcome = auth.register_finalize(pending).await?;
//!     println!("scan: {}", outcome.provisioning_uri);
//!
//!     let pending = auth
//!         .first_factor("alice", FirstFactor::Password("password123".into()))
//!         .await?;
//!     let authed = auth.second_factor(&pending, "123456").await?;
//!     println!("welcome, {}", authed.username);
//!     Ok(())
//! }
//! ```

pub mod audit;
mod config;
pub mod dispatch;
mod error;
pub mod flows;
pub mod lockout;
mod password;
pub mod recovery;
pub mod store;
pub mod totp;
mod vault;
pub mod verification;

// Re-exports for public API
pub use audit::{AuditLog, LoginAttempt, MemoryAuditLog};
pub use config::{AuthConfig, VaultKey};
pub use error::{AuthError, Result};
pub use flows::{
    Authenticated, Authenticator, FirstFactor, LoginFlow, PendingRegistration, RegisterRequest,
    RegistrationFlow, RegistrationOutcome, RegistrationStage, SecondFactorKind,
    SecondFactorPending,
};
pub use lockout::{LockoutManager, LockoutPolicy};
pub use password::PasswordHasher;
pub use recovery::RecoveryCodeGenerator;
pub use store::{
    CredentialStore, DeliveryMethod, IssuedCode, JsonFileStore, MemoryCredentialStore, UserRecord,
};
pub use totp::{TotpConfig, TotpManager, TotpService};
pub use vault::SecretVault;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// Call this early, typically in main() before constructing the
/// [`Authenticator`].
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "breakwater=debug")
/// - `BREAKWATER_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("BREAKWATER_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
