//! One-time verification codes: generation, issuance, and validation.
//!
//! Issuance dispatches through a gateway first and persists only after
//! dispatch succeeds, so a gateway failure never leaves a half-issued code
//! behind. Validation is lazy: a code expires when checked, not via any
//! background sweep.

use crate::dispatch::{EmailGateway, SmsGateway};
use crate::error::{AuthError, Result};
use crate::store::{CredentialStore, DeliveryMethod, IssuedCode};
use rand::rngs::OsRng;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use subtle::ConstantTimeEq;

/// Generate a uniformly random 6-digit code in [100000, 999999].
pub fn generate_code() -> String {
    // gen_range on OsRng is uniform; no digit bias, no modulo skew.
    OsRng.gen_range(100_000u32..=999_999).to_string()
}

/// Outcome of checking an input code against a stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCheck {
    Valid,
    /// No code on record (or an empty one). Fails closed.
    Missing,
    /// The expiry window has elapsed.
    Expired,
    /// Present and fresh, but not equal to the input.
    Mismatch,
}

impl CodeCheck {
    /// Map to the error taxonomy; `Valid` becomes `Ok(())`.
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Valid => Ok(()),
            Self::Expired => Err(AuthError::ExpiredCode),
            Self::Missing | Self::Mismatch => Err(AuthError::InvalidCode),
        }
    }

    pub fn is_valid(self) -> bool {
        self == Self::Valid
    }
}

/// Check `input` against a stored code record.
///
/// Fails closed on a missing record or missing fields. Comparison is
/// constant-time. A valid result does not consume the stored code; callers
/// wanting single-use semantics clear it themselves on success.
pub fn check_code(
    input: &str,
    stored: Option<&IssuedCode>,
    expiry: Duration,
    now: SystemTime,
) -> CodeCheck {
    let Some(stored) = stored else {
        return CodeCheck::Missing;
    };
    if stored.code.is_empty() {
        return CodeCheck::Missing;
    }

    // A timestamp in the future reads as age zero (clock skew, not expiry).
    let age = now.duration_since(stored.issued_at).unwrap_or_default();
    if age > expiry {
        return CodeCheck::Expired;
    }

    let matches: bool = input
        .trim()
        .as_bytes()
        .ct_eq(stored.code.as_bytes())
        .into();
    if matches {
        CodeCheck::Valid
    } else {
        CodeCheck::Mismatch
    }
}

/// Issues one-time codes and dispatches them through the gateways.
///
/// Holds no state of its own beyond what it writes into the credential
/// store (login path) or returns to the caller (registration path).
pub struct CodeSender<S> {
    store: Arc<S>,
    email: Arc<dyn EmailGateway>,
    sms: Arc<dyn SmsGateway>,
}

impl<S: CredentialStore> CodeSender<S> {
    pub fn new(store: Arc<S>, email: Arc<dyn EmailGateway>, sms: Arc<dyn SmsGateway>) -> Self {
        Self { store, email, sms }
    }

    /// Issue a code during registration.
    ///
    /// No user record exists yet, so nothing is persisted: the code is
    /// dispatched and handed back for the caller to hold in transient
    /// session state until registration completes or is abandoned.
    pub async fn issue_for_registration(
        &self,
        contact: &str,
        method: DeliveryMethod,
    ) -> Result<IssuedCode> {
        let issued = IssuedCode {
            code: generate_code(),
            issued_at: SystemTime::now(),
        };
        self.dispatch(contact, method, &issued.code).await?;
        Ok(issued)
    }

    /// Issue a code during login.
    ///
    /// Resolves the unique record bound to `contact`, dispatches, then
    /// overwrites that method's stored code, replacing any prior unconsumed
    /// one. Dispatch failure aborts before anything is written.
    pub async fn issue_for_login(&self, contact: &str, method: DeliveryMethod) -> Result<()> {
        let record = self
            .store
            .find_by_contact(method, contact)
            .await?
            .ok_or_else(|| {
                AuthError::not_found(format!("no account bound to this {method} contact"))
            })?;

        let issued = IssuedCode {
            code: generate_code(),
            issued_at: SystemTime::now(),
        };
        self.dispatch(contact, method, &issued.code).await?;

        let username = record.username.clone();
        let updated = self
            .store
            .update(
                &record.username,
                Box::new(move |rec| {
                    rec.verification_codes.insert(method, issued);
                }),
            )
            .await?;
        if updated.is_none() {
            return Err(AuthError::not_found("account removed during code issuance"));
        }

        tracing::debug!(
            target: "auth.verification.issued",
            username = %username,
            method = %method,
            "login verification code issued"
        );
        Ok(())
    }

    async fn dispatch(&self, contact: &str, method: DeliveryMethod, code: &str) -> Result<()> {
        let body = format!("Your login verification code is: {code}");
        match method {
            DeliveryMethod::Email => {
                self.email
                    .send_email(contact, "Login verification code", &body)
                    .await
            }
            DeliveryMethod::Sms => self.sms.send_sms(contact, &body).await,
        }
    }
}
