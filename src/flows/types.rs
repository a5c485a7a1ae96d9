//! Request and state types for the registration and login flows.

use crate::store::{DeliveryMethod, IssuedCode};

/// Input to [`RegistrationFlow::begin`](super::RegistrationFlow::begin).
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub password_confirm: String,
    /// Optional email contact; verified by one-time code before finalization.
    pub email: Option<String>,
    /// Optional phone contact; verified before email when both are present.
    pub phone: Option<String>,
}

impl RegisterRequest {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        password_confirm: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            password_confirm: password_confirm.into(),
            email: None,
            phone: None,
        }
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

/// Where an in-progress registration stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStage {
    /// Waiting for the code sent to the phone contact.
    PhoneVerificationPending,
    /// Waiting for the code sent to the email contact.
    EmailVerificationPending,
    /// All supplied contacts verified; ready to finalize.
    Complete,
}

/// Transient state between [`begin`](super::RegistrationFlow::begin) and
/// [`finalize`](super::RegistrationFlow::finalize).
///
/// Holds the outstanding verification code, so it lives only in the caller's
/// session state and is never persisted. Dropping it abandons the
/// registration with no trace in the store.
pub struct PendingRegistration {
    pub(crate) username: String,
    pub(crate) password_hash: String,
    pub(crate) email: Option<String>,
    pub(crate) phone: Option<String>,
    pub(crate) stage: RegistrationStage,
    pub(crate) pending_code: Option<IssuedCode>,
}

impl PendingRegistration {
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn stage(&self) -> RegistrationStage {
        self.stage
    }
}

// The outstanding code stays out of debug output.
impl std::fmt::Debug for PendingRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRegistration")
            .field("username", &self.username)
            .field("stage", &self.stage)
            .finish()
    }
}

/// Returned once at registration finalization.
///
/// The plaintext TOTP secret and recovery codes appear here and nowhere
/// else; the store keeps only the encrypted secret.
#[derive(Clone)]
pub struct RegistrationOutcome {
    pub username: String,
    /// Base32 TOTP secret for manual authenticator entry.
    pub totp_secret: String,
    /// otpauth:// URI for QR enrollment.
    pub provisioning_uri: String,
    /// Single-use recovery codes; show once, then discard.
    pub recovery_codes: Vec<String>,
}

impl std::fmt::Debug for RegistrationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationOutcome")
            .field("username", &self.username)
            .field("recovery_codes", &self.recovery_codes.len())
            .finish()
    }
}

/// The credential presented as the first login factor.
#[derive(Clone)]
pub enum FirstFactor {
    Password(String),
    /// A one-time code previously issued to a bound contact.
    Code { method: DeliveryMethod, code: String },
}

impl std::fmt::Debug for FirstFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password(_) => f.write_str("FirstFactor::Password"),
            Self::Code { method, .. } => {
                f.debug_struct("FirstFactor::Code").field("method", method).finish()
            }
        }
    }
}

/// Proof that the first factor succeeded; input to the second-factor step.
#[derive(Debug, Clone)]
pub struct SecondFactorPending {
    pub username: String,
}

/// A fully authenticated login.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub username: String,
    /// Which second factor completed the login.
    pub second_factor: SecondFactorKind,
}

/// The second factor that completed a login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondFactorKind {
    Totp,
    RecoveryCode,
}
