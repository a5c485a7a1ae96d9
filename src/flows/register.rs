//! Registration flow.
//!
//! Three steps: `begin` validates input and dispatches the first contact
//! verification code, `verify_contact` checks a code and advances
//! phone-then-email, `finalize` creates the stored record. Nothing touches
//! the credential store until finalization, so an abandoned registration
//! leaves no partial record behind.

use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use crate::password::PasswordHasher;
use crate::recovery::RecoveryCodeGenerator;
use crate::store::{CredentialStore, DeliveryMethod, UserRecord};
use crate::totp::TotpManager;
use crate::vault::SecretVault;
use crate::verification::{check_code, CodeSender};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use super::types::{PendingRegistration, RegisterRequest, RegistrationOutcome, RegistrationStage};

const MIN_PASSWORD_LEN: usize = 8;

/// Handles user registration.
pub struct RegistrationFlow<S> {
    store: Arc<S>,
    sender: CodeSender<S>,
    hasher: PasswordHasher,
    totp: TotpManager,
    vault: SecretVault,
    recovery: RecoveryCodeGenerator,
    config: AuthConfig,
}

impl<S: CredentialStore> RegistrationFlow<S> {
    pub fn new(
        store: Arc<S>,
        sender: CodeSender<S>,
        totp: TotpManager,
        vault: SecretVault,
        config: AuthConfig,
    ) -> Self {
        let recovery = RecoveryCodeGenerator::new().with_count(config.recovery_code_count);
        Self {
            store,
            sender,
            hasher: PasswordHasher::new(),
            totp,
            vault,
            recovery,
            config,
        }
    }

    /// Validate the request and start contact verification.
    ///
    /// Contacts are verified phone first, then email. With no contacts the
    /// returned state is already [`RegistrationStage::Complete`] and can be
    /// finalized immediately.
    pub async fn begin(&self, req: RegisterRequest) -> Result<PendingRegistration> {
        let username = req.username.trim().to_string();
        if username.is_empty() {
            return Err(AuthError::validation("username must not be empty"));
        }
        if req.password.is_empty() {
            return Err(AuthError::validation("password must not be empty"));
        }
        if req.password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if req.password != req.password_confirm {
            return Err(AuthError::validation("passwords do not match"));
        }

        if self.store.get(&username).await?.is_some() {
            return Err(AuthError::conflict(format!(
                "username '{username}' is already taken"
            )));
        }

        let email = normalize_contact(req.email.as_deref(), str::to_lowercase);
        let phone = normalize_contact(req.phone.as_deref(), str::to_string);

        if let Some(email) = &email {
            if !is_valid_email(email) {
                return Err(AuthError::validation("invalid email format"));
            }
            if self.store.contact_in_use(DeliveryMethod::Email, email).await? {
                return Err(AuthError::conflict("email is already bound to an account"));
            }
        }
        if let Some(phone) = &phone {
            if self.store.contact_in_use(DeliveryMethod::Sms, phone).await? {
                return Err(AuthError::conflict(
                    "phone number is already bound to an account",
                ));
            }
        }

        let mut pending = PendingRegistration {
            username,
            password_hash: self.hasher.hash(&req.password),
            email,
            phone,
            stage: RegistrationStage::Complete,
            pending_code: None,
        };
        self.advance(&mut pending).await?;

        tracing::debug!(
            target: "auth.register.begin",
            username = %pending.username,
            stage = ?pending.stage,
            "registration started"
        );
        Ok(pending)
    }

    /// Check the code for the currently pending contact.
    ///
    /// On success the next contact's code is dispatched, or the stage moves
    /// to [`RegistrationStage::Complete`]. A wrong or expired code leaves
    /// the stage unchanged; the caller may retry or restart.
    pub async fn verify_contact(
        &self,
        pending: &mut PendingRegistration,
        code: &str,
    ) -> Result<RegistrationStage> {
        if pending.stage == RegistrationStage::Complete {
            return Err(AuthError::validation("no contact verification pending"));
        }

        check_code(
            code,
            pending.pending_code.as_ref(),
            self.config.code_expiry,
            SystemTime::now(),
        )
        .into_result()?;

        pending.pending_code = None;
        self.advance(pending).await?;
        Ok(pending.stage)
    }

    /// Create the user record and return the enrollment material.
    ///
    /// The plaintext TOTP secret and recovery codes are returned here once;
    /// the store receives only the vault-encrypted secret.
    pub async fn finalize(&self, pending: PendingRegistration) -> Result<RegistrationOutcome> {
        if pending.stage != RegistrationStage::Complete {
            return Err(AuthError::validation(
                "contact verification is not complete",
            ));
        }

        let totp_secret = self.totp.generate_secret();
        let encrypted_totp_secret = self.vault.encrypt(&totp_secret)?;
        let provisioning_uri = self.totp.provisioning_uri(&totp_secret, &pending.username)?;
        let recovery_codes = self.recovery.generate();

        let record = UserRecord {
            username: pending.username.clone(),
            password_hash: pending.password_hash,
            encrypted_totp_secret,
            email: pending.email,
            phone: pending.phone,
            recovery_codes: recovery_codes.clone(),
            failed_attempts: 0,
            locked_until: None,
            verification_codes: HashMap::new(),
            last_totp_step: None,
        };
        // Re-checked at insert: a racing registration for the same username
        // still fails with a conflict.
        self.store.insert(record).await?;

        tracing::info!(
            target: "auth.register.finalized",
            username = %pending.username,
            "user registered"
        );
        Ok(RegistrationOutcome {
            username: pending.username,
            totp_secret,
            provisioning_uri,
            recovery_codes,
        })
    }

    /// Dispatch the code for the next unverified contact, or mark complete.
    ///
    /// `pending.stage` names the contact just verified (or `Complete` for a
    /// fresh registration with nothing verified yet); the order is phone,
    /// then email.
    async fn advance(&self, pending: &mut PendingRegistration) -> Result<()> {
        let next = match pending.stage {
            RegistrationStage::Complete if pending.phone.is_some() => Some(DeliveryMethod::Sms),
            RegistrationStage::Complete | RegistrationStage::PhoneVerificationPending => {
                pending.email.as_ref().map(|_| DeliveryMethod::Email)
            }
            RegistrationStage::EmailVerificationPending => None,
        };

        match next {
            Some(DeliveryMethod::Sms) => {
                let phone = pending.phone.clone().unwrap_or_default();
                pending.pending_code = Some(
                    self.sender
                        .issue_for_registration(&phone, DeliveryMethod::Sms)
                        .await?,
                );
                pending.stage = RegistrationStage::PhoneVerificationPending;
            }
            Some(DeliveryMethod::Email) => {
                let email = pending.email.clone().unwrap_or_default();
                pending.pending_code = Some(
                    self.sender
                        .issue_for_registration(&email, DeliveryMethod::Email)
                        .await?,
                );
                pending.stage = RegistrationStage::EmailVerificationPending;
            }
            None => {
                pending.stage = RegistrationStage::Complete;
                pending.pending_code = None;
            }
        }
        Ok(())
    }
}

fn normalize_contact(value: Option<&str>, normalize: impl Fn(&str) -> String) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(normalize)
}

/// Basic email validation.
fn is_valid_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }

    let local = parts[0];
    let domain = parts[1];

    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VaultKey;
    use crate::dispatch::MemoryGateway;
    use crate::store::MemoryCredentialStore;
    use crate::totp::TotpConfig;

    fn flow(
        store: &Arc<MemoryCredentialStore>,
        gateway: &MemoryGateway,
    ) -> RegistrationFlow<MemoryCredentialStore> {
        let sender = CodeSender::new(
            Arc::clone(store),
            Arc::new(gateway.clone()),
            Arc::new(gateway.clone()),
        );
        RegistrationFlow::new(
            Arc::clone(store),
            sender,
            TotpManager::new(TotpConfig::new("TestApp")),
            SecretVault::new(&VaultKey::generate()),
            AuthConfig::default(),
        )
    }

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("user.name@example.com"));
        assert!(is_valid_email("user+tag@example.co.uk"));
    }

    #[test]
    fn test_invalid_emails() {
        assert!(!is_valid_email("userexample.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@.com"));
        assert!(!is_valid_email("user@example."));
        assert!(!is_valid_email("user@@example.com"));
    }

    #[tokio::test]
    async fn test_register_without_contacts() {
        let store = Arc::new(MemoryCredentialStore::new());
        let gateway = MemoryGateway::new();
        let flow = flow(&store, &gateway);

        let pending = flow
            .begin(RegisterRequest::new("alice", "password123", "password123"))
            .await
            .unwrap();
        assert_eq!(pending.stage(), RegistrationStage::Complete);

        let outcome = flow.finalize(pending).await.unwrap();
        assert_eq!(outcome.username, "alice");
        assert_eq!(outcome.recovery_codes.len(), 5);
        assert!(outcome.provisioning_uri.starts_with("otpauth://totp/"));

        let record = store.get("alice").await.unwrap().unwrap();
        assert_eq!(record.recovery_codes.len(), 5);
        assert_ne!(record.encrypted_totp_secret, outcome.totp_secret);
        assert!(gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn test_validation_failures() {
        let store = Arc::new(MemoryCredentialStore::new());
        let gateway = MemoryGateway::new();
        let flow = flow(&store, &gateway);

        let cases = [
            RegisterRequest::new("", "password123", "password123"),
            RegisterRequest::new("alice", "", ""),
            RegisterRequest::new("alice", "short", "short"),
            RegisterRequest::new("alice", "password123", "password124"),
            RegisterRequest::new("alice", "password123", "password123").email("not-an-email"),
        ];
        for req in cases {
            assert!(matches!(
                flow.begin(req).await.unwrap_err(),
                AuthError::Validation(_)
            ));
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let store = Arc::new(MemoryCredentialStore::new());
        let gateway = MemoryGateway::new();
        let flow = flow(&store, &gateway);

        let pending = flow
            .begin(RegisterRequest::new("alice", "password123", "password123"))
            .await
            .unwrap();
        flow.finalize(pending).await.unwrap();

        let err = flow
            .begin(RegisterRequest::new("alice", "differentpw1", "differentpw1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_duplicate_contact_conflicts() {
        let store = Arc::new(MemoryCredentialStore::new());
        let gateway = MemoryGateway::new();
        let flow = flow(&store, &gateway);

        let mut pending = flow
            .begin(
                RegisterRequest::new("alice", "password123", "password123")
                    .email("alice@example.com"),
            )
            .await
            .unwrap();
        let code = gateway.last_code().unwrap();
        flow.verify_contact(&mut pending, &code).await.unwrap();
        flow.finalize(pending).await.unwrap();

        let err = flow
            .begin(
                RegisterRequest::new("bob", "password123", "password123")
                    .email("alice@example.com"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_phone_then_email_order() {
        let store = Arc::new(MemoryCredentialStore::new());
        let gateway = MemoryGateway::new();
        let flow = flow(&store, &gateway);

        let mut pending = flow
            .begin(
                RegisterRequest::new("alice", "password123", "password123")
                    .email("alice@example.com")
                    .phone("+15550001111"),
            )
            .await
            .unwrap();
        assert_eq!(pending.stage(), RegistrationStage::PhoneVerificationPending);
        assert_eq!(gateway.sent().len(), 1);
        assert_eq!(gateway.sent()[0].channel, DeliveryMethod::Sms);

        let sms_code = gateway.last_code().unwrap();
        let stage = flow.verify_contact(&mut pending, &sms_code).await.unwrap();
        assert_eq!(stage, RegistrationStage::EmailVerificationPending);
        assert_eq!(gateway.sent().len(), 2);
        assert_eq!(gateway.sent()[1].channel, DeliveryMethod::Email);

        let email_code = gateway.last_code().unwrap();
        let stage = flow.verify_contact(&mut pending, &email_code).await.unwrap();
        assert_eq!(stage, RegistrationStage::Complete);

        let outcome = flow.finalize(pending).await.unwrap();
        let record = store.get(&outcome.username).await.unwrap().unwrap();
        assert_eq!(record.email.as_deref(), Some("alice@example.com"));
        assert_eq!(record.phone.as_deref(), Some("+15550001111"));
    }

    #[tokio::test]
    async fn test_wrong_code_does_not_advance() {
        let store = Arc::new(MemoryCredentialStore::new());
        let gateway = MemoryGateway::new();
        let flow = flow(&store, &gateway);

        let mut pending = flow
            .begin(
                RegisterRequest::new("alice", "password123", "password123")
                    .email("alice@example.com"),
            )
            .await
            .unwrap();

        let err = flow.verify_contact(&mut pending, "000000").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCode));
        assert_eq!(pending.stage(), RegistrationStage::EmailVerificationPending);

        // The real code still works after a failed attempt.
        let code = gateway.last_code().unwrap();
        let stage = flow.verify_contact(&mut pending, &code).await.unwrap();
        assert_eq!(stage, RegistrationStage::Complete);
    }

    #[tokio::test]
    async fn test_finalize_requires_verification() {
        let store = Arc::new(MemoryCredentialStore::new());
        let gateway = MemoryGateway::new();
        let flow = flow(&store, &gateway);

        let pending = flow
            .begin(
                RegisterRequest::new("alice", "password123", "password123")
                    .email("alice@example.com"),
            )
            .await
            .unwrap();

        let err = flow.finalize(pending).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
        assert!(store.is_empty());
    }
}
