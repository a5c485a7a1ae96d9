//! Registration and login state machines, plus the [`Authenticator`]
//! facade that wires them over one shared set of components.

mod login;
mod register;
mod types;

pub use login::LoginFlow;
pub use register::RegistrationFlow;
pub use types::{
    Authenticated, FirstFactor, PendingRegistration, RegisterRequest, RegistrationOutcome,
    RegistrationStage, SecondFactorKind, SecondFactorPending,
};

use crate::audit::{AuditLog, LoginAttempt};
use crate::config::{AuthConfig, VaultKey};
use crate::dispatch::{EmailGateway, SmsGateway};
use crate::error::Result;
use crate::lockout::{LockoutManager, LockoutPolicy};
use crate::store::{CredentialStore, DeliveryMethod};
use crate::totp::{TotpConfig, TotpManager, TotpService};
use crate::vault::SecretVault;
use crate::verification::CodeSender;
use std::sync::Arc;

/// The single entry point a presentation layer calls into.
///
/// Owns both flows over one store, one vault, and one pair of gateways, so
/// every policy knob in [`AuthConfig`] applies consistently across
/// registration and login.
pub struct Authenticator<S> {
    registration: RegistrationFlow<S>,
    login: LoginFlow<S>,
    audit: Arc<dyn AuditLog>,
}

impl<S: CredentialStore> Authenticator<S> {
    pub fn new(
        config: AuthConfig,
        key: &VaultKey,
        store: Arc<S>,
        email: Arc<dyn EmailGateway>,
        sms: Arc<dyn SmsGateway>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        let vault = SecretVault::new(key);
        let totp_manager = TotpManager::new(TotpConfig::from(&config));

        let registration = RegistrationFlow::new(
            Arc::clone(&store),
            CodeSender::new(Arc::clone(&store), Arc::clone(&email), Arc::clone(&sms)),
            totp_manager.clone(),
            vault.clone(),
            config.clone(),
        );
        let login = LoginFlow::new(
            Arc::clone(&store),
            CodeSender::new(Arc::clone(&store), email, sms),
            TotpService::new(totp_manager, vault, Arc::clone(&store)),
            LockoutManager::new(LockoutPolicy::from(&config), store),
            Arc::clone(&audit),
            config,
        );

        Self {
            registration,
            login,
            audit,
        }
    }

    /// Start a registration: validate input and begin contact verification.
    pub async fn register_begin(&self, req: RegisterRequest) -> Result<PendingRegistration> {
        self.registration.begin(req).await
    }

    /// Verify the code for the currently pending registration contact.
    pub async fn register_verify_contact(
        &self,
        pending: &mut PendingRegistration,
        code: &str,
    ) -> Result<RegistrationStage> {
        self.registration.verify_contact(pending, code).await
    }

    /// Finalize a registration, creating the account.
    pub async fn register_finalize(
        &self,
        pending: PendingRegistration,
    ) -> Result<RegistrationOutcome> {
        self.registration.finalize(pending).await
    }

    /// Send a one-time login code to a bound contact.
    pub async fn send_login_code(&self, contact: &str, method: DeliveryMethod) -> Result<()> {
        self.login.send_code(contact, method).await
    }

    /// Check the first login factor.
    pub async fn first_factor(
        &self,
        username: &str,
        factor: FirstFactor,
    ) -> Result<SecondFactorPending> {
        self.login.first_factor(username, factor).await
    }

    /// Check the second login factor, completing the login on success.
    pub async fn second_factor(
        &self,
        pending: &SecondFactorPending,
        code: &str,
    ) -> Result<Authenticated> {
        self.login.second_factor(pending, code).await
    }

    /// Recorded login attempts for one account, oldest first.
    pub async fn login_history(&self, username: &str) -> Result<Vec<LoginAttempt>> {
        self.audit.history(username).await
    }
}
