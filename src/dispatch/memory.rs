//! In-memory gateway that records every dispatched message.
//!
//! Serves as both the email and SMS backend in tests: assertions can read
//! the delivered code back out, and the gateway can be switched into a
//! failing mode to exercise dispatch-error paths.

use crate::dispatch::{EmailGateway, SmsGateway};
use crate::error::{AuthError, Result};
use crate::store::DeliveryMethod;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// A message captured by [`MemoryGateway`].
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub channel: DeliveryMethod,
    pub to: String,
    pub body: String,
}

/// Records messages instead of sending them.
#[derive(Default, Clone)]
pub struct MemoryGateway {
    sent: Arc<RwLock<Vec<SentMessage>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail with a dispatch error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All messages captured so far, oldest first.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.read().expect("gateway lock poisoned").clone()
    }

    /// The verification code inside the most recent message, if any.
    ///
    /// Code bodies end with the code itself, so the last whitespace-separated
    /// token is returned.
    pub fn last_code(&self) -> Option<String> {
        let sent = self.sent.read().expect("gateway lock poisoned");
        sent.last()
            .and_then(|msg| msg.body.split_whitespace().last())
            .map(str::to_string)
    }

    fn record(&self, channel: DeliveryMethod, to: &str, body: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuthError::dispatch("memory gateway set to fail"));
        }
        self.sent.write().expect("gateway lock poisoned").push(SentMessage {
            channel,
            to: to.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl EmailGateway for MemoryGateway {
    async fn send_email(&self, address: &str, _subject: &str, body: &str) -> Result<()> {
        self.record(DeliveryMethod::Email, address, body)
    }
}

#[async_trait]
impl SmsGateway for MemoryGateway {
    async fn send_sms(&self, phone: &str, body: &str) -> Result<()> {
        self.record(DeliveryMethod::Sms, phone, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_messages() {
        let gateway = MemoryGateway::new();
        gateway
            .send_email("user@example.com", "Code", "Your code is 123456")
            .await
            .unwrap();
        gateway.send_sms("+15550001111", "Your code is 654321").await.unwrap();

        let sent = gateway.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].channel, DeliveryMethod::Email);
        assert_eq!(sent[1].channel, DeliveryMethod::Sms);
        assert_eq!(gateway.last_code().as_deref(), Some("654321"));
    }

    #[tokio::test]
    async fn test_failing_mode() {
        let gateway = MemoryGateway::new();
        gateway.set_failing(true);

        let err = gateway
            .send_email("user@example.com", "Code", "Your code is 123456")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Dispatch(_)));
        assert!(gateway.sent().is_empty());

        gateway.set_failing(false);
        assert!(gateway.send_sms("+15550001111", "ok 111111").await.is_ok());
    }
}
