//! SMS gateway backed by the Twilio REST API.
//!
//! Success is decided from the HTTP response status, an explicit signal from
//! the provider, never from matching error message text.

use crate::dispatch::SmsGateway;
use crate::error::{AuthError, Result};
use async_trait::async_trait;

/// Twilio account configuration.
#[derive(Clone)]
pub struct TwilioConfig {
    /// Account SID.
    pub account_sid: String,
    /// Auth token.
    pub auth_token: String,
    /// Sender phone number in E.164 format.
    pub from_number: String,
}

impl TwilioConfig {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from_number: impl Into<String>,
    ) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            from_number: from_number.into(),
        }
    }

    /// Create config from `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`, and
    /// `TWILIO_FROM_NUMBER`.
    pub fn from_env() -> Result<Self> {
        let account_sid = std::env::var("TWILIO_ACCOUNT_SID")
            .map_err(|_| AuthError::configuration("TWILIO_ACCOUNT_SID environment variable not set"))?;
        let auth_token = std::env::var("TWILIO_AUTH_TOKEN")
            .map_err(|_| AuthError::configuration("TWILIO_AUTH_TOKEN environment variable not set"))?;
        let from_number = std::env::var("TWILIO_FROM_NUMBER")
            .map_err(|_| AuthError::configuration("TWILIO_FROM_NUMBER environment variable not set"))?;

        Ok(Self {
            account_sid,
            auth_token,
            from_number,
        })
    }
}

// Never print the auth token.
impl std::fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("from_number", &self.from_number)
            .finish()
    }
}

/// SMS gateway delivering one-time codes via Twilio.
#[derive(Debug, Clone)]
pub struct TwilioSmsGateway {
    client: reqwest::Client,
    config: TwilioConfig,
    base_url: String,
}

impl TwilioSmsGateway {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            base_url: "https://api.twilio.com".to_string(),
        }
    }

    /// Create a new Twilio gateway from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(TwilioConfig::from_env()?))
    }

    /// Override the API base URL (for tests against a local stub).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SmsGateway for TwilioSmsGateway {
    async fn send_sms(&self, phone: &str, body: &str) -> Result<()> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.config.account_sid
        );
        let params = [
            ("To", phone),
            ("From", self.config.from_number.as_str()),
            ("Body", body),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::dispatch(format!("twilio request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::dispatch(format!("twilio returned {status}")));
        }

        tracing::info!(target: "auth.dispatch.sms", to = %phone, "SMS dispatched via Twilio");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_debug_redacts_token() {
        let config = TwilioConfig::new("ACxxxx", "very-secret-token", "+15550001111");
        let debug = format!("{config:?}");
        assert!(debug.contains("ACxxxx"));
        assert!(!debug.contains("very-secret-token"));
    }
}
