//! SMTP email gateway using lettre.

use crate::dispatch::EmailGateway;
use crate::error::{AuthError, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// SMTP configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP server hostname.
    pub host: String,
    /// SMTP server port (default: 587 for STARTTLS).
    pub port: u16,
    /// Username for authentication.
    pub username: Option<String>,
    /// Password for authentication.
    pub password: Option<String>,
    /// Sender address placed on every message.
    pub from: String,
    /// Use STARTTLS (default: true).
    pub starttls: bool,
}

impl SmtpConfig {
    /// Create a new SMTP configuration with the server hostname and sender
    /// address.
    pub fn new(host: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 587,
            username: None,
            password: None,
            from: from.into(),
            starttls: true,
        }
    }

    /// Set the port (default: 587).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set authentication credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Disable STARTTLS (plain connection or implicit TLS).
    #[must_use]
    pub fn no_starttls(mut self) -> Self {
        self.starttls = false;
        self
    }

    /// Create config from environment variables.
    ///
    /// Reads `SMTP_HOST` and `SMTP_FROM` (required), `SMTP_PORT`,
    /// `SMTP_USERNAME`, `SMTP_PASSWORD`, and `SMTP_STARTTLS` (optional).
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("SMTP_HOST")
            .map_err(|_| AuthError::configuration("SMTP_HOST environment variable not set"))?;
        let from = std::env::var("SMTP_FROM")
            .map_err(|_| AuthError::configuration("SMTP_FROM environment variable not set"))?;

        let port = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(587);
        let username = std::env::var("SMTP_USERNAME").ok();
        let password = std::env::var("SMTP_PASSWORD").ok();
        let starttls = std::env::var("SMTP_STARTTLS")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        Ok(Self {
            host,
            port,
            username,
            password,
            from,
            starttls,
        })
    }
}

/// Email gateway delivering one-time codes over SMTP.
pub struct SmtpGateway {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
}

impl SmtpGateway {
    /// Create a new SMTP gateway with the given configuration.
    pub fn new(config: SmtpConfig) -> Result<Self> {
        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| AuthError::configuration(format!("failed to create SMTP transport: {e}")))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| AuthError::configuration(format!("failed to create SMTP transport: {e}")))?
        };

        builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            config,
        })
    }

    /// Create a new SMTP gateway from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(SmtpConfig::from_env()?)
    }

    fn build_message(&self, address: &str, subject: &str, body: &str) -> Result<Message> {
        let from: Mailbox = self
            .config
            .from
            .parse()
            .map_err(|e| AuthError::configuration(format!("invalid SMTP 'from' address: {e}")))?;
        let to: Mailbox = address
            .parse()
            .map_err(|e| AuthError::validation(format!("invalid recipient address '{address}': {e}")))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AuthError::internal(format!("failed to build email: {e}")))
    }
}

#[async_trait]
impl EmailGateway for SmtpGateway {
    async fn send_email(&self, address: &str, subject: &str, body: &str) -> Result<()> {
        let message = self.build_message(address, subject, body)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AuthError::dispatch(format!("SMTP send failed: {e}")))?;

        tracing::debug!(target: "auth.dispatch.email", to = %address, "email dispatched");
        Ok(())
    }
}

// AsyncSmtpTransport does not impl Debug.
impl std::fmt::Debug for SmtpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpGateway")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = SmtpConfig::new("smtp.example.com", "noreply@example.com")
            .port(465)
            .credentials("user", "password")
            .no_starttls();

        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 465);
        assert_eq!(config.username.as_deref(), Some("user"));
        assert!(!config.starttls);
    }

    #[tokio::test]
    async fn test_build_message_rejects_bad_recipient() {
        let gateway =
            SmtpGateway::new(SmtpConfig::new("smtp.example.com", "noreply@example.com")).unwrap();
        let err = gateway
            .build_message("not an address", "Subject", "Body")
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn test_build_message_ok() {
        let gateway =
            SmtpGateway::new(SmtpConfig::new("smtp.example.com", "noreply@example.com")).unwrap();
        assert!(gateway
            .build_message("user@example.com", "Login code", "Your code is 123456")
            .is_ok());
    }
}
