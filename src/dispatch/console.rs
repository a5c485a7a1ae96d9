//! Console gateways for development.
//!
//! Print messages to stdout instead of sending them. Message bodies carry
//! one-time codes, so they are redacted unless full output is enabled;
//! stdout is often captured by log collectors.

use crate::dispatch::{EmailGateway, SmsGateway};
use crate::error::Result;
use async_trait::async_trait;

/// Prints emails to stdout. Development only.
#[derive(Debug, Clone)]
pub struct ConsoleEmailGateway {
    prefix: String,
    show_full_content: bool,
}

impl ConsoleEmailGateway {
    pub fn new() -> Self {
        Self {
            prefix: "[EMAIL]".to_string(),
            show_full_content: false,
        }
    }

    /// Show message bodies (and the codes inside them) in the output.
    pub fn with_full_output(mut self, enabled: bool) -> Self {
        if enabled {
            tracing::warn!(
                "ConsoleEmailGateway: full output enabled - one-time codes will be visible in logs"
            );
        }
        self.show_full_content = enabled;
        self
    }
}

impl Default for ConsoleEmailGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailGateway for ConsoleEmailGateway {
    async fn send_email(&self, address: &str, subject: &str, body: &str) -> Result<()> {
        println!("{} To:      {}", self.prefix, address);
        println!("{} Subject: {}", self.prefix, subject);
        if self.show_full_content {
            for line in body.lines() {
                println!("{} {}", self.prefix, line);
            }
        } else {
            println!("{} [BODY] {} bytes [REDACTED]", self.prefix, body.len());
        }
        Ok(())
    }
}

/// Prints SMS messages to stdout. Development only.
#[derive(Debug, Clone)]
pub struct ConsoleSmsGateway {
    prefix: String,
    show_full_content: bool,
}

impl ConsoleSmsGateway {
    pub fn new() -> Self {
        Self {
            prefix: "[SMS]".to_string(),
            show_full_content: false,
        }
    }

    /// Show message bodies (and the codes inside them) in the output.
    pub fn with_full_output(mut self, enabled: bool) -> Self {
        if enabled {
            tracing::warn!(
                "ConsoleSmsGateway: full output enabled - one-time codes will be visible in logs"
            );
        }
        self.show_full_content = enabled;
        self
    }
}

impl Default for ConsoleSmsGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SmsGateway for ConsoleSmsGateway {
    async fn send_sms(&self, phone: &str, body: &str) -> Result<()> {
        println!("{} To: {}", self.prefix, phone);
        if self.show_full_content {
            println!("{} {}", self.prefix, body);
        } else {
            println!("{} [BODY] {} bytes [REDACTED]", self.prefix, body.len());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_console_email_sends_without_error() {
        let gateway = ConsoleEmailGateway::new();
        let result = gateway
            .send_email("user@example.com", "Login code", "Your code is 123456")
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_console_sms_sends_without_error() {
        let gateway = ConsoleSmsGateway::new().with_full_output(true);
        let result = gateway.send_sms("+15550001111", "Your code is 123456").await;
        assert!(result.is_ok());
    }
}
