//! Message dispatch gateways.
//!
//! The verification code service talks to an [`EmailGateway`] and an
//! [`SmsGateway`]; everything behind those traits is an external
//! collaborator. Backends are interchangeable without touching verification
//! logic: swap Twilio for another SMS provider by implementing
//! [`SmsGateway`].
//!
//! Bundled backends:
//! - [`ConsoleEmailGateway`] / [`ConsoleSmsGateway`]: print to stdout, for
//!   development.
//! - [`SmtpGateway`]: real email over SMTP via lettre.
//! - [`TwilioSmsGateway`]: real SMS via the Twilio REST API.
//! - [`MemoryGateway`]: records messages in memory, for tests.

mod console;
mod memory;
mod smtp;
mod twilio;

pub use console::{ConsoleEmailGateway, ConsoleSmsGateway};
pub use memory::{MemoryGateway, SentMessage};
pub use smtp::{SmtpConfig, SmtpGateway};
pub use twilio::{TwilioConfig, TwilioSmsGateway};

use crate::error::Result;
use async_trait::async_trait;

/// Sends a message to an email address.
///
/// A failure must mean the message was not delivered; the caller aborts the
/// in-progress code issuance on error and persists nothing.
#[async_trait]
pub trait EmailGateway: Send + Sync {
    async fn send_email(&self, address: &str, subject: &str, body: &str) -> Result<()>;
}

/// Sends a message to a phone number.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send_sms(&self, phone: &str, body: &str) -> Result<()>;
}
