//! The durable user credential record.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::SystemTime;

/// Delivery channel for out-of-band one-time codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    Email,
    Sms,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
        }
    }
}

impl std::fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A one-time code together with its issuance timestamp.
///
/// Expiry is checked lazily at validation time; nothing sweeps stale codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedCode {
    pub code: String,
    pub issued_at: SystemTime,
}

/// One credential record per username; the username is the store key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Immutable once created, unique across the store.
    pub username: String,
    /// One-way digest of the password; never the plaintext.
    pub password_hash: String,
    /// TOTP shared secret as vault ciphertext (base64). Decrypted on demand,
    /// never persisted in plaintext.
    pub encrypted_totp_secret: String,
    /// Optional contact identifiers; each value binds to at most one record.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Single-use tokens; each is removed the moment it matches.
    #[serde(default)]
    pub recovery_codes: Vec<String>,
    /// Incremented on any factor failure, reset to zero on full success.
    #[serde(default)]
    pub failed_attempts: u32,
    /// The account is locked while now is before this time.
    #[serde(default)]
    pub locked_until: Option<SystemTime>,
    /// Most recently issued login code per delivery method; each new
    /// issuance overwrites the previous entry for that method.
    #[serde(default)]
    pub verification_codes: HashMap<DeliveryMethod, IssuedCode>,
    /// Last accepted TOTP time step; a second code in the same step is a
    /// replay and is rejected.
    #[serde(default)]
    pub last_totp_step: Option<u64>,
}

impl UserRecord {
    /// The contact value bound for a delivery method, if any.
    pub fn contact(&self, method: DeliveryMethod) -> Option<&str> {
        match method {
            DeliveryMethod::Email => self.email.as_deref(),
            DeliveryMethod::Sms => self.phone.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> UserRecord {
        UserRecord {
            username: "alice".into(),
            password_hash: "digest".into(),
            encrypted_totp_secret: "ciphertext".into(),
            email: Some("alice@example.com".into()),
            phone: None,
            recovery_codes: vec!["a1b2c3d4".into()],
            failed_attempts: 2,
            locked_until: None,
            verification_codes: HashMap::new(),
            last_totp_step: Some(57_000_000),
        }
    }

    #[test]
    fn test_contact_lookup() {
        let record = sample_record();
        assert_eq!(record.contact(DeliveryMethod::Email), Some("alice@example.com"));
        assert_eq!(record.contact(DeliveryMethod::Sms), None);
    }

    #[test]
    fn test_record_json_round_trip() {
        let mut record = sample_record();
        record.verification_codes.insert(
            DeliveryMethod::Sms,
            IssuedCode {
                code: "123456".into(),
                issued_at: SystemTime::UNIX_EPOCH,
            },
        );

        let json = serde_json::to_string(&record).unwrap();
        let back: UserRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.username, "alice");
        assert_eq!(back.failed_attempts, 2);
        assert_eq!(back.verification_codes[&DeliveryMethod::Sms].code, "123456");
        assert_eq!(back.last_totp_step, Some(57_000_000));
    }

    #[test]
    fn test_missing_fields_default() {
        // Records written by older versions may lack the newer fields.
        let json = r#"{
            "username": "bob",
            "password_hash": "digest",
            "encrypted_totp_secret": "ciphertext"
        }"#;
        let record: UserRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.failed_attempts, 0);
        assert!(record.locked_until.is_none());
        assert!(record.recovery_codes.is_empty());
        assert!(record.verification_codes.is_empty());
        assert!(record.last_totp_step.is_none());
    }
}
