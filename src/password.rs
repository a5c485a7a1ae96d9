//! Password hashing and verification.
//!
//! The digest is a deterministic SHA-256 hex string: the same input always
//! yields the same digest, and verification is re-hash-and-compare. Both
//! operations are pure; rejecting empty input is the caller's job.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// One-way transform of plaintext passwords for storage and comparison.
#[derive(Clone, Copy, Debug, Default)]
pub struct PasswordHasher;

impl PasswordHasher {
    pub fn new() -> Self {
        Self
    }

    /// Hash a password to a lowercase hex digest.
    pub fn hash(&self, password: &str) -> String {
        use std::fmt::Write;

        let digest = Sha256::digest(password.as_bytes());
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(out, "{byte:02x}");
        }
        out
    }

    /// Verify a password against a stored digest in constant time.
    pub fn verify(&self, password: &str, stored_digest: &str) -> bool {
        let recomputed = self.hash(password);
        recomputed.as_bytes().ct_eq(stored_digest.as_bytes()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        let hasher = PasswordHasher::new();
        assert_eq!(hasher.hash("password123"), hasher.hash("password123"));
    }

    #[test]
    fn test_known_digest() {
        let hasher = PasswordHasher::new();
        assert_eq!(
            hasher.hash("password123"),
            "ef92b778bafe771e89245b89ecbc08a44a4e166c06659911881f383d4473e94f"
        );
    }

    #[test]
    fn test_verify() {
        let hasher = PasswordHasher::new();
        let digest = hasher.hash("correct-horse-battery-staple");

        assert!(hasher.verify("correct-horse-battery-staple", &digest));
        assert!(!hasher.verify("wrong-password", &digest));
        assert!(!hasher.verify("correct-horse-battery-staple", "not-a-digest"));
    }

    #[test]
    fn test_digest_is_not_plaintext() {
        let hasher = PasswordHasher::new();
        let digest = hasher.hash("hunter22");
        assert!(!digest.contains("hunter22"));
        assert_eq!(digest.len(), 64);
    }
}
