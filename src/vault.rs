//! Symmetric encryption of TOTP secrets at rest.
//!
//! ChaCha20-Poly1305 with a fresh random nonce per encryption; ciphertext is
//! carried as base64 of `nonce (12 bytes) || ciphertext` so it can live in a
//! JSON record.

use crate::config::VaultKey;
use crate::error::{AuthError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;

const NONCE_LEN: usize = 12;

/// Encrypts and decrypts stored secrets with a single process-wide key.
#[derive(Clone)]
pub struct SecretVault {
    cipher: ChaCha20Poly1305,
}

impl SecretVault {
    pub fn new(key: &VaultKey) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key.as_bytes())),
        }
    }

    /// Encrypt a secret for storage.
    pub fn encrypt(&self, secret: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, secret.as_bytes())
            .map_err(|e| AuthError::internal(format!("secret encryption failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(out))
    }

    /// Decrypt a stored secret.
    ///
    /// Fails if the ciphertext was produced under a different key or has
    /// been tampered with.
    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| AuthError::internal(format!("stored secret is not valid base64: {e}")))?;
        if bytes.len() < NONCE_LEN {
            return Err(AuthError::internal("stored secret ciphertext is truncated"));
        }

        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| AuthError::internal("secret decryption failed (wrong vault key?)"))?;

        String::from_utf8(plaintext)
            .map_err(|_| AuthError::internal("decrypted secret is not valid UTF-8"))
    }
}

impl std::fmt::Debug for SecretVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretVault")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let vault = SecretVault::new(&VaultKey::generate());
        let secret = "JBSWY3DPEHPK3PXP";

        let encrypted = vault.encrypt(secret).unwrap();
        assert_ne!(encrypted, secret);
        assert_eq!(vault.decrypt(&encrypted).unwrap(), secret);
    }

    #[test]
    fn test_nonce_makes_ciphertext_unique() {
        let vault = SecretVault::new(&VaultKey::generate());
        let a = vault.encrypt("same secret").unwrap();
        let b = vault.encrypt("same secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let vault = SecretVault::new(&VaultKey::generate());
        let other = SecretVault::new(&VaultKey::generate());

        let encrypted = vault.encrypt("secret").unwrap();
        assert!(other.decrypt(&encrypted).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let vault = SecretVault::new(&VaultKey::generate());
        let encrypted = vault.encrypt("secret").unwrap();

        let mut bytes = BASE64.decode(&encrypted).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let tampered = BASE64.encode(bytes);

        assert!(vault.decrypt(&tampered).is_err());
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let vault = SecretVault::new(&VaultKey::generate());
        let short = BASE64.encode([0u8; 4]);
        assert!(vault.decrypt(&short).is_err());
    }
}
