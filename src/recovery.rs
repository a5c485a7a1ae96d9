//! Single-use recovery codes for second-factor fallback.

use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;

/// Generates short random hex tokens used as single-use backup credentials.
#[derive(Clone, Debug)]
pub struct RecoveryCodeGenerator {
    /// Number of codes to generate.
    pub count: usize,
    /// Random bytes per code; each byte renders as two hex characters.
    pub bytes: usize,
}

impl Default for RecoveryCodeGenerator {
    fn default() -> Self {
        Self { count: 5, bytes: 4 }
    }
}

impl RecoveryCodeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Generate a fresh set of recovery codes.
    pub fn generate(&self) -> Vec<String> {
        (0..self.count).map(|_| self.generate_one()).collect()
    }

    fn generate_one(&self) -> String {
        use std::fmt::Write;

        let mut raw = vec![0u8; self.bytes];
        OsRng.fill_bytes(&mut raw);

        let mut out = String::with_capacity(self.bytes * 2);
        for byte in raw {
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

/// Find a matching code, returning its index so the caller can remove it.
///
/// Input is trimmed and lowercased before a constant-time comparison.
pub fn match_code(input: &str, valid_codes: &[String]) -> Option<usize> {
    let normalized = input.trim().to_lowercase();
    valid_codes
        .iter()
        .position(|code| code.as_bytes().ct_eq(normalized.as_bytes()).into())
}
