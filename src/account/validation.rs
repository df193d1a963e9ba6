//! Account number validation
//!
//! Account numbers are 10-20 ASCII digits. The field is private so every
//! instance has passed through [`AccountNumber::parse`] or been generated.

use crate::error::WalletError;
use rand::Rng;
use std::fmt;

pub const MIN_ACCOUNT_NUMBER_LEN: usize = 10;
pub const MAX_ACCOUNT_NUMBER_LEN: usize = 20;

// ============================================================================
// AccountNumber - Validated Account Number (Private Field)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct AccountNumber(String);

impl AccountNumber {
    /// Validate a caller-supplied account number.
    ///
    /// # Validation Rules
    /// - Digits only
    /// - Length: 10-20 characters
    /// - Regex: ^[0-9]{10,20}$
    pub fn parse(raw: &str) -> Result<Self, WalletError> {
        let raw = raw.trim();
        let len_ok = (MIN_ACCOUNT_NUMBER_LEN..=MAX_ACCOUNT_NUMBER_LEN).contains(&raw.len());
        if !len_ok || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(WalletError::InvalidAccountNumber(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    /// Generate a random number of `len` digits (clamped to 10-20).
    /// The leading digit is never zero.
    pub fn generate(len: usize) -> Self {
        let len = len.clamp(MIN_ACCOUNT_NUMBER_LEN, MAX_ACCOUNT_NUMBER_LEN);
        let mut rng = rand::thread_rng();
        let mut digits = String::with_capacity(len);
        digits.push(char::from(b'0' + rng.gen_range(1..=9u8)));
        for _ in 1..len {
            digits.push(char::from(b'0' + rng.gen_range(0..=9u8)));
        }
        Self(digits)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AccountNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
