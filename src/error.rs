//! Wallet Error Types
//!
//! Every operation of the ledger core returns either a typed value or exactly
//! one [`WalletError`] kind. Store adapters report [`PersistenceError`], which
//! is folded into the wallet taxonomy at the store boundary.

use thiserror::Error;

/// Failure raised by a store adapter.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("account number already taken: {0}")]
    DuplicateAccountNumber(String),

    #[error("stored row is corrupt: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("ledger entry does not add up: {0}")]
    InconsistentEntry(String),
}

/// Ledger error kinds
///
/// Each variant carries enough context (account id/number, amount, currency)
/// to render a precise message upstream.
#[derive(Error, Debug)]
pub enum WalletError {
    // === Validation Errors ===
    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: String },

    #[error("Invalid currency code: {code:?}")]
    InvalidCurrency { code: String },

    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account {account_number} ({account_id}) is inactive")]
    AccountInactive {
        account_id: String,
        account_number: String,
    },

    #[error("Origin and destination account are the same: {0}")]
    SameAccountTransfer(String),

    #[error("Insufficient funds in {account_id}: available {available}, requested {requested}")]
    InsufficientFunds {
        account_id: String,
        available: String,
        requested: String,
    },

    #[error("Invalid account number: {0:?}")]
    InvalidAccountNumber(String),

    #[error("Invalid owner id: {0:?}")]
    InvalidOwner(String),

    // === Creation Errors ===
    #[error("Account number already exists: {0}")]
    DuplicateAccountNumber(String),

    // === Collaborator Errors ===
    #[error("Exchange rate {from}->{to} unavailable: {reason}")]
    RateUnavailable {
        from: String,
        to: String,
        reason: String,
    },

    // === System Errors ===
    #[error("Inconsistent ledger entry: {0}")]
    InconsistentEntry(String),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[source] PersistenceError),
}

impl WalletError {
    /// Stable identifier for logs and API responses
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::InvalidAmount { .. } => "INVALID_AMOUNT",
            WalletError::InvalidCurrency { .. } => "INVALID_CURRENCY",
            WalletError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            WalletError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            WalletError::AccountInactive { .. } => "ACCOUNT_INACTIVE",
            WalletError::SameAccountTransfer(_) => "SAME_ACCOUNT_TRANSFER",
            WalletError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            WalletError::InvalidAccountNumber(_) => "INVALID_ACCOUNT_NUMBER",
            WalletError::InvalidOwner(_) => "INVALID_OWNER",
            WalletError::DuplicateAccountNumber(_) => "DUPLICATE_ACCOUNT_NUMBER",
            WalletError::RateUnavailable { .. } => "RATE_UNAVAILABLE",
            WalletError::InconsistentEntry(_) => "INCONSISTENT_ENTRY",
            WalletError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
        }
    }

    /// Caller-input errors. These are detected before any write and are never
    /// worth retrying with the same arguments.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WalletError::InvalidAmount { .. }
                | WalletError::InvalidCurrency { .. }
                | WalletError::CurrencyMismatch { .. }
                | WalletError::AccountNotFound(_)
                | WalletError::AccountInactive { .. }
                | WalletError::SameAccountTransfer(_)
                | WalletError::InsufficientFunds { .. }
                | WalletError::InvalidAccountNumber(_)
                | WalletError::InvalidOwner(_)
        )
    }

    pub(crate) fn invalid_amount(amount: impl ToString) -> Self {
        WalletError::InvalidAmount {
            amount: amount.to_string(),
        }
    }

    pub(crate) fn mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        WalletError::CurrencyMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

impl From<PersistenceError> for WalletError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::DuplicateAccountNumber(number) => {
                WalletError::DuplicateAccountNumber(number)
            }
            PersistenceError::InconsistentEntry(detail) => WalletError::InconsistentEntry(detail),
            other => WalletError::PersistenceFailure(other),
        }
    }
}

impl From<sqlx::Error> for WalletError {
    fn from(err: sqlx::Error) -> Self {
        WalletError::PersistenceFailure(PersistenceError::Database(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            WalletError::SameAccountTransfer("x".into()).code(),
            "SAME_ACCOUNT_TRANSFER"
        );
        assert_eq!(
            WalletError::InsufficientFunds {
                account_id: "a".into(),
                available: "1.00 PEN".into(),
                requested: "2.00 PEN".into(),
            }
            .code(),
            "INSUFFICIENT_FUNDS"
        );
        assert_eq!(
            WalletError::from(PersistenceError::Unavailable("down".into())).code(),
            "PERSISTENCE_FAILURE"
        );
    }

    #[test]
    fn test_duplicate_number_is_not_wrapped() {
        let err: WalletError = PersistenceError::DuplicateAccountNumber("1234567890".into()).into();
        assert!(matches!(err, WalletError::DuplicateAccountNumber(ref n) if n == "1234567890"));
        assert!(!err.is_validation());
    }

    #[test]
    fn test_rejected_entry_is_not_a_validation_error() {
        let err = WalletError::from(PersistenceError::InconsistentEntry("x".into()));
        assert_eq!(err.code(), "INCONSISTENT_ENTRY");
        assert!(!err.is_validation());
    }

    #[test]
    fn test_persistence_failure_keeps_cause() {
        let err: WalletError = PersistenceError::Unavailable("connection reset".into()).into();
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("store unavailable: connection reset"));
    }

    #[test]
    fn test_display() {
        let err = WalletError::CurrencyMismatch {
            expected: "PEN".into(),
            actual: "USD".into(),
        };
        assert_eq!(err.to_string(), "Currency mismatch: expected PEN, got USD");
        assert!(err.is_validation());
    }
}
