//! Ledger entry (Transaction) model
//!
//! An entry documents one balance-changing event on one account. Entries are
//! immutable once built: there are factories, no mutators. A factory refuses
//! a non-positive amount or a snapshot that does not add up.

use crate::account::BalanceChange;
use crate::core_types::{AccountId, TransactionId};
use crate::error::WalletError;
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

// ============================================================================
// TransactionType
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    TransferOut,
    TransferIn,
}

impl TransactionType {
    pub const ALL: [TransactionType; 4] = [
        TransactionType::Deposit,
        TransactionType::Withdrawal,
        TransactionType::TransferOut,
        TransactionType::TransferIn,
    ];

    /// Stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSITO",
            TransactionType::Withdrawal => "RETIRO",
            TransactionType::TransferOut => "TRANSFERENCIA_SALIDA",
            TransactionType::TransferIn => "TRANSFERENCIA_ENTRADA",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(code.trim()))
    }

    /// Credit kinds add to the balance, debit kinds subtract.
    pub fn is_credit(&self) -> bool {
        matches!(self, TransactionType::Deposit | TransactionType::TransferIn)
    }

}

impl Serialize for TransactionType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Transaction
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    id: TransactionId,
    kind: TransactionType,
    /// Account whose balance this entry documents
    account_id: AccountId,
    amount: Money,
    origin_account_id: Option<AccountId>,
    destination_account_id: Option<AccountId>,
    description: String,
    timestamp: DateTime<Utc>,
    balance_before: Money,
    balance_after: Money,
}

impl Transaction {
    fn build(
        kind: TransactionType,
        account_id: AccountId,
        amount: Money,
        origin_account_id: Option<AccountId>,
        destination_account_id: Option<AccountId>,
        description: impl Into<String>,
        change: BalanceChange,
    ) -> Result<Self, WalletError> {
        if !amount.is_positive() {
            return Err(WalletError::invalid_amount(amount));
        }
        let entry = Self {
            id: TransactionId::new(),
            kind,
            account_id,
            amount,
            origin_account_id,
            destination_account_id,
            description: description.into(),
            timestamp: Utc::now(),
            balance_before: change.before,
            balance_after: change.after,
        };
        if !entry.is_consistent() {
            return Err(WalletError::InconsistentEntry(format!(
                "{} of {}: {} -> {}",
                entry.kind, entry.amount, entry.balance_before, entry.balance_after
            )));
        }
        Ok(entry)
    }

    pub fn deposit(
        account_id: AccountId,
        amount: Money,
        description: impl Into<String>,
        change: BalanceChange,
    ) -> Result<Self, WalletError> {
        Self::build(
            TransactionType::Deposit,
            account_id,
            amount,
            Some(account_id),
            None,
            description,
            change,
        )
    }

    pub fn withdrawal(
        account_id: AccountId,
        amount: Money,
        description: impl Into<String>,
        change: BalanceChange,
    ) -> Result<Self, WalletError> {
        Self::build(
            TransactionType::Withdrawal,
            account_id,
            amount,
            Some(account_id),
            None,
            description,
            change,
        )
    }

    /// Outgoing leg: documents the origin, references the destination.
    pub fn transfer_out(
        origin: AccountId,
        destination: AccountId,
        amount: Money,
        description: impl Into<String>,
        change: BalanceChange,
    ) -> Result<Self, WalletError> {
        Self::build(
            TransactionType::TransferOut,
            origin,
            amount,
            Some(origin),
            Some(destination),
            description,
            change,
        )
    }

    /// Incoming leg: documents the destination, references the origin.
    pub fn transfer_in(
        origin: AccountId,
        destination: AccountId,
        amount: Money,
        description: impl Into<String>,
        change: BalanceChange,
    ) -> Result<Self, WalletError> {
        Self::build(
            TransactionType::TransferIn,
            destination,
            amount,
            Some(origin),
            Some(destination),
            description,
            change,
        )
    }

    /// Rebuild an entry read from storage.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: TransactionId,
        kind: TransactionType,
        account_id: AccountId,
        amount: Money,
        origin_account_id: Option<AccountId>,
        destination_account_id: Option<AccountId>,
        description: String,
        timestamp: DateTime<Utc>,
        balance_before: Money,
        balance_after: Money,
    ) -> Self {
        Self {
            id,
            kind,
            account_id,
            amount,
            origin_account_id,
            destination_account_id,
            description,
            timestamp,
            balance_before,
            balance_after,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn kind(&self) -> TransactionType {
        self.kind
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn origin_account_id(&self) -> Option<AccountId> {
        self.origin_account_id
    }

    pub fn destination_account_id(&self) -> Option<AccountId> {
        self.destination_account_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn balance_before(&self) -> Money {
        self.balance_before
    }

    pub fn balance_after(&self) -> Money {
        self.balance_after
    }

    /// `amount > 0` and `balance_after == balance_before ± amount`.
    pub fn is_consistent(&self) -> bool {
        if !self.amount.is_positive() {
            return false;
        }
        let expected = if self.kind.is_credit() {
            self.balance_before.add(&self.amount)
        } else {
            self.balance_before.subtract(&self.amount)
        };
        matches!(expected, Ok(after) if after == self.balance_after)
    }
}
