//! Account entity and its balance invariants

use crate::core_types::{AccountId, OwnerId};
use crate::error::WalletError;
use crate::money::{Currency, Money};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::validation::AccountNumber;

/// Balance snapshot captured at mutation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalanceChange {
    pub before: Money,
    pub after: Money,
}

/// User-owned account holding a single-currency balance.
///
/// # Invariants
/// - `balance >= 0` after every mutation
/// - balance currency is fixed at creation
/// - only [`Account::deposit`] and [`Account::withdraw`] move the balance
///
/// Mutations are in-memory only. Persisting them is the caller's step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    id: AccountId,
    number: AccountNumber,
    owner_id: OwnerId,
    balance: Money,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Account {
    /// Open a new active account with zero balance.
    pub fn open(owner_id: OwnerId, number: AccountNumber, currency: Currency) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            number,
            owner_id,
            balance: Money::zero(currency),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild an account from stored state.
    pub fn restore(
        id: AccountId,
        number: AccountNumber,
        owner_id: OwnerId,
        balance: Money,
        active: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            number,
            owner_id,
            balance,
            active,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn number(&self) -> &AccountNumber {
        &self.number
    }

    pub fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    pub fn balance(&self) -> Money {
        self.balance
    }

    pub fn currency(&self) -> Currency {
        self.balance.currency()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// `AccountInactive` unless the account is active.
    pub fn ensure_active(&self) -> Result<(), WalletError> {
        if !self.active {
            return Err(WalletError::AccountInactive {
                account_id: self.id.to_string(),
                account_number: self.number.to_string(),
            });
        }
        Ok(())
    }

    /// `InsufficientFunds` if withdrawing `amount` would leave a negative balance.
    pub fn ensure_covers(&self, amount: &Money) -> Result<(), WalletError> {
        if self.balance.compare(amount)?.is_lt() {
            return Err(WalletError::InsufficientFunds {
                account_id: self.id.to_string(),
                available: self.balance.to_string(),
                requested: amount.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_valid_amount(&self, amount: &Money) -> Result<(), WalletError> {
        if !amount.is_positive() {
            return Err(WalletError::invalid_amount(amount));
        }
        if amount.currency() != self.currency() {
            return Err(WalletError::mismatch(self.currency(), amount.currency()));
        }
        Ok(())
    }

    pub fn deposit(&mut self, amount: &Money) -> Result<BalanceChange, WalletError> {
        self.ensure_valid_amount(amount)?;
        let before = self.balance;
        self.balance = before.add(amount)?;
        self.touch();
        Ok(BalanceChange {
            before,
            after: self.balance,
        })
    }

    pub fn withdraw(&mut self, amount: &Money) -> Result<BalanceChange, WalletError> {
        self.ensure_valid_amount(amount)?;
        self.ensure_covers(amount)?;
        let before = self.balance;
        self.balance = before.subtract(amount)?;
        self.touch();
        Ok(BalanceChange {
            before,
            after: self.balance,
        })
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.touch();
    }

    pub fn reactivate(&mut self) {
        self.active = true;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pen(amount: &str) -> Money {
        Money::parse(amount, "PEN").unwrap()
    }

    fn account_with(balance: &str) -> Account {
        let mut account = Account::open(
            OwnerId::new("user-1").unwrap(),
            AccountNumber::generate(12),
            Currency::parse("PEN").unwrap(),
        );
        if balance != "0" {
            account.deposit(&pen(balance)).unwrap();
        }
        account
    }

    #[test]
    fn test_open_starts_empty_and_active() {
        let account = account_with("0");
        assert!(account.is_active());
        assert!(account.balance().is_zero());
        assert_eq!(account.currency().as_str(), "PEN");
        assert_eq!(account.created_at(), account.updated_at());
    }

    #[test]
    fn test_deposit_returns_snapshot() {
        let mut account = account_with("0");
        let change = account.deposit(&pen("250.50")).unwrap();
        assert_eq!(change.before, pen("0"));
        assert_eq!(change.after, pen("250.50"));
        assert_eq!(account.balance(), pen("250.50"));
    }

    #[test]
    fn test_withdraw_exact_balance_allowed() {
        let mut account = account_with("100");
        let change = account.withdraw(&pen("100")).unwrap();
        assert!(change.after.is_zero());
    }

    #[test]
    fn test_withdraw_overdraft_rejected_without_change() {
        let mut account = account_with("100");
        let err = account.withdraw(&pen("100.01")).unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { .. }));
        assert_eq!(account.balance(), pen("100"));
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let mut account = account_with("100");
        for raw in ["0", "-5", "0.004"] {
            assert!(matches!(
                account.deposit(&pen(raw)),
                Err(WalletError::InvalidAmount { .. })
            ));
            assert!(matches!(
                account.withdraw(&pen(raw)),
                Err(WalletError::InvalidAmount { .. })
            ));
        }
        assert_eq!(account.balance(), pen("100"));
    }

    #[test]
    fn test_foreign_currency_rejected() {
        let mut account = account_with("100");
        let usd = Money::parse("10", "USD").unwrap();
        assert!(matches!(
            account.deposit(&usd),
            Err(WalletError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_deactivate_and_reactivate() {
        let mut account = account_with("0");
        account.deactivate();
        assert!(matches!(
            account.ensure_active(),
            Err(WalletError::AccountInactive { .. })
        ));
        account.reactivate();
        assert!(account.ensure_active().is_ok());
    }
}
