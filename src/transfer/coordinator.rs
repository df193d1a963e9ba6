//! Transfer Orchestrator
//!
//! Composes debit, credit and ledger entries into single units of work.

use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::types::TransferReceipt;
use crate::account::{Account, AccountNumber};
use crate::core_types::AccountId;
use crate::error::WalletError;
use crate::ledger::Transaction;
use crate::money::Money;
use crate::store::{LedgerStore, LedgerTx, atomically};

/// Transfer Orchestrator - deposits, withdrawals and transfers
pub struct TransferOrchestrator {
    store: Arc<dyn LedgerStore>,
}

// ============================================================================
// Validation helpers
// ============================================================================

fn ensure_positive(amount: &Money) -> Result<(), WalletError> {
    if !amount.is_positive() {
        return Err(WalletError::invalid_amount(amount));
    }
    Ok(())
}

fn ensure_currency(account: &Account, amount: &Money) -> Result<(), WalletError> {
    if account.currency() != amount.currency() {
        return Err(WalletError::mismatch(account.currency(), amount.currency()));
    }
    Ok(())
}

fn found(account: Option<Account>, id: AccountId) -> Result<Account, WalletError> {
    let account = account.ok_or_else(|| WalletError::AccountNotFound(id.to_string()))?;
    account.ensure_active()?;
    Ok(account)
}

/// Lock one account for the rest of the unit and check it can be used.
async fn load_active(tx: &mut dyn LedgerTx, id: AccountId) -> Result<Account, WalletError> {
    let account = tx.lock_account(id).await?;
    found(account, id)
}

fn describe(description: String, fallback: impl FnOnce() -> String) -> String {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        fallback()
    } else {
        trimmed.to_string()
    }
}

/// `account` is an id, or a number when the id was never resolved.
fn log_failure(op: &'static str, account: impl fmt::Display, amount: &Money, err: &WalletError) {
    if err.is_validation() {
        warn!(op, account = %account, amount = %amount, code = err.code(), "Rejected: {}", err);
    } else {
        error!(op, account = %account, amount = %amount, code = err.code(), "Failed: {}", err);
    }
}

impl TransferOrchestrator {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Resolve an account number to its id.
    pub async fn resolve(&self, number: &str) -> Result<AccountId, WalletError> {
        let number = AccountNumber::parse(number)?;
        self.store
            .find_account_by_number(&number)
            .await?
            .map(|account| account.id())
            .ok_or_else(|| WalletError::AccountNotFound(number.into_string()))
    }

    // ========================================================================
    // Deposit
    // ========================================================================

    pub async fn deposit(
        &self,
        account_id: AccountId,
        amount: Money,
        description: impl Into<String>,
    ) -> Result<Transaction, WalletError> {
        let description = describe(description.into(), || "Deposit".to_string());
        let result = self.run_deposit(account_id, amount, description).await;

        match &result {
            Ok(entry) => info!(
                account_id = %account_id,
                entry_id = %entry.id(),
                amount = %amount,
                balance = %entry.balance_after(),
                "Deposit committed"
            ),
            Err(err) => log_failure("deposit", account_id, &amount, err),
        }
        result
    }

    async fn run_deposit(
        &self,
        account_id: AccountId,
        amount: Money,
        description: String,
    ) -> Result<Transaction, WalletError> {
        ensure_positive(&amount)?;

        atomically(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let mut account = load_active(tx, account_id).await?;
                ensure_currency(&account, &amount)?;

                let change = account.deposit(&amount)?;
                let entry = Transaction::deposit(account_id, amount, description, change)?;

                tx.update_account(&account).await?;
                tx.append_transaction(&entry).await?;
                Ok(entry)
            })
        })
        .await
    }

    // ========================================================================
    // Withdraw
    // ========================================================================

    pub async fn withdraw(
        &self,
        account_id: AccountId,
        amount: Money,
        description: impl Into<String>,
    ) -> Result<Transaction, WalletError> {
        let description = describe(description.into(), || "Withdrawal".to_string());
        let result = self.run_withdraw(account_id, amount, description).await;

        match &result {
            Ok(entry) => info!(
                account_id = %account_id,
                entry_id = %entry.id(),
                amount = %amount,
                balance = %entry.balance_after(),
                "Withdrawal committed"
            ),
            Err(err) => log_failure("withdraw", account_id, &amount, err),
        }
        result
    }

    async fn run_withdraw(
        &self,
        account_id: AccountId,
        amount: Money,
        description: String,
    ) -> Result<Transaction, WalletError> {
        ensure_positive(&amount)?;

        atomically(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let mut account = load_active(tx, account_id).await?;
                // A foreign-currency amount cannot be compared and surfaces
                // as CurrencyMismatch here.
                account.ensure_covers(&amount)?;
                ensure_currency(&account, &amount)?;

                let change = account.withdraw(&amount)?;
                let entry = Transaction::withdrawal(account_id, amount, description, change)?;

                tx.update_account(&account).await?;
                tx.append_transaction(&entry).await?;
                Ok(entry)
            })
        })
        .await
    }

    // ========================================================================
    // Transfer
    // ========================================================================

    pub async fn transfer(
        &self,
        origin: AccountId,
        destination: AccountId,
        amount: Money,
        description: impl Into<String>,
    ) -> Result<TransferReceipt, WalletError> {
        let result = self
            .run_transfer(origin, destination, amount, description.into())
            .await;

        match &result {
            Ok(receipt) => info!(
                origin = %origin,
                destination = %destination,
                amount = %amount,
                outgoing = %receipt.outgoing.id(),
                incoming = %receipt.incoming.id(),
                "Transfer committed"
            ),
            Err(err) => log_failure("transfer", origin, &amount, err),
        }
        result
    }

    /// Transfer between accounts identified by their numbers.
    ///
    /// Amount and same-account checks run on the numbers themselves, before
    /// either account is looked up.
    pub async fn transfer_by_number(
        &self,
        origin_number: &str,
        destination_number: &str,
        amount: Money,
        description: impl Into<String>,
    ) -> Result<TransferReceipt, WalletError> {
        let resolved = self
            .resolve_pair(origin_number, destination_number, &amount)
            .await;
        match resolved {
            Ok((origin, destination)) => {
                self.transfer(origin, destination, amount, description).await
            }
            Err(err) => {
                log_failure("transfer", origin_number, &amount, &err);
                Err(err)
            }
        }
    }

    async fn resolve_pair(
        &self,
        origin_number: &str,
        destination_number: &str,
        amount: &Money,
    ) -> Result<(AccountId, AccountId), WalletError> {
        ensure_positive(amount)?;
        let origin_number = AccountNumber::parse(origin_number)?;
        let destination_number = AccountNumber::parse(destination_number)?;
        if origin_number == destination_number {
            return Err(WalletError::SameAccountTransfer(origin_number.into_string()));
        }
        let origin = self.resolve(origin_number.as_str()).await?;
        let destination = self.resolve(destination_number.as_str()).await?;
        Ok((origin, destination))
    }

    async fn run_transfer(
        &self,
        origin_id: AccountId,
        destination_id: AccountId,
        amount: Money,
        description: String,
    ) -> Result<TransferReceipt, WalletError> {
        ensure_positive(&amount)?;
        if origin_id == destination_id {
            return Err(WalletError::SameAccountTransfer(origin_id.to_string()));
        }

        atomically(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                // Lock in ascending id order, validate in origin-first order
                let (origin, destination) = if origin_id < destination_id {
                    let o = tx.lock_account(origin_id).await?;
                    let d = tx.lock_account(destination_id).await?;
                    (o, d)
                } else {
                    let d = tx.lock_account(destination_id).await?;
                    let o = tx.lock_account(origin_id).await?;
                    (o, d)
                };

                let mut origin = found(origin, origin_id)?;
                origin.ensure_covers(&amount)?;
                let mut destination = found(destination, destination_id)?;
                ensure_currency(&origin, &amount)?;
                ensure_currency(&destination, &amount)?;

                let out_description = describe(description.clone(), || {
                    format!("Transfer to {}", destination.number())
                });
                let in_description =
                    describe(description, || format!("Transfer from {}", origin.number()));

                let debit = origin.withdraw(&amount)?;
                let credit = destination.deposit(&amount)?;
                let outgoing =
                    Transaction::transfer_out(origin_id, destination_id, amount, out_description, debit)?;
                let incoming =
                    Transaction::transfer_in(origin_id, destination_id, amount, in_description, credit)?;

                tx.update_account(&origin).await?;
                tx.update_account(&destination).await?;
                tx.append_transaction(&outgoing).await?;
                tx.append_transaction(&incoming).await?;

                Ok(TransferReceipt { outgoing, incoming })
            })
        })
        .await
    }
}
