//! Account lifecycle service
//!
//! Opening, lookup, activation state and administrative removal of accounts.
//! Balance movements belong to [`crate::transfer::TransferOrchestrator`].

use std::sync::Arc;
use tracing::{info, warn};

use super::models::Account;
use super::validation::AccountNumber;
use crate::config::LedgerConfig;
use crate::core_types::{AccountId, OwnerId};
use crate::error::WalletError;
use crate::money::{Currency, Money};
use crate::store::{LedgerStore, atomically};

pub struct AccountService {
    store: Arc<dyn LedgerStore>,
    default_currency: Currency,
    number_length: usize,
}

impl AccountService {
    pub fn new(store: Arc<dyn LedgerStore>, config: &LedgerConfig) -> Result<Self, WalletError> {
        Ok(Self {
            store,
            default_currency: Currency::parse(&config.default_currency)?,
            number_length: config.account_number_length,
        })
    }

    pub fn default_currency(&self) -> Currency {
        self.default_currency
    }

    /// Open a zero-balance account with a freshly generated number.
    ///
    /// A number collision is reported as `DuplicateAccountNumber`; the caller
    /// may simply call again to get a new number.
    pub async fn open_account(
        &self,
        owner_id: &str,
        currency: Option<Currency>,
    ) -> Result<Account, WalletError> {
        let owner = OwnerId::new(owner_id)
            .ok_or_else(|| WalletError::InvalidOwner(owner_id.to_string()))?;
        let currency = currency.unwrap_or(self.default_currency);
        let account = Account::open(owner, AccountNumber::generate(self.number_length), currency);

        let result = atomically(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                tx.insert_account(&account).await?;
                Ok(account)
            })
        })
        .await;

        match &result {
            Ok(account) => info!(
                account_id = %account.id(),
                number = %account.number(),
                owner = %account.owner_id(),
                currency = %account.currency(),
                "Account opened"
            ),
            Err(err) => warn!(owner = owner_id, code = err.code(), "Account not opened: {}", err),
        }
        result
    }

    pub async fn account(&self, id: AccountId) -> Result<Account, WalletError> {
        self.store
            .find_account(id)
            .await?
            .ok_or_else(|| WalletError::AccountNotFound(id.to_string()))
    }

    pub async fn account_by_number(&self, number: &str) -> Result<Account, WalletError> {
        let number = AccountNumber::parse(number)?;
        self.store
            .find_account_by_number(&number)
            .await?
            .ok_or_else(|| WalletError::AccountNotFound(number.into_string()))
    }

    pub async fn balance(&self, number: &str) -> Result<Money, WalletError> {
        Ok(self.account_by_number(number).await?.balance())
    }

    /// Accounts of an owner, newest first.
    pub async fn accounts_of(
        &self,
        owner_id: &str,
        active_only: bool,
    ) -> Result<Vec<Account>, WalletError> {
        let Some(owner) = OwnerId::new(owner_id) else {
            return Ok(Vec::new());
        };
        Ok(self.store.accounts_by_owner(&owner, active_only).await?)
    }

    pub async fn all_accounts(&self) -> Result<Vec<Account>, WalletError> {
        Ok(self.store.all_accounts().await?)
    }

    pub async fn deactivate(&self, id: AccountId) -> Result<Account, WalletError> {
        self.set_active(id, false).await
    }

    pub async fn reactivate(&self, id: AccountId) -> Result<Account, WalletError> {
        self.set_active(id, true).await
    }

    async fn set_active(&self, id: AccountId, active: bool) -> Result<Account, WalletError> {
        let account = atomically(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let mut account = tx
                    .lock_account(id)
                    .await?
                    .ok_or_else(|| WalletError::AccountNotFound(id.to_string()))?;
                if active {
                    account.reactivate();
                } else {
                    account.deactivate();
                }
                tx.update_account(&account).await?;
                Ok(account)
            })
        })
        .await?;

        info!(account_id = %id, active, "Account activation changed");
        Ok(account)
    }

    /// Administrative hard delete, ledger entries included. Returns whether
    /// an account was removed.
    pub async fn delete_account(&self, id: AccountId) -> Result<bool, WalletError> {
        let removed = atomically(self.store.as_ref(), move |tx| {
            Box::pin(async move { Ok(tx.remove_account(id).await?) })
        })
        .await?;
        if removed {
            warn!(account_id = %id, "Account deleted with its ledger entries");
        }
        Ok(removed)
    }
}
