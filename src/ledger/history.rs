//! Transaction history queries

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::models::{Transaction, TransactionType};
use crate::account::AccountNumber;
use crate::core_types::{AccountId, TransactionId};
use crate::error::WalletError;
use crate::store::LedgerStore;

/// Read-only view over the ledger. All results are newest first.
pub struct HistoryService {
    store: Arc<dyn LedgerStore>,
}

impl HistoryService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    async fn account_id(&self, number: &str) -> Result<AccountId, WalletError> {
        let number = AccountNumber::parse(number)?;
        self.store
            .find_account_by_number(&number)
            .await?
            .map(|account| account.id())
            .ok_or_else(|| WalletError::AccountNotFound(number.into_string()))
    }

    /// Full history of the account with this number.
    pub async fn history(&self, number: &str) -> Result<Vec<Transaction>, WalletError> {
        let id = self.account_id(number).await?;
        Ok(self.store.transactions_for_account(id).await?)
    }

    pub async fn latest(
        &self,
        account_id: AccountId,
        limit: usize,
    ) -> Result<Vec<Transaction>, WalletError> {
        Ok(self.store.latest_transactions(account_id, limit).await?)
    }

    pub async fn by_type(
        &self,
        number: &str,
        kind: TransactionType,
    ) -> Result<Vec<Transaction>, WalletError> {
        let id = self.account_id(number).await?;
        Ok(self.store.transactions_by_type(id, kind).await?)
    }

    /// Entries with `from <= timestamp <= to`. An inverted range is empty.
    pub async fn between(
        &self,
        account_id: AccountId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, WalletError> {
        if from > to {
            return Ok(Vec::new());
        }
        Ok(self.store.transactions_between(account_id, from, to).await?)
    }

    pub async fn entry(&self, id: TransactionId) -> Result<Option<Transaction>, WalletError> {
        Ok(self.store.find_transaction(id).await?)
    }
}
