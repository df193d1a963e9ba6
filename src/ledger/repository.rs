//! Ledger entry persistence boundary
//!
//! Append-only: there is no update or delete for entries. All listings are
//! newest first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{Transaction, TransactionType};
use crate::core_types::{AccountId, TransactionId};
use crate::error::PersistenceError;

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Standalone append, outside any unit of work.
    async fn save_transaction(&self, entry: &Transaction) -> Result<(), PersistenceError>;

    async fn find_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, PersistenceError>;

    async fn transactions_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, PersistenceError>;

    async fn transactions_by_type(
        &self,
        account_id: AccountId,
        kind: TransactionType,
    ) -> Result<Vec<Transaction>, PersistenceError>;

    /// Inclusive on both ends.
    async fn transactions_between(
        &self,
        account_id: AccountId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, PersistenceError>;

    async fn latest_transactions(
        &self,
        account_id: AccountId,
        limit: usize,
    ) -> Result<Vec<Transaction>, PersistenceError>;

    async fn all_transactions(&self) -> Result<Vec<Transaction>, PersistenceError>;
}
