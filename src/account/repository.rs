//! Account persistence boundary

use async_trait::async_trait;

use super::models::Account;
use super::validation::AccountNumber;
use crate::core_types::{AccountId, OwnerId};
use crate::error::PersistenceError;

/// Reads and standalone writes of accounts.
///
/// Balance-moving writes never go through here: they run inside a
/// [`crate::store::LedgerTx`] so the account row and its ledger entry commit
/// together.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, PersistenceError>;

    async fn find_account_by_number(
        &self,
        number: &AccountNumber,
    ) -> Result<Option<Account>, PersistenceError>;

    /// Insert or replace by id. A number already used by another account
    /// fails with `DuplicateAccountNumber`.
    async fn save_account(&self, account: &Account) -> Result<(), PersistenceError>;

    async fn account_number_exists(&self, number: &AccountNumber)
    -> Result<bool, PersistenceError>;

    /// Newest first.
    async fn accounts_by_owner(
        &self,
        owner: &OwnerId,
        active_only: bool,
    ) -> Result<Vec<Account>, PersistenceError>;

    async fn all_accounts(&self) -> Result<Vec<Account>, PersistenceError>;
}
