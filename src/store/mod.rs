//! Unit-of-work boundary
//!
//! A [`LedgerTx`] stages account writes and ledger-entry appends that become
//! visible together on [`LedgerTx::commit`] or not at all. Reads made through
//! [`LedgerTx::lock_account`] hold the row until the unit ends, so a
//! read-validate-write sequence inside one unit cannot interleave with
//! another unit touching the same account.
//!
//! Adapters:
//! - [`memory::MemoryStore`] - in-process tables, units serialized store-wide
//! - [`postgres::PgStore`] - PostgreSQL, `SELECT ... FOR UPDATE` row locks

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, error};

use crate::account::{Account, AccountStore};
use crate::core_types::AccountId;
use crate::error::{PersistenceError, WalletError};
use crate::ledger::{Transaction, TransactionStore};

/// One open unit of work.
///
/// Dropping a unit without calling `commit` discards everything it staged.
/// After `commit` or `rollback` every further call fails.
#[async_trait]
pub trait LedgerTx: Send {
    /// Load an account and hold its lock until the unit ends.
    async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>, PersistenceError>;

    /// Fails with `DuplicateAccountNumber` if the number is taken.
    async fn insert_account(&mut self, account: &Account) -> Result<(), PersistenceError>;

    async fn update_account(&mut self, account: &Account) -> Result<(), PersistenceError>;

    /// Delete an account together with its ledger entries.
    async fn remove_account(&mut self, id: AccountId) -> Result<bool, PersistenceError>;

    /// Fails with `InconsistentEntry` unless the entry's snapshot adds up.
    async fn append_transaction(&mut self, entry: &Transaction) -> Result<(), PersistenceError>;

    /// Returns once the backing store has durably committed.
    async fn commit(&mut self) -> Result<(), PersistenceError>;

    async fn rollback(&mut self) -> Result<(), PersistenceError>;
}

#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, PersistenceError>;
}

/// Everything the services need from a store, shareable as `Arc<dyn LedgerStore>`.
pub trait LedgerStore: AccountStore + TransactionStore + UnitOfWork {}

impl<T: AccountStore + TransactionStore + UnitOfWork + ?Sized> LedgerStore for T {}

/// Run `work` inside one unit of work.
///
/// The result is committed if `work` succeeds. Otherwise the unit is rolled
/// back and the error from `work` is returned unchanged. A failed rollback is
/// logged; the store discards the unit anyway.
///
/// ```ignore
/// let entry = atomically(store, move |tx| {
///     Box::pin(async move {
///         let mut account = tx.lock_account(id).await?.ok_or(..)?;
///         // ...
///         Ok(entry)
///     })
/// })
/// .await?;
/// ```
pub async fn atomically<S, T, F>(store: &S, work: F) -> Result<T, WalletError>
where
    S: UnitOfWork + ?Sized,
    T: Send,
    F: for<'t> FnOnce(&'t mut dyn LedgerTx) -> BoxFuture<'t, Result<T, WalletError>> + Send,
{
    let mut tx = store.begin().await?;

    match work(&mut *tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            debug!(code = err.code(), "Unit of work failed, rolling back");
            if let Err(rollback_err) = tx.rollback().await {
                error!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}

/// Write-side guard shared by the adapters: entries built through `restore`
/// skip the factory checks.
pub(crate) fn check_entry(entry: &Transaction) -> Result<(), PersistenceError> {
    if !entry.is_consistent() {
        return Err(PersistenceError::InconsistentEntry(format!(
            "{} {} of {}: {} -> {}",
            entry.id(),
            entry.kind(),
            entry.amount(),
            entry.balance_before(),
            entry.balance_after()
        )));
    }
    Ok(())
}

pub(crate) fn finished_error() -> PersistenceError {
    PersistenceError::Unavailable("unit of work already finished".to_string())
}
