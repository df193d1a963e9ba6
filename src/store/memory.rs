//! In-process ledger store
//!
//! A unit of work takes the store-wide async mutex for its whole lifetime
//! and works on a staged copy of the tables. Commit swaps the copy in; any
//! other ending drops it. Units are therefore fully serialized, which gives
//! the same lost-update protection as row locks at the cost of concurrency.
//!
//! Used by tests and the offline CLI mode. Supports one-shot fault
//! injection ([`MemoryStore::fail_nth_write`]) to exercise rollback paths.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::{LedgerTx, UnitOfWork, check_entry, finished_error};
use crate::account::{Account, AccountNumber, AccountStore};
use crate::core_types::{AccountId, OwnerId, TransactionId};
use crate::error::PersistenceError;
use crate::ledger::{Transaction, TransactionStore, TransactionType};

#[derive(Debug, Clone, Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    entries: Vec<Transaction>,
}

impl Tables {
    fn number_taken_by_other(&self, account: &Account) -> bool {
        self.accounts
            .values()
            .any(|a| a.number() == account.number() && a.id() != account.id())
    }

    fn put_account(&mut self, account: &Account) -> Result<(), PersistenceError> {
        if self.number_taken_by_other(account) {
            return Err(PersistenceError::DuplicateAccountNumber(
                account.number().to_string(),
            ));
        }
        // Mirrors the CHECK (balance >= 0) constraint of the SQL schema
        if account.balance().is_negative() {
            return Err(PersistenceError::Corrupt(format!(
                "negative balance for account {}",
                account.id()
            )));
        }
        self.accounts.insert(account.id(), account.clone());
        Ok(())
    }

    fn remove_account(&mut self, id: AccountId) -> bool {
        let removed = self.accounts.remove(&id).is_some();
        if removed {
            self.entries.retain(|e| e.account_id() != id);
        }
        removed
    }

    fn by_number(&self, number: &AccountNumber) -> Option<&Account> {
        self.accounts.values().find(|a| a.number() == number)
    }

    fn entries_where(&self, pred: impl Fn(&Transaction) -> bool) -> Vec<Transaction> {
        let mut found: Vec<Transaction> = self.entries.iter().filter(|e| pred(e)).cloned().collect();
        newest_first(&mut found);
        found
    }
}

fn newest_first(entries: &mut [Transaction]) {
    entries.sort_by(|a, b| (b.timestamp(), b.id()).cmp(&(a.timestamp(), a.id())));
}

/// One-shot write failure trigger shared between the store and its units.
#[derive(Debug, Default)]
struct FaultPlan {
    /// 0 = disarmed, n = the n-th write from now fails
    countdown: AtomicUsize,
}

impl FaultPlan {
    fn arm(&self, nth: usize) {
        self.countdown.store(nth, Ordering::SeqCst);
    }

    fn trip(&self) -> Result<(), PersistenceError> {
        let prev = self
            .countdown
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if prev == Ok(1) {
            return Err(PersistenceError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<FaultPlan>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `nth` (1-based) unit-of-work write from now on fail with
    /// `PersistenceError::Unavailable`. Fires once, then disarms.
    pub fn fail_nth_write(&self, nth: usize) {
        self.faults.arm(nth);
    }

    pub async fn account_count(&self) -> usize {
        self.tables.lock().await.accounts.len()
    }

    pub async fn entry_count(&self) -> usize {
        self.tables.lock().await.entries.len()
    }
}

#[async_trait]
impl UnitOfWork for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, PersistenceError> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = (*guard).clone();
        Ok(Box::new(MemoryTx {
            guard: Some(guard),
            staged,
            faults: self.faults.clone(),
        }))
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, PersistenceError> {
        Ok(self.tables.lock().await.accounts.get(&id).cloned())
    }

    async fn find_account_by_number(
        &self,
        number: &AccountNumber,
    ) -> Result<Option<Account>, PersistenceError> {
        Ok(self.tables.lock().await.by_number(number).cloned())
    }

    async fn save_account(&self, account: &Account) -> Result<(), PersistenceError> {
        self.tables.lock().await.put_account(account)
    }

    async fn account_number_exists(
        &self,
        number: &AccountNumber,
    ) -> Result<bool, PersistenceError> {
        Ok(self.tables.lock().await.by_number(number).is_some())
    }

    async fn accounts_by_owner(
        &self,
        owner: &OwnerId,
        active_only: bool,
    ) -> Result<Vec<Account>, PersistenceError> {
        let tables = self.tables.lock().await;
        let mut found: Vec<Account> = tables
            .accounts
            .values()
            .filter(|a| a.owner_id() == owner && (!active_only || a.is_active()))
            .cloned()
            .collect();
        found.sort_by(|a, b| (b.created_at(), b.id()).cmp(&(a.created_at(), a.id())));
        Ok(found)
    }

    async fn all_accounts(&self) -> Result<Vec<Account>, PersistenceError> {
        Ok(self.tables.lock().await.accounts.values().cloned().collect())
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn save_transaction(&self, entry: &Transaction) -> Result<(), PersistenceError> {
        check_entry(entry)?;
        self.tables.lock().await.entries.push(entry.clone());
        Ok(())
    }

    async fn find_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, PersistenceError> {
        let tables = self.tables.lock().await;
        Ok(tables.entries.iter().find(|e| e.id() == id).cloned())
    }

    async fn transactions_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, PersistenceError> {
        let tables = self.tables.lock().await;
        Ok(tables.entries_where(|e| e.account_id() == account_id))
    }

    async fn transactions_by_type(
        &self,
        account_id: AccountId,
        kind: TransactionType,
    ) -> Result<Vec<Transaction>, PersistenceError> {
        let tables = self.tables.lock().await;
        Ok(tables.entries_where(|e| e.account_id() == account_id && e.kind() == kind))
    }

    async fn transactions_between(
        &self,
        account_id: AccountId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, PersistenceError> {
        let tables = self.tables.lock().await;
        Ok(tables.entries_where(|e| {
            e.account_id() == account_id && e.timestamp() >= from && e.timestamp() <= to
        }))
    }

    async fn latest_transactions(
        &self,
        account_id: AccountId,
        limit: usize,
    ) -> Result<Vec<Transaction>, PersistenceError> {
        let tables = self.tables.lock().await;
        let mut found = tables.entries_where(|e| e.account_id() == account_id);
        found.truncate(limit);
        Ok(found)
    }

    async fn all_transactions(&self) -> Result<Vec<Transaction>, PersistenceError> {
        Ok(self.tables.lock().await.entries_where(|_| true))
    }
}

// ============================================================================
// MemoryTx
// ============================================================================

struct MemoryTx {
    /// Held for the whole unit. `None` once committed or rolled back.
    guard: Option<OwnedMutexGuard<Tables>>,
    staged: Tables,
    faults: Arc<FaultPlan>,
}

impl MemoryTx {
    fn ensure_open(&self) -> Result<(), PersistenceError> {
        if self.guard.is_none() {
            return Err(finished_error());
        }
        Ok(())
    }

    fn before_write(&self) -> Result<(), PersistenceError> {
        self.ensure_open()?;
        self.faults.trip()
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>, PersistenceError> {
        self.ensure_open()?;
        Ok(self.staged.accounts.get(&id).cloned())
    }

    async fn insert_account(&mut self, account: &Account) -> Result<(), PersistenceError> {
        self.before_write()?;
        if self.staged.by_number(account.number()).is_some() {
            return Err(PersistenceError::DuplicateAccountNumber(
                account.number().to_string(),
            ));
        }
        self.staged.put_account(account)
    }

    async fn update_account(&mut self, account: &Account) -> Result<(), PersistenceError> {
        self.before_write()?;
        if !self.staged.accounts.contains_key(&account.id()) {
            return Err(PersistenceError::Corrupt(format!(
                "update of unknown account {}",
                account.id()
            )));
        }
        self.staged.put_account(account)
    }

    async fn remove_account(&mut self, id: AccountId) -> Result<bool, PersistenceError> {
        self.before_write()?;
        Ok(self.staged.remove_account(id))
    }

    async fn append_transaction(&mut self, entry: &Transaction) -> Result<(), PersistenceError> {
        self.before_write()?;
        check_entry(entry)?;
        self.staged.entries.push(entry.clone());
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), PersistenceError> {
        let mut guard = self.guard.take().ok_or_else(finished_error)?;
        *guard = std::mem::take(&mut self.staged);
        debug!(
            accounts = guard.accounts.len(),
            entries = guard.entries.len(),
            "Memory unit committed"
        );
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), PersistenceError> {
        self.guard.take().ok_or_else(finished_error)?;
        self.staged = Tables::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::BalanceChange;
    use crate::money::{Currency, Money};

    fn new_account() -> Account {
        Account::open(
            OwnerId::new("owner-1").unwrap(),
            AccountNumber::generate(12),
            Currency::parse("PEN").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_uncommitted_unit_leaves_no_trace() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_account(&new_account()).await.unwrap();
            // dropped without commit
        }
        assert_eq!(store.account_count().await, 0);

        let mut tx = store.begin().await.unwrap();
        tx.insert_account(&new_account()).await.unwrap();
        tx.rollback().await.unwrap();
        drop(tx);
        assert_eq!(store.account_count().await, 0);
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = MemoryStore::new();
        let account = new_account();
        let mut tx = store.begin().await.unwrap();
        tx.insert_account(&account).await.unwrap();
        tx.commit().await.unwrap();
        assert!(tx.commit().await.is_err());
        drop(tx);

        let found = store.find_account(account.id()).await.unwrap();
        assert_eq!(found, Some(account));
    }

    #[tokio::test]
    async fn test_duplicate_number_rejected() {
        let store = MemoryStore::new();
        let first = new_account();
        store.save_account(&first).await.unwrap();

        let clash = Account::open(
            OwnerId::new("owner-2").unwrap(),
            first.number().clone(),
            Currency::parse("PEN").unwrap(),
        );
        let err = store.save_account(&clash).await.unwrap_err();
        assert!(matches!(err, PersistenceError::DuplicateAccountNumber(_)));

        let mut tx = store.begin().await.unwrap();
        let err = tx.insert_account(&clash).await.unwrap_err();
        assert!(matches!(err, PersistenceError::DuplicateAccountNumber(_)));
    }

    #[tokio::test]
    async fn test_fault_fires_once() {
        let store = MemoryStore::new();
        store.fail_nth_write(2);
        let mut tx = store.begin().await.unwrap();
        tx.insert_account(&new_account()).await.unwrap();
        assert!(matches!(
            tx.insert_account(&new_account()).await,
            Err(PersistenceError::Unavailable(_))
        ));
        tx.insert_account(&new_account()).await.unwrap();
    }

    #[tokio::test]
    async fn test_entries_listed_newest_first_and_cascade_on_delete() {
        let store = MemoryStore::new();
        let mut account = new_account();
        store.save_account(&account).await.unwrap();

        let pen = |s: &str| Money::parse(s, "PEN").unwrap();
        let mut ids = Vec::new();
        for amount in ["10", "20", "30"] {
            let change: BalanceChange = account.deposit(&pen(amount)).unwrap();
            let entry = Transaction::deposit(account.id(), pen(amount), "cash", change).unwrap();
            ids.push(entry.id());
            store.save_transaction(&entry).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let listed = store.transactions_for_account(account.id()).await.unwrap();
        let listed_ids: Vec<_> = listed.iter().map(|e| e.id()).collect();
        ids.reverse();
        assert_eq!(listed_ids, ids);

        let latest = store.latest_transactions(account.id(), 2).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].amount(), pen("30"));

        let mut tx = store.begin().await.unwrap();
        assert!(tx.remove_account(account.id()).await.unwrap());
        assert!(!tx.remove_account(account.id()).await.unwrap());
        tx.commit().await.unwrap();
        drop(tx);
        assert!(store.all_transactions().await.unwrap().is_empty());
        assert_eq!(store.account_count().await, 0);
    }

    #[tokio::test]
    async fn test_inconsistent_entry_not_stored() {
        let store = MemoryStore::new();
        let pen = |s: &str| Money::parse(s, "PEN").unwrap();
        let forged = Transaction::restore(
            TransactionId::new(),
            TransactionType::Deposit,
            AccountId::new(),
            pen("-5"),
            None,
            None,
            String::new(),
            Utc::now(),
            pen("0"),
            pen("100"),
        );

        let err = store.save_transaction(&forged).await.unwrap_err();
        assert!(matches!(err, PersistenceError::InconsistentEntry(_)));

        let mut tx = store.begin().await.unwrap();
        let err = tx.append_transaction(&forged).await.unwrap_err();
        assert!(matches!(err, PersistenceError::InconsistentEntry(_)));
        tx.commit().await.unwrap();
        drop(tx);

        assert_eq!(store.entry_count().await, 0);
    }
}
