//! PostgreSQL ledger store
//!
//! Tables: `accounts_tb`, `ledger_entries_tb` (see [`crate::db::schema`]).
//! A unit of work is one `sqlx` transaction; account reads inside it use
//! `SELECT ... FOR UPDATE`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{PgConnection, Postgres};
use tracing::debug;

use super::{LedgerTx, UnitOfWork, check_entry, finished_error};
use crate::account::{Account, AccountNumber, AccountStore};
use crate::core_types::{AccountId, OwnerId, TransactionId};
use crate::db::{Database, DecodeColumn};
use crate::error::PersistenceError;
use crate::ledger::{Transaction, TransactionStore, TransactionType};
use crate::money::Money;

const ACCOUNT_COLUMNS: &str =
    "account_id, account_number, owner_id, balance, currency, active, created_at, updated_at";

const ENTRY_COLUMNS: &str = "entry_id, account_id, entry_type, amount, currency, description, \
     balance_before, balance_after, origin_account_id, destination_account_id, occurred_at";

// ============================================================================
// Row decoding
// ============================================================================

fn corrupt(what: &str, value: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Corrupt(format!("invalid {}: {}", what, value))
}

fn parse_account_id(raw: &str) -> Result<AccountId, PersistenceError> {
    raw.parse().map_err(|_| corrupt("account id", raw))
}

fn money(amount: Decimal, currency: &str) -> Result<Money, PersistenceError> {
    Money::new(amount, currency).map_err(|_| corrupt("currency", currency))
}

fn decode_account(row: &PgRow) -> Result<Account, PersistenceError> {
    let id: String = row.decode("account_id")?;
    let number: String = row.decode("account_number")?;
    let owner: String = row.decode("owner_id")?;
    let currency: String = row.decode("currency")?;

    Ok(Account::restore(
        parse_account_id(&id)?,
        AccountNumber::parse(&number).map_err(|_| corrupt("account number", &number))?,
        OwnerId::new(owner.as_str()).ok_or_else(|| corrupt("owner id", &owner))?,
        money(row.decode("balance")?, &currency)?,
        row.decode("active")?,
        row.decode("created_at")?,
        row.decode("updated_at")?,
    ))
}

fn decode_entry(row: &PgRow) -> Result<Transaction, PersistenceError> {
    let id: String = row.decode("entry_id")?;
    let account_id: String = row.decode("account_id")?;
    let kind: String = row.decode("entry_type")?;
    let currency: String = row.decode("currency")?;
    let origin: Option<String> = row.decode("origin_account_id")?;
    let destination: Option<String> = row.decode("destination_account_id")?;

    Ok(Transaction::restore(
        id.parse::<TransactionId>().map_err(|_| corrupt("entry id", &id))?,
        TransactionType::from_code(&kind).ok_or_else(|| corrupt("entry type", &kind))?,
        parse_account_id(&account_id)?,
        money(row.decode("amount")?, &currency)?,
        origin.as_deref().map(parse_account_id).transpose()?,
        destination.as_deref().map(parse_account_id).transpose()?,
        row.decode("description")?,
        row.decode("occurred_at")?,
        money(row.decode("balance_before")?, &currency)?,
        money(row.decode("balance_after")?, &currency)?,
    ))
}

fn decode_all<T>(
    rows: &[PgRow],
    decode: impl Fn(&PgRow) -> Result<T, PersistenceError>,
) -> Result<Vec<T>, PersistenceError> {
    rows.iter().map(decode).collect()
}

/// Unique violations on the account number become `DuplicateAccountNumber`.
fn map_account_write(err: sqlx::Error, account: &Account) -> PersistenceError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return PersistenceError::DuplicateAccountNumber(account.number().to_string());
        }
    }
    PersistenceError::Database(err)
}

// ============================================================================
// Shared statements
// ============================================================================

async fn insert_account_row(
    conn: &mut PgConnection,
    account: &Account,
    upsert: bool,
) -> Result<(), PersistenceError> {
    let conflict = if upsert {
        " ON CONFLICT (account_id) DO UPDATE SET balance = EXCLUDED.balance, \
         active = EXCLUDED.active, updated_at = EXCLUDED.updated_at"
    } else {
        ""
    };
    let sql = format!(
        "INSERT INTO accounts_tb ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8){}",
        ACCOUNT_COLUMNS, conflict
    );
    sqlx::query(&sql)
        .bind(account.id().to_string())
        .bind(account.number().as_str())
        .bind(account.owner_id().as_str())
        .bind(account.balance().amount())
        .bind(account.currency().as_str())
        .bind(account.is_active())
        .bind(account.created_at())
        .bind(account.updated_at())
        .execute(conn)
        .await
        .map_err(|e| map_account_write(e, account))?;
    Ok(())
}

async fn insert_entry_row(
    conn: &mut PgConnection,
    entry: &Transaction,
) -> Result<(), PersistenceError> {
    check_entry(entry)?;
    let sql = format!(
        "INSERT INTO ledger_entries_tb ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        ENTRY_COLUMNS
    );
    sqlx::query(&sql)
        .bind(entry.id().to_string())
        .bind(entry.account_id().to_string())
        .bind(entry.kind().as_str())
        .bind(entry.amount().amount())
        .bind(entry.amount().currency().as_str())
        .bind(entry.description())
        .bind(entry.balance_before().amount())
        .bind(entry.balance_after().amount())
        .bind(entry.origin_account_id().map(|id| id.to_string()))
        .bind(entry.destination_account_id().map(|id| id.to_string()))
        .bind(entry.timestamp())
        .execute(conn)
        .await?;
    Ok(())
}

// ============================================================================
// PgStore
// ============================================================================

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    fn entries_sql(filter: &str) -> String {
        format!(
            "SELECT {} FROM ledger_entries_tb {} ORDER BY occurred_at DESC, entry_id DESC",
            ENTRY_COLUMNS, filter
        )
    }
}

#[async_trait]
impl UnitOfWork for PgStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, PersistenceError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { inner: Some(tx) }))
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, PersistenceError> {
        let sql = format!("SELECT {} FROM accounts_tb WHERE account_id = $1", ACCOUNT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode_account).transpose()
    }

    async fn find_account_by_number(
        &self,
        number: &AccountNumber,
    ) -> Result<Option<Account>, PersistenceError> {
        let sql = format!("SELECT {} FROM accounts_tb WHERE account_number = $1", ACCOUNT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(number.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode_account).transpose()
    }

    async fn save_account(&self, account: &Account) -> Result<(), PersistenceError> {
        let mut conn = self.pool.acquire().await?;
        insert_account_row(&mut conn, account, true).await
    }

    async fn account_number_exists(
        &self,
        number: &AccountNumber,
    ) -> Result<bool, PersistenceError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts_tb WHERE account_number = $1)")
                .bind(number.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn accounts_by_owner(
        &self,
        owner: &OwnerId,
        active_only: bool,
    ) -> Result<Vec<Account>, PersistenceError> {
        let sql = format!(
            "SELECT {} FROM accounts_tb WHERE owner_id = $1 AND (active OR NOT $2) \
             ORDER BY created_at DESC, account_id DESC",
            ACCOUNT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(owner.as_str())
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?;
        decode_all(&rows, decode_account)
    }

    async fn all_accounts(&self) -> Result<Vec<Account>, PersistenceError> {
        let sql = format!("SELECT {} FROM accounts_tb ORDER BY account_id", ACCOUNT_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        decode_all(&rows, decode_account)
    }
}

#[async_trait]
impl TransactionStore for PgStore {
    async fn save_transaction(&self, entry: &Transaction) -> Result<(), PersistenceError> {
        let mut conn = self.pool.acquire().await?;
        insert_entry_row(&mut conn, entry).await
    }

    async fn find_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, PersistenceError> {
        let sql = format!("SELECT {} FROM ledger_entries_tb WHERE entry_id = $1", ENTRY_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode_entry).transpose()
    }

    async fn transactions_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, PersistenceError> {
        let sql = Self::entries_sql("WHERE account_id = $1");
        let rows = sqlx::query(&sql)
            .bind(account_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        decode_all(&rows, decode_entry)
    }

    async fn transactions_by_type(
        &self,
        account_id: AccountId,
        kind: TransactionType,
    ) -> Result<Vec<Transaction>, PersistenceError> {
        let sql = Self::entries_sql("WHERE account_id = $1 AND entry_type = $2");
        let rows = sqlx::query(&sql)
            .bind(account_id.to_string())
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await?;
        decode_all(&rows, decode_entry)
    }

    async fn transactions_between(
        &self,
        account_id: AccountId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, PersistenceError> {
        let sql = Self::entries_sql("WHERE account_id = $1 AND occurred_at BETWEEN $2 AND $3");
        let rows = sqlx::query(&sql)
            .bind(account_id.to_string())
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        decode_all(&rows, decode_entry)
    }

    async fn latest_transactions(
        &self,
        account_id: AccountId,
        limit: usize,
    ) -> Result<Vec<Transaction>, PersistenceError> {
        let sql = format!(
            "SELECT {} FROM ledger_entries_tb WHERE account_id = $1 \
             ORDER BY occurred_at DESC, entry_id DESC LIMIT $2",
            ENTRY_COLUMNS
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(&sql)
            .bind(account_id.to_string())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        decode_all(&rows, decode_entry)
    }

    async fn all_transactions(&self) -> Result<Vec<Transaction>, PersistenceError> {
        let sql = Self::entries_sql("");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        decode_all(&rows, decode_entry)
    }
}

// ============================================================================
// PgTx
// ============================================================================

struct PgTx {
    inner: Option<sqlx::Transaction<'static, Postgres>>,
}

impl PgTx {
    fn conn(&mut self) -> Result<&mut PgConnection, PersistenceError> {
        self.inner.as_deref_mut().ok_or_else(finished_error)
    }

}

#[async_trait]
impl LedgerTx for PgTx {
    async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>, PersistenceError> {
        let sql = format!(
            "SELECT {} FROM accounts_tb WHERE account_id = $1 FOR UPDATE",
            ACCOUNT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(self.conn()?)
            .await?;
        row.as_ref().map(decode_account).transpose()
    }

    async fn insert_account(&mut self, account: &Account) -> Result<(), PersistenceError> {
        insert_account_row(self.conn()?, account, false).await
    }

    async fn update_account(&mut self, account: &Account) -> Result<(), PersistenceError> {
        let result = sqlx::query(
            "UPDATE accounts_tb SET balance = $1, active = $2, updated_at = $3
             WHERE account_id = $4",
        )
        .bind(account.balance().amount())
        .bind(account.is_active())
        .bind(account.updated_at())
        .bind(account.id().to_string())
        .execute(self.conn()?)
        .await?;

        if result.rows_affected() != 1 {
            return Err(PersistenceError::Corrupt(format!(
                "update of unknown account {}",
                account.id()
            )));
        }
        Ok(())
    }

    async fn remove_account(&mut self, id: AccountId) -> Result<bool, PersistenceError> {
        let result = sqlx::query("DELETE FROM accounts_tb WHERE account_id = $1")
            .bind(id.to_string())
            .execute(self.conn()?)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn append_transaction(&mut self, entry: &Transaction) -> Result<(), PersistenceError> {
        insert_entry_row(self.conn()?, entry).await
    }

    async fn commit(&mut self) -> Result<(), PersistenceError> {
        let tx = self.inner.take().ok_or_else(finished_error)?;
        tx.commit().await?;
        debug!("PostgreSQL unit committed");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), PersistenceError> {
        let tx = self.inner.take().ok_or_else(finished_error)?;
        tx.rollback().await?;
        Ok(())
    }
}
