//! wallet_ledger - Digital-wallet ledger core
//!
//! User-owned accounts holding exact decimal balances, an append-only ledger
//! of every balance change, and transfers that debit, credit and record both
//! legs as one atomic unit of work.
//!
//! # Modules
//!
//! - [`money`] - Money value type (exact decimal + currency)
//! - [`core_types`] - Account, transaction and owner identifiers
//! - [`account`] - Account entity, number validation, lifecycle service
//! - [`ledger`] - Ledger entries (transactions) and history queries
//! - [`store`] - Unit-of-work boundary with in-memory and PostgreSQL adapters
//! - [`transfer`] - Deposit / withdraw / transfer orchestration
//! - [`fx`] - Currency conversion through an injected rate source
//! - [`error`] - Error taxonomy

// Core types - must be first!
pub mod core_types;
pub mod error;
pub mod money;

// Domain
pub mod account;
pub mod ledger;
pub mod transfer;

// Infrastructure
pub mod config;
pub mod db;
pub mod fx;
pub mod logging;
pub mod store;

// Convenient re-exports at crate root
pub use account::{Account, AccountNumber, AccountService, BalanceChange};
pub use core_types::{AccountId, OwnerId, TransactionId};
pub use error::{PersistenceError, WalletError};
pub use ledger::{HistoryService, Transaction, TransactionType};
pub use money::{Currency, Money};
pub use store::{LedgerStore, MemoryStore, PgStore};
pub use transfer::{TransferOrchestrator, TransferReceipt};
