//! Ledger - append-only record of balance changes
//!
//! Every committed deposit, withdrawal or transfer leg produces one
//! [`Transaction`] carrying before/after balance snapshots.

pub mod history;
pub mod models;
pub mod repository;

pub use history::HistoryService;
pub use models::{Transaction, TransactionType};
pub use repository::TransactionStore;
