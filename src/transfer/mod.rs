//! Balance movements
//!
//! [`TransferOrchestrator`] runs deposits, withdrawals and account-to-account
//! transfers. Each operation is one unit of work: the account rows are locked,
//! validated, mutated in memory, and written back together with their ledger
//! entries. Any failure rolls the unit back, so a rejected or failed operation
//! leaves no partial change behind.
//!
//! # Validation order (transfer)
//!
//! ```text
//! amount > 0 → origin != destination → origin exists/active
//!   → origin covers amount → destination exists/active → currencies match
//! ```
//!
//! The first two checks run before the unit of work begins. Both account
//! rows are locked in ascending id order so opposite transfers between the
//! same pair cannot deadlock.

pub mod coordinator;
pub mod types;


pub use coordinator::TransferOrchestrator;
pub use types::TransferReceipt;
