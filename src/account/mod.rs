//! Account management module
//!
//! The [`Account`] entity with its balance invariants, the validated
//! [`AccountNumber`], the [`AccountStore`] persistence boundary and the
//! lifecycle [`AccountService`].

pub mod models;
pub mod repository;
pub mod service;
pub mod validation;

// Re-export commonly used types
pub use models::{Account, BalanceChange};
pub use repository::AccountStore;
pub use service::AccountService;
pub use validation::AccountNumber;
