//! Core identifier types used throughout the ledger
//!
//! Ids are ULIDs: globally unique, generated in-process without a round trip
//! to the store, and lexicographically sortable. The sort order doubles as
//! the lock order for transfers.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(ulid::Ulid);

        impl $name {
            /// Generate a new unique id
            pub fn new() -> Self {
                Self(ulid::Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(ulid::Ulid::from_string(s)?))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }
    };
}

ulid_id!(
    /// Account ID - assigned when the account is opened, immutable afterwards.
    ///
    /// Stored as its 26-character Crockford base32 text form.
    AccountId
);

ulid_id!(
    /// Ledger entry ID
    TransactionId
);

/// Longest owner id accepted, in characters (width of `accounts_tb.owner_id`).
pub const MAX_OWNER_ID_LEN: usize = 64;

/// Owner of an account. Identity management lives outside the ledger, so the
/// value is opaque; only blank or over-long ids are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().count() > MAX_OWNER_ID_LEN {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_roundtrips_through_text() {
        let id = AccountId::new();
        let parsed: AccountId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert_eq!(id.to_string().len(), 26);
    }

    #[test]
    fn test_ids_are_ordered_by_creation() {
        let a = TransactionId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = TransactionId::new();
        assert!(a < b);
    }

    #[test]
    fn test_invalid_id_rejected() {
        assert!("not-a-ulid".parse::<AccountId>().is_err());
    }

    #[test]
    fn test_owner_id_rejects_blank() {
        assert!(OwnerId::new("   ").is_none());
        assert_eq!(OwnerId::new(" user-7 ").unwrap().as_str(), "user-7");
    }

    #[test]
    fn test_owner_id_length_limit() {
        assert!(OwnerId::new("ñ".repeat(MAX_OWNER_ID_LEN)).is_some());
        assert!(OwnerId::new("a".repeat(MAX_OWNER_ID_LEN + 1)).is_none());
    }

    #[test]
    fn test_ids_serialize_as_strings() {
        let id = AccountId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }
}
