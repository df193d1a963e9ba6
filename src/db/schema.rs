//! Ledger schema (PostgreSQL)
//!
//! Every statement is idempotent so `ensure_schema` can run at each start.

use sqlx::postgres::PgPool;

pub const CREATE_ACCOUNTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS accounts_tb (
    account_id      VARCHAR(26)    PRIMARY KEY,
    account_number  VARCHAR(20)    NOT NULL UNIQUE,
    owner_id        VARCHAR(64)    NOT NULL,
    balance         NUMERIC(19, 2) NOT NULL DEFAULT 0 CHECK (balance >= 0),
    currency        VARCHAR(3)     NOT NULL,
    active          BOOLEAN        NOT NULL DEFAULT TRUE,
    created_at      TIMESTAMPTZ    NOT NULL DEFAULT NOW(),
    updated_at      TIMESTAMPTZ    NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_ACCOUNTS_OWNER_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_accounts_owner
    ON accounts_tb (owner_id, created_at DESC)
"#;

/// Ledger entries are append-only. `account_id` is the account whose balance
/// the entry documents.
pub const CREATE_LEDGER_ENTRIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS ledger_entries_tb (
    entry_id                VARCHAR(26)    PRIMARY KEY,
    account_id              VARCHAR(26)    NOT NULL
                            REFERENCES accounts_tb (account_id) ON DELETE CASCADE,
    entry_type              VARCHAR(30)    NOT NULL,
    amount                  NUMERIC(19, 2) NOT NULL CHECK (amount > 0),
    currency                VARCHAR(3)     NOT NULL,
    description             TEXT           NOT NULL DEFAULT '',
    balance_before          NUMERIC(19, 2) NOT NULL,
    balance_after           NUMERIC(19, 2) NOT NULL,
    origin_account_id       VARCHAR(26),
    destination_account_id  VARCHAR(26),
    occurred_at             TIMESTAMPTZ    NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_LEDGER_ENTRIES_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_ledger_entries_account_time
    ON ledger_entries_tb (account_id, occurred_at DESC)
"#;

/// In execution order.
pub const SCHEMA_STATEMENTS: [(&str, &str); 4] = [
    ("accounts_tb", CREATE_ACCOUNTS_TABLE),
    ("idx_accounts_owner", CREATE_ACCOUNTS_OWNER_INDEX),
    ("ledger_entries_tb", CREATE_LEDGER_ENTRIES_TABLE),
    ("idx_ledger_entries_account_time", CREATE_LEDGER_ENTRIES_INDEX),
];

/// Run each DDL statement on its own; PostgreSQL prepared statements accept
/// one command at a time.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Ensuring ledger schema...");
    for (name, ddl) in SCHEMA_STATEMENTS {
        sqlx::query(ddl).execute(pool).await.inspect_err(|e| {
            tracing::error!(object = name, error = %e, "Failed to create schema object");
        })?;
    }
    tracing::info!("Ledger schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_are_idempotent() {
        for (name, ddl) in SCHEMA_STATEMENTS {
            assert!(ddl.contains("IF NOT EXISTS"), "{name}");
            assert!(ddl.contains(name), "{name}");
        }
    }

    #[test]
    fn test_balance_constraint_present() {
        assert!(CREATE_ACCOUNTS_TABLE.contains("CHECK (balance >= 0)"));
        assert!(CREATE_LEDGER_ENTRIES_TABLE.contains("CHECK (amount > 0)"));
        assert!(CREATE_LEDGER_ENTRIES_TABLE.contains("ON DELETE CASCADE"));
    }

    #[test]
    fn test_column_widths_match_domain_limits() {
        use crate::core_types::MAX_OWNER_ID_LEN;
        let owner = format!("owner_id        VARCHAR({})", MAX_OWNER_ID_LEN);
        assert!(CREATE_ACCOUNTS_TABLE.contains(&owner));
        // descriptions are unbounded in the domain
        assert!(CREATE_LEDGER_ENTRIES_TABLE.contains("description             TEXT"));
    }
}
