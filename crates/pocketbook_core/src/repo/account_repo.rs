//! Account store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist accounts and their cached running balance.
//!
//! # Invariants
//! - `set_balance` is the only write path for `current_balance`; it is called
//!   exclusively by ledger services inside an immediate transaction.
//! - Listing order is deterministic: `created_at ASC, account_uuid ASC`.

use crate::model::account::{Account, AccountId};
use crate::repo::{
    bool_to_int, ensure_ledger_schema, parse_bool, parse_decimal, parse_uuid, RepoError,
    RepoResult,
};
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;

const ACCOUNT_SELECT_SQL: &str = "SELECT
    account_uuid,
    name,
    currency,
    initial_balance,
    current_balance,
    is_active,
    created_at,
    updated_at
FROM accounts";

/// Repository interface for account persistence.
pub trait AccountRepository {
    fn insert_account(&self, account: &Account) -> RepoResult<()>;
    fn get_account(&self, id: AccountId) -> RepoResult<Option<Account>>;
    fn list_accounts(&self, include_inactive: bool) -> RepoResult<Vec<Account>>;
    /// Overwrites the cached running balance.
    fn set_balance(&self, id: AccountId, balance: Decimal, now_ms: i64) -> RepoResult<()>;
    fn set_active(&self, id: AccountId, active: bool, now_ms: i64) -> RepoResult<()>;
}

/// SQLite-backed account repository.
pub struct SqliteAccountRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAccountRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_ledger_schema(conn)?;
        Ok(Self { conn })
    }

    /// Creates repository over a connection already checked by the caller.
    pub(crate) fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AccountRepository for SqliteAccountRepository<'_> {
    fn insert_account(&self, account: &Account) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO accounts (
                account_uuid,
                name,
                currency,
                initial_balance,
                current_balance,
                is_active,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                account.id.to_string(),
                account.name.as_str(),
                account.currency.as_str(),
                account.initial_balance.to_string(),
                account.current_balance.to_string(),
                bool_to_int(account.is_active),
                account.created_at,
                account.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get_account(&self, id: AccountId) -> RepoResult<Option<Account>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ACCOUNT_SELECT_SQL} WHERE account_uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_account_row(row)?));
        }
        Ok(None)
    }

    fn list_accounts(&self, include_inactive: bool) -> RepoResult<Vec<Account>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ACCOUNT_SELECT_SQL}
             WHERE (?1 = 1 OR is_active = 1)
             ORDER BY created_at ASC, account_uuid ASC;"
        ))?;
        let mut rows = stmt.query([bool_to_int(include_inactive)])?;
        let mut accounts = Vec::new();
        while let Some(row) = rows.next()? {
            accounts.push(parse_account_row(row)?);
        }
        Ok(accounts)
    }

    fn set_balance(&self, id: AccountId, balance: Decimal, now_ms: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE accounts
             SET current_balance = ?2,
                 updated_at = ?3
             WHERE account_uuid = ?1;",
            params![id.to_string(), balance.to_string(), now_ms],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn set_active(&self, id: AccountId, active: bool, now_ms: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE accounts
             SET is_active = ?2,
                 updated_at = ?3
             WHERE account_uuid = ?1;",
            params![id.to_string(), bool_to_int(active), now_ms],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }
}

fn parse_account_row(row: &Row<'_>) -> RepoResult<Account> {
    let id_text: String = row.get("account_uuid")?;
    let initial_text: String = row.get("initial_balance")?;
    let current_text: String = row.get("current_balance")?;

    Ok(Account {
        id: parse_uuid(&id_text, "accounts.account_uuid")?,
        name: row.get("name")?,
        currency: row.get("currency")?,
        initial_balance: parse_decimal(&initial_text, "accounts.initial_balance")?,
        current_balance: parse_decimal(&current_text, "accounts.current_balance")?,
        is_active: parse_bool(row.get("is_active")?, "accounts.is_active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
