//! Account store use-case service.
//!
//! # Responsibility
//! - Create, list and archive accounts.
//! - Recompute cached balances from ledger rows for auditing.
//!
//! # Invariants
//! - `current_balance` is never written here except at creation.
//! - Audits are read-only and never repair a mismatch.

use crate::model::account::{Account, AccountId};
use crate::model::validation::checked_sum;
use crate::repo::account_repo::{AccountRepository, SqliteAccountRepository};
use crate::repo::ensure_ledger_schema;
use crate::repo::transaction_repo::{SqliteTransactionRepository, TransactionRepository};
use crate::service::booking::{now_ms, require_account, with_read_tx, with_write_tx};
use crate::service::error::{log_outcome, LedgerError, LedgerResult};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Instant;

/// Result of comparing the cached balance with the ledger rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceAudit {
    pub account_id: AccountId,
    pub recorded: Decimal,
    /// `initial_balance + Σ signed deltas` of non-deleted rows.
    pub expected: Decimal,
}

impl BalanceAudit {
    pub fn is_consistent(&self) -> bool {
        self.recorded == self.expected
    }
}

/// Account store service facade.
pub struct AccountService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> AccountService<'conn> {
    /// Creates service from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> LedgerResult<Self> {
        ensure_ledger_schema(conn)?;
        Ok(Self { conn })
    }

    /// Creates one account whose running balance starts at `initial_balance`.
    ///
    /// # Errors
    /// - `InvalidName` for blank names.
    /// - `InvalidCurrency` unless the code is three ASCII letters.
    pub fn create_account(
        &self,
        name: &str,
        currency: &str,
        initial_balance: Decimal,
    ) -> LedgerResult<Account> {
        let started_at = Instant::now();
        let result = with_write_tx(self.conn, |conn| {
            let account = Account::new(name, currency, initial_balance, now_ms())?;
            SqliteAccountRepository::new(conn).insert_account(&account)?;
            Ok(account)
        });
        log_outcome("account_create", "account", started_at, &result);
        result
    }

    pub fn get_account(&self, id: AccountId) -> LedgerResult<Option<Account>> {
        Ok(SqliteAccountRepository::new(self.conn).get_account(id)?)
    }

    pub fn list_accounts(&self, include_inactive: bool) -> LedgerResult<Vec<Account>> {
        Ok(SqliteAccountRepository::new(self.conn).list_accounts(include_inactive)?)
    }

    /// Archives or reactivates an account. History is kept either way.
    pub fn set_account_active(&self, id: AccountId, active: bool) -> LedgerResult<Account> {
        let started_at = Instant::now();
        let result = with_write_tx(self.conn, |conn| {
            let accounts = SqliteAccountRepository::new(conn);
            require_account(&accounts, id)?;
            accounts.set_active(id, active, now_ms())?;
            require_account(&accounts, id)
        });
        log_outcome("account_set_active", "account", started_at, &result);
        result
    }

    /// Verifies the balance identity for one account.
    ///
    /// # Errors
    /// - `AccountNotFound`.
    /// - `BalanceMismatch` when the cached balance drifted from the rows.
    pub fn audit_account(&self, id: AccountId) -> LedgerResult<BalanceAudit> {
        let started_at = Instant::now();
        let result = with_read_tx(self.conn, |conn| {
            let account = require_account(&SqliteAccountRepository::new(conn), id)?;
            let audit = audit_one(conn, &account)?;
            ensure_consistent(audit)
        });
        log_outcome("account_audit", "account", started_at, &result);
        result
    }

    /// Verifies every account, archived ones included, on one snapshot.
    ///
    /// Fails on the first drifted account in listing order.
    pub fn audit_all(&self) -> LedgerResult<Vec<BalanceAudit>> {
        let started_at = Instant::now();
        let result = with_read_tx(self.conn, |conn| {
            SqliteAccountRepository::new(conn)
                .list_accounts(true)?
                .iter()
                .map(|account| audit_one(conn, account).and_then(ensure_consistent))
                .collect::<LedgerResult<Vec<_>>>()
        });
        log_outcome("account_audit_all", "account", started_at, &result);
        result
    }
}

fn audit_one(conn: &Connection, account: &Account) -> LedgerResult<BalanceAudit> {
    let movements = SqliteTransactionRepository::new(conn).signed_total(account.id)?;
    Ok(BalanceAudit {
        account_id: account.id,
        recorded: account.current_balance,
        expected: checked_sum(account.initial_balance, movements)?,
    })
}

fn ensure_consistent(audit: BalanceAudit) -> LedgerResult<BalanceAudit> {
    if audit.is_consistent() {
        return Ok(audit);
    }
    Err(LedgerError::BalanceMismatch {
        account_id: audit.account_id,
        recorded: audit.recorded,
        expected: audit.expected,
    })
}
