//! Transaction ledger use-case service.
//!
//! # Responsibility
//! - Create, update and delete standalone `ingreso`/`egreso` movements.
//! - Keep the owning account's balance equal to the sum of its movements.
//!
//! # Invariants
//! - Transfer legs are rejected here; they change only as a pair.
//! - Payment transactions of monthly expenses are rejected here; they change
//!   only through their instance.
//! - Updates apply `current - old_delta + new_delta` in one write.

use crate::model::account::AccountId;
use crate::model::transaction::{CategoryId, Transaction, TransactionId, TransactionType};
use crate::repo::{ensure_ledger_schema, RepoError};
use crate::repo::expense_repo::{ExpenseRepository, SqliteExpenseRepository};
use crate::repo::transaction_repo::{
    SqliteTransactionRepository, TransactionListQuery, TransactionRepository,
};
use crate::service::booking::{
    post_entries, revise_entries, void_entries, with_read_tx, with_write_tx, EntryDraft,
    EntryRevision,
};
use crate::service::error::{log_outcome, LedgerError, LedgerResult};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::time::Instant;

/// Request model for one standalone movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub account_id: AccountId,
    pub category_id: CategoryId,
    pub kind: TransactionType,
    pub amount: Decimal,
    pub concept: String,
    pub date: NaiveDate,
    pub notes: Option<String>,
}

/// Partial update for one standalone movement. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionPatch {
    pub amount: Option<Decimal>,
    pub category_id: Option<CategoryId>,
    pub concept: Option<String>,
    pub date: Option<NaiveDate>,
    /// Blank text clears the notes.
    pub notes: Option<String>,
}

/// Transaction ledger service facade.
pub struct LedgerService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> LedgerService<'conn> {
    /// Creates service from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> LedgerResult<Self> {
        ensure_ledger_schema(conn)?;
        Ok(Self { conn })
    }

    /// Books one movement and applies its signed delta.
    ///
    /// # Errors
    /// - `InvalidAmount` when `amount <= 0`.
    /// - `AccountNotFound` / `AccountInactive` for an unusable account.
    pub fn create_transaction(&self, request: &NewTransaction) -> LedgerResult<Transaction> {
        let started_at = Instant::now();
        let result = with_write_tx(self.conn, |conn| {
            let draft = EntryDraft {
                account_id: request.account_id,
                category_id: Some(request.category_id),
                kind: request.kind,
                amount: request.amount,
                concept: request.concept.clone(),
                date: request.date,
                notes: request.notes.clone(),
                transfer: None,
            };
            single(post_entries(conn, vec![draft])?)
        });
        log_outcome("transaction_create", "ledger", started_at, &result);
        result
    }

    /// Updates one standalone movement, re-applying its balance delta when the
    /// amount changes.
    ///
    /// # Errors
    /// - `TransactionNotFound`, `InvalidAmount`.
    /// - `CannotEditTransferLeg`, `CannotEditLinkedPayment`.
    pub fn update_transaction(
        &self,
        id: TransactionId,
        patch: &TransactionPatch,
    ) -> LedgerResult<Transaction> {
        let started_at = Instant::now();
        let result = with_write_tx(self.conn, |conn| {
            let existing = load_active_transaction(conn, id)?;
            if existing.is_transfer {
                return Err(LedgerError::CannotEditTransferLeg(id));
            }
            if let Some(instance_id) = SqliteExpenseRepository::new(conn).instance_linked_to(id)? {
                return Err(LedgerError::CannotEditLinkedPayment {
                    transaction_id: id,
                    instance_id,
                });
            }

            let revision = EntryRevision {
                amount: patch.amount,
                category_id: patch.category_id,
                concept: patch.concept.clone(),
                date: patch.date,
                notes: patch.notes.clone(),
                account_id: None,
            };
            single(revise_entries(conn, vec![(existing, revision)])?)
        });
        log_outcome("transaction_update", "ledger", started_at, &result);
        result
    }

    /// Reverses one standalone movement's delta and tombstones it.
    ///
    /// # Errors
    /// - `TransactionNotFound`.
    /// - `CannotDeleteTransferLeg`, `CannotDeleteLinkedPayment`.
    pub fn delete_transaction(&self, id: TransactionId) -> LedgerResult<()> {
        let started_at = Instant::now();
        let result = with_write_tx(self.conn, |conn| {
            let existing = load_active_transaction(conn, id)?;
            if existing.is_transfer {
                return Err(LedgerError::CannotDeleteTransferLeg(id));
            }
            if let Some(instance_id) = SqliteExpenseRepository::new(conn).instance_linked_to(id)? {
                return Err(LedgerError::CannotDeleteLinkedPayment {
                    transaction_id: id,
                    instance_id,
                });
            }
            void_entries(conn, &[existing])
        });
        log_outcome("transaction_delete", "ledger", started_at, &result);
        result
    }

    /// Gets one active movement (standalone or transfer leg).
    pub fn get_transaction(&self, id: TransactionId) -> LedgerResult<Option<Transaction>> {
        SqliteTransactionRepository::new(self.conn)
            .get_transaction(id, false)
            .map_err(Into::into)
    }

    /// Lists active movements using filter and pagination options.
    pub fn list_transactions(
        &self,
        query: &TransactionListQuery,
    ) -> LedgerResult<Vec<Transaction>> {
        with_read_tx(self.conn, |conn| {
            SqliteTransactionRepository::new(conn)
                .list_transactions(query)
                .map_err(Into::into)
        })
    }
}

pub(crate) fn load_active_transaction(
    conn: &Connection,
    id: TransactionId,
) -> LedgerResult<Transaction> {
    SqliteTransactionRepository::new(conn)
        .get_transaction(id, false)?
        .ok_or(LedgerError::TransactionNotFound(id))
}

/// Unwraps the single row produced by a one-entry booking primitive.
pub(crate) fn single(mut entries: Vec<Transaction>) -> LedgerResult<Transaction> {
    match (entries.pop(), entries.is_empty()) {
        (Some(entry), true) => Ok(entry),
        _ => Err(LedgerError::Repo(RepoError::InvalidData(
            "booking primitive returned an unexpected row count".to_string(),
        ))),
    }
}
