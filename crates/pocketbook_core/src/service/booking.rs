//! Balance-affecting write primitives shared by every ledger service.
//!
//! # Responsibility
//! - Own the transactional boundary (`BEGIN IMMEDIATE`) for mutations.
//! - Pair every ledger row write with its balance delta.
//!
//! # Invariants
//! - Each primitive validates all inputs before its first write.
//! - Balance deltas are merged per account and applied in ascending
//!   account-id order, once per account per call:
//!   `new = current - old_delta + new_delta`.
//! - Callers run primitives only inside `with_write_tx`; an error anywhere
//!   drops the transaction, which rolls back every write of the call.

use crate::model::account::{Account, AccountId};
use crate::model::transaction::{
    CategoryId, Transaction, TransactionType, TransferPairId,
};
use crate::model::validation::{checked_sum, ensure_positive, normalize_notes};
use crate::repo::account_repo::{AccountRepository, SqliteAccountRepository};
use crate::repo::transaction_repo::{SqliteTransactionRepository, TransactionRepository};
use crate::service::error::{LedgerError, LedgerResult};
use chrono::{Local, NaiveDate, Utc};
use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Runs `op` inside an immediate write transaction and commits on success.
///
/// The write lock is taken before `op` reads anything, so balance
/// read-modify-write cannot interleave with another writer.
pub(crate) fn with_write_tx<T>(
    conn: &Connection,
    op: impl FnOnce(&Connection) -> LedgerResult<T>,
) -> LedgerResult<T> {
    let tx = SqlTransaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let value = op(&*tx)?;
    tx.commit()?;
    Ok(value)
}

/// Runs `op` inside a read transaction so multi-query reads see one snapshot.
pub(crate) fn with_read_tx<T>(
    conn: &Connection,
    op: impl FnOnce(&Connection) -> LedgerResult<T>,
) -> LedgerResult<T> {
    let tx = SqlTransaction::new_unchecked(conn, TransactionBehavior::Deferred)?;
    let value = op(&*tx)?;
    tx.commit()?;
    Ok(value)
}

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Link from a leg to its pair and counterpart account.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TransferLink {
    pub pair_id: TransferPairId,
    pub target_account_id: AccountId,
}

/// One ledger row before persistence.
#[derive(Debug, Clone)]
pub(crate) struct EntryDraft {
    pub account_id: AccountId,
    pub category_id: Option<CategoryId>,
    pub kind: TransactionType,
    pub amount: Decimal,
    pub concept: String,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub transfer: Option<TransferLink>,
}

impl EntryDraft {
    fn into_transaction(self, now_ms: i64) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            account_id: self.account_id,
            category_id: self.category_id,
            kind: self.kind,
            amount: self.amount,
            concept: self.concept.trim().to_string(),
            date: self.date,
            notes: normalize_notes(self.notes.as_deref()),
            is_transfer: self.transfer.is_some(),
            target_account_id: self.transfer.map(|link| link.target_account_id),
            transfer_pair_id: self.transfer.map(|link| link.pair_id),
            is_deleted: false,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }
}

/// Field changes for one existing row. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub(crate) struct EntryRevision {
    pub amount: Option<Decimal>,
    pub category_id: Option<CategoryId>,
    pub concept: Option<String>,
    pub date: Option<NaiveDate>,
    /// `Some` replaces the notes; blank text clears them.
    pub notes: Option<String>,
    /// Moves the row to another account.
    pub account_id: Option<AccountId>,
}

/// Loads an account or reports it missing.
pub(crate) fn require_account(
    accounts: &impl AccountRepository,
    id: AccountId,
) -> LedgerResult<Account> {
    accounts
        .get_account(id)?
        .ok_or(LedgerError::AccountNotFound(id))
}

/// Loads an account that may receive new bookings.
pub(crate) fn require_bookable_account(
    accounts: &impl AccountRepository,
    id: AccountId,
) -> LedgerResult<Account> {
    let account = require_account(accounts, id)?;
    if !account.is_active {
        return Err(LedgerError::AccountInactive(id));
    }
    Ok(account)
}

/// Inserts rows and applies their signed deltas.
pub(crate) fn post_entries(
    conn: &Connection,
    drafts: Vec<EntryDraft>,
) -> LedgerResult<Vec<Transaction>> {
    let accounts = SqliteAccountRepository::new(conn);
    let rows = SqliteTransactionRepository::new(conn);

    for draft in &drafts {
        ensure_positive(draft.amount)?;
        require_bookable_account(&accounts, draft.account_id)?;
    }

    let now = now_ms();
    let entries = drafts
        .into_iter()
        .map(|draft| draft.into_transaction(now))
        .collect::<Vec<_>>();

    for entry in &entries {
        rows.insert_transaction(entry)?;
    }
    apply_deltas(
        &accounts,
        entries
            .iter()
            .map(|entry| (entry.account_id, entry.signed_amount())),
        now,
    )?;
    Ok(entries)
}

/// Rewrites rows and moves their balance effect from old to new values.
pub(crate) fn revise_entries(
    conn: &Connection,
    revisions: Vec<(Transaction, EntryRevision)>,
) -> LedgerResult<Vec<Transaction>> {
    let accounts = SqliteAccountRepository::new(conn);
    let rows = SqliteTransactionRepository::new(conn);

    for (existing, revision) in &revisions {
        if let Some(amount) = revision.amount {
            ensure_positive(amount)?;
        }
        if let Some(account_id) = revision.account_id {
            if account_id != existing.account_id {
                require_bookable_account(&accounts, account_id)?;
            }
        }
    }

    let now = now_ms();
    let mut deltas = Vec::with_capacity(revisions.len() * 2);
    let mut updated_entries = Vec::with_capacity(revisions.len());
    for (existing, revision) in revisions {
        let mut updated = existing.clone();
        if let Some(amount) = revision.amount {
            updated.amount = amount;
        }
        if let Some(category_id) = revision.category_id {
            updated.category_id = Some(category_id);
        }
        if let Some(concept) = revision.concept {
            updated.concept = concept.trim().to_string();
        }
        if let Some(date) = revision.date {
            updated.date = date;
        }
        if let Some(notes) = revision.notes {
            updated.notes = normalize_notes(Some(notes.as_str()));
        }
        if let Some(account_id) = revision.account_id {
            updated.account_id = account_id;
        }
        updated.updated_at = now;

        deltas.push((existing.account_id, -existing.signed_amount()));
        deltas.push((updated.account_id, updated.signed_amount()));
        rows.update_transaction(&updated)?;
        updated_entries.push(updated);
    }

    apply_deltas(&accounts, deltas, now)?;
    Ok(updated_entries)
}

/// Tombstones rows and reverses their balance effect.
pub(crate) fn void_entries(conn: &Connection, entries: &[Transaction]) -> LedgerResult<()> {
    let accounts = SqliteAccountRepository::new(conn);
    let rows = SqliteTransactionRepository::new(conn);

    let now = now_ms();
    for entry in entries {
        rows.tombstone_transaction(entry.id, now)?;
    }
    apply_deltas(
        &accounts,
        entries
            .iter()
            .map(|entry| (entry.account_id, -entry.signed_amount())),
        now,
    )
}

fn apply_deltas(
    accounts: &impl AccountRepository,
    deltas: impl IntoIterator<Item = (AccountId, Decimal)>,
    now: i64,
) -> LedgerResult<()> {
    // BTreeMap iteration yields ascending account ids.
    let mut merged: BTreeMap<AccountId, Decimal> = BTreeMap::new();
    for (account_id, delta) in deltas {
        let slot = merged.entry(account_id).or_insert(Decimal::ZERO);
        *slot = checked_sum(*slot, delta)?;
    }

    for (account_id, delta) in merged {
        if delta.is_zero() {
            continue;
        }
        let account = require_account(accounts, account_id)?;
        let balance = checked_sum(account.current_balance, delta)?;
        accounts.set_balance(account_id, balance, now)?;
    }
    Ok(())
}
