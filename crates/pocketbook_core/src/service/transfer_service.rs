//! Transfer coordinator use-case service.
//!
//! # Responsibility
//! - Move money between two of the user's accounts as one atomic unit.
//! - Read and write transfers only as `Transfer` aggregates.
//!
//! # Invariants
//! - A transfer is created, updated and deleted as a pair inside one
//!   storage transaction; no state with a single leg is ever committed.
//! - Both accounts must be distinct, active and share a currency.
//! - Stored pairs that are not exactly one matching `egreso` + `ingreso` are
//!   reported as consistency violations and left untouched.

use crate::model::account::AccountId;
use crate::model::transaction::{
    Transaction, TransactionId, TransactionType, Transfer, TransferPairId,
};
use crate::model::validation::{ensure_positive, ValidationError};
use crate::repo::account_repo::SqliteAccountRepository;
use crate::repo::ensure_ledger_schema;
use crate::repo::transaction_repo::{SqliteTransactionRepository, TransactionRepository};
use crate::service::booking::{
    post_entries, require_bookable_account, revise_entries, void_entries, with_read_tx,
    with_write_tx, EntryDraft, EntryRevision, TransferLink,
};
use crate::service::error::{log_outcome, LedgerError, LedgerResult};
use crate::service::ledger_service::load_active_transaction;
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::time::Instant;
use uuid::Uuid;

/// Request model for moving money between two accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransfer {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Decimal,
    pub concept: String,
    pub date: NaiveDate,
    pub notes: Option<String>,
}

/// Partial update applied identically to both legs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferPatch {
    pub amount: Option<Decimal>,
    pub concept: Option<String>,
    pub date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Transfer coordinator facade.
pub struct TransferService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> TransferService<'conn> {
    /// Creates service from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> LedgerResult<Self> {
        ensure_ledger_schema(conn)?;
        Ok(Self { conn })
    }

    /// Books both legs of a transfer and both balance deltas.
    ///
    /// The source balance may go negative; overdraft policy is a caller
    /// decision.
    ///
    /// # Errors
    /// - `SameAccount`, `InvalidAmount`, `CurrencyMismatch`.
    /// - `AccountNotFound` / `AccountInactive` for either account.
    pub fn create_transfer(&self, request: &NewTransfer) -> LedgerResult<Transfer> {
        let started_at = Instant::now();
        let result = with_write_tx(self.conn, |conn| {
            if request.from_account_id == request.to_account_id {
                return Err(ValidationError::SameAccount(request.from_account_id).into());
            }
            ensure_positive(request.amount)?;

            let accounts = SqliteAccountRepository::new(conn);
            let from = require_bookable_account(&accounts, request.from_account_id)?;
            let to = require_bookable_account(&accounts, request.to_account_id)?;
            if from.currency != to.currency {
                return Err(ValidationError::CurrencyMismatch {
                    from: from.currency,
                    to: to.currency,
                }
                .into());
            }

            let pair_id = Uuid::new_v4();
            let leg = |account_id, kind, target_account_id| EntryDraft {
                account_id,
                category_id: None,
                kind,
                amount: request.amount,
                concept: request.concept.clone(),
                date: request.date,
                notes: request.notes.clone(),
                transfer: Some(TransferLink {
                    pair_id,
                    target_account_id,
                }),
            };
            let legs = post_entries(
                conn,
                vec![
                    leg(from.id, TransactionType::Egreso, to.id),
                    leg(to.id, TransactionType::Ingreso, from.id),
                ],
            )?;
            assemble_transfer(pair_id, legs)
        });
        log_outcome("transfer_create", "transfer", started_at, &result);
        result
    }

    /// Applies the same changes to both legs and recomputes both balances.
    ///
    /// # Errors
    /// - `TransferNotFound` when no active leg carries `pair_id`.
    /// - `IncompleteTransferPair` / `TransferPairMismatch` for corrupt pairs.
    /// - `InvalidAmount`.
    pub fn update_transfer(
        &self,
        pair_id: TransferPairId,
        patch: &TransferPatch,
    ) -> LedgerResult<Transfer> {
        let started_at = Instant::now();
        let result = with_write_tx(self.conn, |conn| {
            let transfer = load_transfer(conn, pair_id)?;
            let revision = EntryRevision {
                amount: patch.amount,
                category_id: None,
                concept: patch.concept.clone(),
                date: patch.date,
                notes: patch.notes.clone(),
                account_id: None,
            };
            let legs = revise_entries(
                conn,
                vec![
                    (transfer.egreso, revision.clone()),
                    (transfer.ingreso, revision),
                ],
            )?;
            assemble_transfer(pair_id, legs)
        });
        log_outcome("transfer_update", "transfer", started_at, &result);
        result
    }

    /// Reverses both balance deltas and tombstones both legs.
    pub fn delete_transfer(&self, pair_id: TransferPairId) -> LedgerResult<()> {
        let started_at = Instant::now();
        let result = with_write_tx(self.conn, |conn| {
            let transfer = load_transfer(conn, pair_id)?;
            void_entries(conn, &[transfer.egreso, transfer.ingreso])
        });
        log_outcome("transfer_delete", "transfer", started_at, &result);
        result
    }

    /// Deletes the whole transfer that `transaction_id` belongs to.
    ///
    /// # Errors
    /// - `TransactionNotFound`; `NotATransferLeg` for standalone movements.
    pub fn delete_transfer_by_leg(&self, transaction_id: TransactionId) -> LedgerResult<()> {
        let started_at = Instant::now();
        let result = with_write_tx(self.conn, |conn| {
            let leg = load_active_transaction(conn, transaction_id)?;
            let pair_id = match (leg.is_transfer, leg.transfer_pair_id) {
                (true, Some(pair_id)) => pair_id,
                _ => return Err(LedgerError::NotATransferLeg(transaction_id)),
            };
            let transfer = load_transfer(conn, pair_id)?;
            void_entries(conn, &[transfer.egreso, transfer.ingreso])
        });
        log_outcome("transfer_delete", "transfer", started_at, &result);
        result
    }

    /// Loads one transfer aggregate.
    pub fn get_transfer(&self, pair_id: TransferPairId) -> LedgerResult<Transfer> {
        with_read_tx(self.conn, |conn| load_transfer(conn, pair_id))
    }
}

fn load_transfer(conn: &Connection, pair_id: TransferPairId) -> LedgerResult<Transfer> {
    let legs = SqliteTransactionRepository::new(conn).list_transfer_legs(pair_id)?;
    assemble_transfer(pair_id, legs)
}

/// Builds the aggregate, rejecting any pair shape other than one matching
/// debit leg and one matching credit leg.
fn assemble_transfer(pair_id: TransferPairId, legs: Vec<Transaction>) -> LedgerResult<Transfer> {
    if legs.is_empty() {
        return Err(LedgerError::TransferNotFound(pair_id));
    }
    let legs_found = legs.len();
    let [first, second]: [Transaction; 2] = legs
        .try_into()
        .map_err(|_| LedgerError::IncompleteTransferPair {
            pair_id,
            legs_found,
        })?;

    let (egreso, ingreso) = match (first.kind, second.kind) {
        (TransactionType::Egreso, TransactionType::Ingreso) => (first, second),
        (TransactionType::Ingreso, TransactionType::Egreso) => (second, first),
        _ => return Err(mismatch(pair_id, "legs must be one egreso and one ingreso")),
    };

    if !egreso.is_transfer || !ingreso.is_transfer {
        return Err(mismatch(pair_id, "leg is not flagged as transfer"));
    }
    if egreso.account_id == ingreso.account_id {
        return Err(mismatch(pair_id, "legs book the same account"));
    }
    if egreso.target_account_id != Some(ingreso.account_id)
        || ingreso.target_account_id != Some(egreso.account_id)
    {
        return Err(mismatch(pair_id, "legs do not reference each other's account"));
    }
    if egreso.amount != ingreso.amount {
        return Err(mismatch(pair_id, "legs carry different amounts"));
    }
    if egreso.date != ingreso.date {
        return Err(mismatch(pair_id, "legs carry different dates"));
    }
    if egreso.concept != ingreso.concept {
        return Err(mismatch(pair_id, "legs carry different concepts"));
    }
    if egreso.notes != ingreso.notes {
        return Err(mismatch(pair_id, "legs carry different notes"));
    }

    Ok(Transfer {
        pair_id,
        egreso,
        ingreso,
    })
}

fn mismatch(pair_id: TransferPairId, detail: &'static str) -> LedgerError {
    LedgerError::TransferPairMismatch { pair_id, detail }
}
