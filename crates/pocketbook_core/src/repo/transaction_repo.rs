//! Transaction ledger contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist single-leg ledger rows, including both legs of transfers.
//! - Provide the ledger-side sum used by the balance audit.
//!
//! # Invariants
//! - Tombstoned rows (`is_deleted=1`) are invisible unless explicitly
//!   requested and never count towards balances.
//! - Listing order is deterministic: `date DESC, created_at DESC, tx_uuid ASC`.
//! - Repository writes do not touch account balances; services pair every
//!   row write with the matching balance delta.

use crate::model::account::AccountId;
use crate::model::transaction::{Transaction, TransactionId, TransactionType, TransferPairId};
use crate::repo::{
    bool_to_int, date_to_db, parse_bool, parse_date, parse_decimal, parse_optional_uuid,
    parse_uuid, RepoError, RepoResult,
};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use rust_decimal::Decimal;

const TRANSACTION_SELECT_SQL: &str = "SELECT
    tx_uuid,
    account_uuid,
    category_uuid,
    type,
    amount,
    concept,
    date,
    notes,
    is_transfer,
    target_account_uuid,
    transfer_pair_uuid,
    is_deleted,
    created_at,
    updated_at
FROM transactions";

/// Query options for listing ledger rows.
#[derive(Debug, Clone, Default)]
pub struct TransactionListQuery {
    pub account_id: Option<AccountId>,
    /// Inclusive lower date bound.
    pub from: Option<NaiveDate>,
    /// Exclusive upper date bound.
    pub until: Option<NaiveDate>,
    pub kind: Option<TransactionType>,
    pub exclude_transfers: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for ledger rows.
pub trait TransactionRepository {
    fn insert_transaction(&self, transaction: &Transaction) -> RepoResult<()>;
    /// Rewrites the mutable fields of an active row.
    fn update_transaction(&self, transaction: &Transaction) -> RepoResult<()>;
    fn get_transaction(
        &self,
        id: TransactionId,
        include_deleted: bool,
    ) -> RepoResult<Option<Transaction>>;
    fn list_transactions(&self, query: &TransactionListQuery) -> RepoResult<Vec<Transaction>>;
    /// Returns every active row tagged with `pair_id`, debit leg first.
    fn list_transfer_legs(&self, pair_id: TransferPairId) -> RepoResult<Vec<Transaction>>;
    fn tombstone_transaction(&self, id: TransactionId, now_ms: i64) -> RepoResult<()>;
    /// Σ signed amounts of the account's active rows.
    fn signed_total(&self, account_id: AccountId) -> RepoResult<Decimal>;
}

/// SQLite-backed transaction repository.
pub struct SqliteTransactionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTransactionRepository<'conn> {
    pub(crate) fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl TransactionRepository for SqliteTransactionRepository<'_> {
    fn insert_transaction(&self, transaction: &Transaction) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO transactions (
                tx_uuid,
                account_uuid,
                category_uuid,
                type,
                amount,
                concept,
                date,
                notes,
                is_transfer,
                target_account_uuid,
                transfer_pair_uuid,
                is_deleted,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14);",
            params![
                transaction.id.to_string(),
                transaction.account_id.to_string(),
                transaction.category_id.map(|id| id.to_string()),
                transaction.kind.as_str(),
                transaction.amount.to_string(),
                transaction.concept.as_str(),
                date_to_db(transaction.date),
                transaction.notes.as_deref(),
                bool_to_int(transaction.is_transfer),
                transaction.target_account_id.map(|id| id.to_string()),
                transaction.transfer_pair_id.map(|id| id.to_string()),
                bool_to_int(transaction.is_deleted),
                transaction.created_at,
                transaction.updated_at,
            ],
        )?;
        Ok(())
    }

    fn update_transaction(&self, transaction: &Transaction) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE transactions
             SET account_uuid = ?2,
                 category_uuid = ?3,
                 amount = ?4,
                 concept = ?5,
                 date = ?6,
                 notes = ?7,
                 updated_at = ?8
             WHERE tx_uuid = ?1
               AND is_deleted = 0;",
            params![
                transaction.id.to_string(),
                transaction.account_id.to_string(),
                transaction.category_id.map(|id| id.to_string()),
                transaction.amount.to_string(),
                transaction.concept.as_str(),
                date_to_db(transaction.date),
                transaction.notes.as_deref(),
                transaction.updated_at,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(transaction.id));
        }
        Ok(())
    }

    fn get_transaction(
        &self,
        id: TransactionId,
        include_deleted: bool,
    ) -> RepoResult<Option<Transaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TRANSACTION_SELECT_SQL}
             WHERE tx_uuid = ?1
               AND (?2 = 1 OR is_deleted = 0);"
        ))?;
        let mut rows = stmt.query(params![id.to_string(), bool_to_int(include_deleted)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_transaction_row(row)?));
        }
        Ok(None)
    }

    fn list_transactions(&self, query: &TransactionListQuery) -> RepoResult<Vec<Transaction>> {
        let mut sql = format!("{TRANSACTION_SELECT_SQL} WHERE is_deleted = 0");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(account_id) = query.account_id {
            sql.push_str(" AND account_uuid = ?");
            bind_values.push(Value::Text(account_id.to_string()));
        }
        if let Some(from) = query.from {
            sql.push_str(" AND date >= ?");
            bind_values.push(Value::Text(date_to_db(from)));
        }
        if let Some(until) = query.until {
            sql.push_str(" AND date < ?");
            bind_values.push(Value::Text(date_to_db(until)));
        }
        if let Some(kind) = query.kind {
            sql.push_str(" AND type = ?");
            bind_values.push(Value::Text(kind.as_str().to_string()));
        }
        if query.exclude_transfers {
            sql.push_str(" AND is_transfer = 0");
        }

        sql.push_str(" ORDER BY date DESC, created_at DESC, tx_uuid ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_transaction_row(row)?);
        }
        Ok(items)
    }

    fn list_transfer_legs(&self, pair_id: TransferPairId) -> RepoResult<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TRANSACTION_SELECT_SQL}
             WHERE transfer_pair_uuid = ?1
               AND is_deleted = 0
             ORDER BY CASE type WHEN 'egreso' THEN 0 ELSE 1 END, tx_uuid ASC;"
        ))?;
        let mut rows = stmt.query([pair_id.to_string()])?;
        let mut legs = Vec::new();
        while let Some(row) = rows.next()? {
            legs.push(parse_transaction_row(row)?);
        }
        Ok(legs)
    }

    fn tombstone_transaction(&self, id: TransactionId, now_ms: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE transactions
             SET is_deleted = 1,
                 updated_at = ?2
             WHERE tx_uuid = ?1
               AND is_deleted = 0;",
            params![id.to_string(), now_ms],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn signed_total(&self, account_id: AccountId) -> RepoResult<Decimal> {
        let mut stmt = self.conn.prepare(
            "SELECT type, amount
             FROM transactions
             WHERE account_uuid = ?1
               AND is_deleted = 0;",
        )?;
        let mut rows = stmt.query([account_id.to_string()])?;
        let mut total = Decimal::ZERO;
        while let Some(row) = rows.next()? {
            let type_text: String = row.get(0)?;
            let amount_text: String = row.get(1)?;
            let kind = parse_transaction_type(&type_text)?;
            let amount = parse_decimal(&amount_text, "transactions.amount")?;
            total = total.checked_add(kind.signed(amount)).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "ledger sum overflows for account {account_id}"
                ))
            })?;
        }
        Ok(total)
    }
}

fn parse_transaction_row(row: &Row<'_>) -> RepoResult<Transaction> {
    let id_text: String = row.get("tx_uuid")?;
    let account_text: String = row.get("account_uuid")?;
    let type_text: String = row.get("type")?;
    let amount_text: String = row.get("amount")?;
    let date_text: String = row.get("date")?;

    Ok(Transaction {
        id: parse_uuid(&id_text, "transactions.tx_uuid")?,
        account_id: parse_uuid(&account_text, "transactions.account_uuid")?,
        category_id: parse_optional_uuid(row.get("category_uuid")?, "transactions.category_uuid")?,
        kind: parse_transaction_type(&type_text)?,
        amount: parse_decimal(&amount_text, "transactions.amount")?,
        concept: row.get("concept")?,
        date: parse_date(&date_text, "transactions.date")?,
        notes: row.get("notes")?,
        is_transfer: parse_bool(row.get("is_transfer")?, "transactions.is_transfer")?,
        target_account_id: parse_optional_uuid(
            row.get("target_account_uuid")?,
            "transactions.target_account_uuid",
        )?,
        transfer_pair_id: parse_optional_uuid(
            row.get("transfer_pair_uuid")?,
            "transactions.transfer_pair_uuid",
        )?,
        is_deleted: parse_bool(row.get("is_deleted")?, "transactions.is_deleted")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_transaction_type(value: &str) -> RepoResult<TransactionType> {
    TransactionType::parse(value).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid transaction type `{value}` in transactions.type"
        ))
    })
}
