//! Recurring expense contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist recurring expense definitions and their monthly instances.
//! - Resolve which instance (if any) owns a ledger transaction.
//!
//! # Invariants
//! - `(expense_uuid, year, month)` is unique; the schema enforces it.
//! - Payment fields and `status` are always written together.
//! - `previous_amount` is never stored; every read derives it from the
//!   preceding month's `pagado` row of the same expense.

use crate::model::expense::{
    ExpenseInstanceId, ExpenseStatus, MonthlyExpenseInstance, RecurringExpense,
    RecurringExpenseId,
};
use crate::model::transaction::TransactionId;
use crate::repo::{
    bool_to_int, date_to_db, parse_bool, parse_date, parse_optional_decimal,
    parse_optional_uuid, parse_uuid, RepoError, RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

const RECURRING_SELECT_SQL: &str = "SELECT
    expense_uuid,
    name,
    category_uuid,
    default_amount,
    is_active,
    created_at,
    updated_at
FROM recurring_expenses";

const INSTANCE_SELECT_SQL: &str = "SELECT
    instance_uuid,
    expense_uuid,
    year,
    month,
    status,
    amount,
    account_uuid,
    paid_date,
    notes,
    (
        SELECT prior.amount
        FROM monthly_expense_instances AS prior
        WHERE prior.expense_uuid = inst.expense_uuid
          AND prior.status = 'pagado'
          AND prior.year * 12 + prior.month = inst.year * 12 + inst.month - 1
    ) AS previous_amount,
    linked_tx_uuid,
    created_at,
    updated_at
FROM monthly_expense_instances AS inst";

/// Repository interface for recurring expenses and monthly instances.
pub trait ExpenseRepository {
    fn insert_recurring(&self, expense: &RecurringExpense) -> RepoResult<()>;
    fn get_recurring(&self, id: RecurringExpenseId) -> RepoResult<Option<RecurringExpense>>;
    fn set_recurring_active(
        &self,
        id: RecurringExpenseId,
        active: bool,
        now_ms: i64,
    ) -> RepoResult<()>;
    fn insert_instance(&self, instance: &MonthlyExpenseInstance) -> RepoResult<()>;
    /// Rewrites status, payment fields and notes of one instance.
    ///
    /// `previous_amount` on the argument is ignored.
    fn update_instance(&self, instance: &MonthlyExpenseInstance) -> RepoResult<()>;
    fn get_instance(&self, id: ExpenseInstanceId) -> RepoResult<Option<MonthlyExpenseInstance>>;
    fn find_instance(
        &self,
        expense_id: RecurringExpenseId,
        year: i32,
        month: u32,
    ) -> RepoResult<Option<MonthlyExpenseInstance>>;
    fn list_month(&self, year: i32, month: u32) -> RepoResult<Vec<MonthlyExpenseInstance>>;
    /// Returns the instance whose payment created `transaction_id`.
    fn instance_linked_to(
        &self,
        transaction_id: TransactionId,
    ) -> RepoResult<Option<ExpenseInstanceId>>;
}

/// SQLite-backed expense repository.
pub struct SqliteExpenseRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteExpenseRepository<'conn> {
    pub(crate) fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ExpenseRepository for SqliteExpenseRepository<'_> {
    fn insert_recurring(&self, expense: &RecurringExpense) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO recurring_expenses (
                expense_uuid,
                name,
                category_uuid,
                default_amount,
                is_active,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                expense.id.to_string(),
                expense.name.as_str(),
                expense.category_id.map(|id| id.to_string()),
                expense.default_amount.map(|amount| amount.to_string()),
                bool_to_int(expense.is_active),
                expense.created_at,
                expense.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get_recurring(&self, id: RecurringExpenseId) -> RepoResult<Option<RecurringExpense>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{RECURRING_SELECT_SQL} WHERE expense_uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_recurring_row(row)?));
        }
        Ok(None)
    }

    fn set_recurring_active(
        &self,
        id: RecurringExpenseId,
        active: bool,
        now_ms: i64,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE recurring_expenses
             SET is_active = ?2,
                 updated_at = ?3
             WHERE expense_uuid = ?1;",
            params![id.to_string(), bool_to_int(active), now_ms],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn insert_instance(&self, instance: &MonthlyExpenseInstance) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO monthly_expense_instances (
                instance_uuid,
                expense_uuid,
                year,
                month,
                status,
                amount,
                account_uuid,
                paid_date,
                notes,
                linked_tx_uuid,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            params![
                instance.id.to_string(),
                instance.recurring_expense_id.to_string(),
                instance.year,
                instance.month,
                instance.status.as_str(),
                instance.amount.map(|amount| amount.to_string()),
                instance.account_id.map(|id| id.to_string()),
                instance.paid_date.map(date_to_db),
                instance.notes.as_deref(),
                instance.linked_transaction_id.map(|id| id.to_string()),
                instance.created_at,
                instance.updated_at,
            ],
        )?;
        Ok(())
    }

    fn update_instance(&self, instance: &MonthlyExpenseInstance) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE monthly_expense_instances
             SET status = ?2,
                 amount = ?3,
                 account_uuid = ?4,
                 paid_date = ?5,
                 notes = ?6,
                 linked_tx_uuid = ?7,
                 updated_at = ?8
             WHERE instance_uuid = ?1;",
            params![
                instance.id.to_string(),
                instance.status.as_str(),
                instance.amount.map(|amount| amount.to_string()),
                instance.account_id.map(|id| id.to_string()),
                instance.paid_date.map(date_to_db),
                instance.notes.as_deref(),
                instance.linked_transaction_id.map(|id| id.to_string()),
                instance.updated_at,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(instance.id));
        }
        Ok(())
    }

    fn get_instance(&self, id: ExpenseInstanceId) -> RepoResult<Option<MonthlyExpenseInstance>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{INSTANCE_SELECT_SQL} WHERE instance_uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_instance_row(row)?));
        }
        Ok(None)
    }

    fn find_instance(
        &self,
        expense_id: RecurringExpenseId,
        year: i32,
        month: u32,
    ) -> RepoResult<Option<MonthlyExpenseInstance>> {
        let mut stmt = self.conn.prepare(&format!(
            "{INSTANCE_SELECT_SQL}
             WHERE expense_uuid = ?1
               AND year = ?2
               AND month = ?3;"
        ))?;
        let mut rows = stmt.query(params![expense_id.to_string(), year, month])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_instance_row(row)?));
        }
        Ok(None)
    }

    fn list_month(&self, year: i32, month: u32) -> RepoResult<Vec<MonthlyExpenseInstance>> {
        let mut stmt = self.conn.prepare(&format!(
            "{INSTANCE_SELECT_SQL}
             WHERE year = ?1
               AND month = ?2
             ORDER BY created_at ASC, instance_uuid ASC;"
        ))?;
        let mut rows = stmt.query(params![year, month])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_instance_row(row)?);
        }
        Ok(items)
    }

    fn instance_linked_to(
        &self,
        transaction_id: TransactionId,
    ) -> RepoResult<Option<ExpenseInstanceId>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT instance_uuid
                 FROM monthly_expense_instances
                 WHERE linked_tx_uuid = ?1;",
                [transaction_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        value
            .map(|text| parse_uuid(&text, "monthly_expense_instances.instance_uuid"))
            .transpose()
    }
}

fn parse_recurring_row(row: &Row<'_>) -> RepoResult<RecurringExpense> {
    let id_text: String = row.get("expense_uuid")?;
    Ok(RecurringExpense {
        id: parse_uuid(&id_text, "recurring_expenses.expense_uuid")?,
        name: row.get("name")?,
        category_id: parse_optional_uuid(
            row.get("category_uuid")?,
            "recurring_expenses.category_uuid",
        )?,
        default_amount: parse_optional_decimal(
            row.get("default_amount")?,
            "recurring_expenses.default_amount",
        )?,
        is_active: parse_bool(row.get("is_active")?, "recurring_expenses.is_active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_instance_row(row: &Row<'_>) -> RepoResult<MonthlyExpenseInstance> {
    let id_text: String = row.get("instance_uuid")?;
    let expense_text: String = row.get("expense_uuid")?;
    let status_text: String = row.get("status")?;
    let status = ExpenseStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in monthly_expense_instances.status"
        ))
    })?;
    let paid_date = match row.get::<_, Option<String>>("paid_date")? {
        Some(value) => Some(parse_date(&value, "monthly_expense_instances.paid_date")?),
        None => None,
    };

    Ok(MonthlyExpenseInstance {
        id: parse_uuid(&id_text, "monthly_expense_instances.instance_uuid")?,
        recurring_expense_id: parse_uuid(&expense_text, "monthly_expense_instances.expense_uuid")?,
        year: row.get("year")?,
        month: row.get("month")?,
        status,
        amount: parse_optional_decimal(row.get("amount")?, "monthly_expense_instances.amount")?,
        account_id: parse_optional_uuid(
            row.get("account_uuid")?,
            "monthly_expense_instances.account_uuid",
        )?,
        paid_date,
        notes: row.get("notes")?,
        previous_amount: parse_optional_decimal(
            row.get("previous_amount")?,
            "monthly_expense_instances.previous_amount",
        )?,
        linked_transaction_id: parse_optional_uuid(
            row.get("linked_tx_uuid")?,
            "monthly_expense_instances.linked_tx_uuid",
        )?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
