//! Recurring expense payment tracker.
//!
//! # Responsibility
//! - Open monthly instances of recurring expenses.
//! - Pay, adjust and undo payments through the ledger booking primitives.
//!
//! # Invariants
//! - `pagado` instances point at exactly one active `egreso` whose amount,
//!   account and date mirror the instance.
//! - The instance row and its linked transaction change in the same storage
//!   transaction.
//! - A paid instance whose transaction is gone is reported, never repaired.

use crate::model::account::AccountId;
use crate::model::expense::{
    ExpenseInstanceId, ExpenseStatus, MonthlyExpenseInstance, RecurringExpense,
    RecurringExpenseId,
};
use crate::model::transaction::{CategoryId, Transaction, TransactionType};
use crate::model::validation::{month_start, normalize_notes};
use crate::repo::ensure_ledger_schema;
use crate::repo::expense_repo::{ExpenseRepository, SqliteExpenseRepository};
use crate::repo::transaction_repo::{SqliteTransactionRepository, TransactionRepository};
use crate::service::booking::{
    now_ms, post_entries, revise_entries, today, void_entries, with_read_tx, with_write_tx,
    EntryDraft, EntryRevision,
};
use crate::service::error::{log_outcome, LedgerError, LedgerResult};
use crate::service::ledger_service::single;
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::time::Instant;

/// Payment details for a pending instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub amount: Decimal,
    pub account_id: AccountId,
    /// Defaults to the local calendar date.
    pub paid_date: Option<NaiveDate>,
    /// `None` keeps notes already on the instance.
    pub notes: Option<String>,
}

/// Changes to an existing payment. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentPatch {
    pub amount: Option<Decimal>,
    /// Moves the booking to another account.
    pub account_id: Option<AccountId>,
    pub paid_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Monthly expense service facade.
pub struct ExpenseService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> ExpenseService<'conn> {
    /// Creates service from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> LedgerResult<Self> {
        ensure_ledger_schema(conn)?;
        Ok(Self { conn })
    }

    pub fn create_recurring_expense(
        &self,
        name: &str,
        category_id: Option<CategoryId>,
        default_amount: Option<Decimal>,
    ) -> LedgerResult<RecurringExpense> {
        let started_at = Instant::now();
        let result = with_write_tx(self.conn, |conn| {
            let expense = RecurringExpense::new(name, category_id, default_amount, now_ms())?;
            SqliteExpenseRepository::new(conn).insert_recurring(&expense)?;
            Ok(expense)
        });
        log_outcome("recurring_expense_create", "expense", started_at, &result);
        result
    }

    /// Pauses or resumes a recurring expense.
    ///
    /// Paused expenses open no new months; instances already opened keep
    /// working.
    pub fn set_recurring_active(
        &self,
        expense_id: RecurringExpenseId,
        active: bool,
    ) -> LedgerResult<RecurringExpense> {
        let started_at = Instant::now();
        let result = with_write_tx(self.conn, |conn| {
            let expenses = SqliteExpenseRepository::new(conn);
            require_recurring(&expenses, expense_id)?;
            expenses.set_recurring_active(expense_id, active, now_ms())?;
            require_recurring(&expenses, expense_id)
        });
        log_outcome("recurring_expense_set_active", "expense", started_at, &result);
        result
    }

    /// Returns the instance for `(expense, year, month)`, creating it pending
    /// when absent.
    ///
    /// `previous_amount` on the result reflects the preceding calendar month
    /// as currently paid.
    ///
    /// # Errors
    /// - `InvalidMonth`, `RecurringExpenseNotFound`.
    /// - `RecurringExpenseInactive` when the month is not open yet.
    pub fn open_month(
        &self,
        expense_id: RecurringExpenseId,
        year: i32,
        month: u32,
    ) -> LedgerResult<MonthlyExpenseInstance> {
        let started_at = Instant::now();
        let result = with_write_tx(self.conn, |conn| {
            month_start(year, month)?;
            let expenses = SqliteExpenseRepository::new(conn);
            let expense = require_recurring(&expenses, expense_id)?;
            if let Some(existing) = expenses.find_instance(expense_id, year, month)? {
                return Ok(existing);
            }
            if !expense.is_active {
                return Err(LedgerError::RecurringExpenseInactive(expense_id));
            }

            let instance = MonthlyExpenseInstance::pending(expense_id, year, month, now_ms());
            expenses.insert_instance(&instance)?;
            require_instance(&expenses, instance.id)
        });
        log_outcome("expense_open_month", "expense", started_at, &result);
        result
    }

    pub fn get_instance(&self, id: ExpenseInstanceId) -> LedgerResult<MonthlyExpenseInstance> {
        require_instance(&SqliteExpenseRepository::new(self.conn), id)
    }

    /// Lists every opened instance of one month in creation order.
    pub fn list_month(&self, year: i32, month: u32) -> LedgerResult<Vec<MonthlyExpenseInstance>> {
        month_start(year, month)?;
        Ok(SqliteExpenseRepository::new(self.conn).list_month(year, month)?)
    }

    /// Books the payment `egreso` and marks the instance `pagado`.
    ///
    /// # Errors
    /// - `ExpenseInstanceNotFound`, `AlreadyPaid`, `InvalidAmount`.
    /// - `AccountNotFound` / `AccountInactive`.
    pub fn pay(
        &self,
        instance_id: ExpenseInstanceId,
        request: &PaymentRequest,
    ) -> LedgerResult<MonthlyExpenseInstance> {
        let started_at = Instant::now();
        let result = with_write_tx(self.conn, |conn| {
            let expenses = SqliteExpenseRepository::new(conn);
            let mut instance = require_instance(&expenses, instance_id)?;
            if instance.is_paid() {
                return Err(LedgerError::AlreadyPaid(instance_id));
            }
            let expense = require_recurring(&expenses, instance.recurring_expense_id)?;

            let notes = match request.notes.as_deref() {
                Some(notes) => normalize_notes(Some(notes)),
                None => instance.notes.clone(),
            };
            let draft = EntryDraft {
                account_id: request.account_id,
                category_id: expense.category_id,
                kind: TransactionType::Egreso,
                amount: request.amount,
                concept: expense.name,
                date: request.paid_date.unwrap_or_else(today),
                notes,
                transfer: None,
            };
            let payment = single(post_entries(conn, vec![draft])?)?;

            instance.status = ExpenseStatus::Pagado;
            mirror_payment(&mut instance, &payment);
            expenses.update_instance(&instance)?;
            Ok(instance)
        });
        log_outcome("expense_pay", "expense", started_at, &result);
        result
    }

    /// Rewrites the linked transaction and mirrors it onto the instance.
    ///
    /// # Errors
    /// - `ExpenseInstanceNotFound`, `NotPaid`, `InvalidAmount`.
    /// - `AccountNotFound` / `AccountInactive` for a new account.
    /// - `PaymentLinkBroken`.
    pub fn update(
        &self,
        instance_id: ExpenseInstanceId,
        patch: &PaymentPatch,
    ) -> LedgerResult<MonthlyExpenseInstance> {
        let started_at = Instant::now();
        let result = with_write_tx(self.conn, |conn| {
            let expenses = SqliteExpenseRepository::new(conn);
            let mut instance = require_paid_instance(&expenses, instance_id)?;
            let linked = load_payment(conn, &instance)?;

            let revision = EntryRevision {
                amount: patch.amount,
                date: patch.paid_date,
                notes: patch.notes.clone(),
                account_id: patch.account_id,
                ..EntryRevision::default()
            };
            let payment = single(revise_entries(conn, vec![(linked, revision)])?)?;

            mirror_payment(&mut instance, &payment);
            expenses.update_instance(&instance)?;
            Ok(instance)
        });
        log_outcome("expense_update", "expense", started_at, &result);
        result
    }

    /// Tombstones the payment and returns the instance to `pendiente`.
    ///
    /// Notes survive; amount, account, date and link are cleared.
    pub fn undo_payment(
        &self,
        instance_id: ExpenseInstanceId,
    ) -> LedgerResult<MonthlyExpenseInstance> {
        let started_at = Instant::now();
        let result = with_write_tx(self.conn, |conn| {
            let expenses = SqliteExpenseRepository::new(conn);
            let mut instance = require_paid_instance(&expenses, instance_id)?;
            let linked = load_payment(conn, &instance)?;

            void_entries(conn, &[linked])?;
            instance.clear_payment(now_ms());
            expenses.update_instance(&instance)?;
            Ok(instance)
        });
        log_outcome("expense_undo_payment", "expense", started_at, &result);
        result
    }

    /// Loads an instance together with its active payment, if paid.
    pub fn get_payment(
        &self,
        instance_id: ExpenseInstanceId,
    ) -> LedgerResult<(MonthlyExpenseInstance, Option<Transaction>)> {
        with_read_tx(self.conn, |conn| {
            let instance = require_instance(&SqliteExpenseRepository::new(conn), instance_id)?;
            if !instance.is_paid() {
                return Ok((instance, None));
            }
            let payment = load_payment(conn, &instance)?;
            Ok((instance, Some(payment)))
        })
    }
}

fn require_recurring(
    expenses: &impl ExpenseRepository,
    id: RecurringExpenseId,
) -> LedgerResult<RecurringExpense> {
    expenses
        .get_recurring(id)?
        .ok_or(LedgerError::RecurringExpenseNotFound(id))
}

fn require_instance(
    expenses: &impl ExpenseRepository,
    id: ExpenseInstanceId,
) -> LedgerResult<MonthlyExpenseInstance> {
    expenses
        .get_instance(id)?
        .ok_or(LedgerError::ExpenseInstanceNotFound(id))
}

fn require_paid_instance(
    expenses: &impl ExpenseRepository,
    id: ExpenseInstanceId,
) -> LedgerResult<MonthlyExpenseInstance> {
    let instance = require_instance(expenses, id)?;
    if !instance.is_paid() {
        return Err(LedgerError::NotPaid(id));
    }
    Ok(instance)
}

/// Loads the active `egreso` a paid instance points at.
fn load_payment(
    conn: &Connection,
    instance: &MonthlyExpenseInstance,
) -> LedgerResult<Transaction> {
    let broken = || LedgerError::PaymentLinkBroken(instance.id);
    let linked_id = instance.linked_transaction_id.ok_or_else(broken)?;
    let payment = SqliteTransactionRepository::new(conn)
        .get_transaction(linked_id, false)?
        .ok_or_else(broken)?;
    if payment.kind != TransactionType::Egreso || payment.is_transfer {
        return Err(broken());
    }
    Ok(payment)
}

fn mirror_payment(instance: &mut MonthlyExpenseInstance, payment: &Transaction) {
    instance.amount = Some(payment.amount);
    instance.account_id = Some(payment.account_id);
    instance.paid_date = Some(payment.date);
    instance.notes = payment.notes.clone();
    instance.linked_transaction_id = Some(payment.id);
    instance.updated_at = payment.updated_at;
}
