//! Recurring expense and monthly instance domain model.
//!
//! # Invariants
//! - `Pagado` instances carry `amount`, `account_id`, `paid_date` and
//!   `linked_transaction_id`; `Pendiente` instances carry none of them.
//! - At most one instance exists per recurring expense and calendar month.

use crate::model::account::AccountId;
use crate::model::transaction::{CategoryId, TransactionId};
use crate::model::validation::{ensure_positive, normalize_name, ValidationError};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type RecurringExpenseId = Uuid;
pub type ExpenseInstanceId = Uuid;

/// Definition of a bill that repeats every month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringExpense {
    pub id: RecurringExpenseId,
    /// Used as the concept of payment transactions.
    pub name: String,
    pub category_id: Option<CategoryId>,
    /// Suggested amount when no previous payment exists.
    pub default_amount: Option<Decimal>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl RecurringExpense {
    /// Builds an active definition from user input.
    pub fn new(
        name: &str,
        category_id: Option<CategoryId>,
        default_amount: Option<Decimal>,
        now_ms: i64,
    ) -> Result<Self, ValidationError> {
        let default_amount = default_amount.map(ensure_positive).transpose()?;
        Ok(Self {
            id: Uuid::new_v4(),
            name: normalize_name(name)?,
            category_id,
            default_amount,
            is_active: true,
            created_at: now_ms,
            updated_at: now_ms,
        })
    }
}

/// Payment state of one monthly instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    Pendiente,
    Pagado,
}

impl ExpenseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pendiente => "pendiente",
            Self::Pagado => "pagado",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pendiente" => Some(Self::Pendiente),
            "pagado" => Some(Self::Pagado),
            _ => None,
        }
    }
}

/// Per-month occurrence of a recurring expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyExpenseInstance {
    pub id: ExpenseInstanceId,
    pub recurring_expense_id: RecurringExpenseId,
    pub year: i32,
    /// 1..=12.
    pub month: u32,
    pub status: ExpenseStatus,
    pub amount: Option<Decimal>,
    pub account_id: Option<AccountId>,
    pub paid_date: Option<NaiveDate>,
    pub notes: Option<String>,
    /// Amount paid for the preceding calendar month, as of this read.
    ///
    /// Read-only. Paying, editing or undoing the prior month changes it.
    pub previous_amount: Option<Decimal>,
    pub linked_transaction_id: Option<TransactionId>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl MonthlyExpenseInstance {
    /// Creates a pending instance for the given month.
    pub fn pending(
        recurring_expense_id: RecurringExpenseId,
        year: i32,
        month: u32,
        now_ms: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recurring_expense_id,
            year,
            month,
            status: ExpenseStatus::Pendiente,
            amount: None,
            account_id: None,
            paid_date: None,
            notes: None,
            previous_amount: None,
            linked_transaction_id: None,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == ExpenseStatus::Pagado
    }

    /// Returns the instance to `Pendiente`, dropping every payment field.
    pub fn clear_payment(&mut self, now_ms: i64) {
        self.status = ExpenseStatus::Pendiente;
        self.amount = None;
        self.account_id = None;
        self.paid_date = None;
        self.linked_transaction_id = None;
        self.updated_at = now_ms;
    }
}
