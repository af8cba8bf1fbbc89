//! Read-only monthly aggregates over the ledger.
//!
//! # Invariants
//! - Income and expense totals exclude transfer legs; transfer volume is
//!   reported separately so moving money never looks like spending.
//! - Totals are grouped per currency and never mixed across currencies.
//! - All reads of one call see the same snapshot.

use crate::model::account::AccountId;
use crate::model::expense::MonthlyExpenseInstance;
use crate::model::transaction::{CategoryId, Transaction, TransactionType};
use crate::model::validation::{checked_sum, month_bounds, ValidationError};
use crate::repo::account_repo::{AccountRepository, SqliteAccountRepository};
use crate::repo::{ensure_ledger_schema, RepoError};
use crate::repo::expense_repo::{ExpenseRepository, SqliteExpenseRepository};
use crate::repo::transaction_repo::{
    SqliteTransactionRepository, TransactionListQuery, TransactionRepository,
};
use crate::service::booking::{require_account, with_read_tx};
use crate::service::error::{LedgerError, LedgerResult};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Spending of one category inside a monthly summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    /// `None` groups uncategorized movements.
    pub category_id: Option<CategoryId>,
    pub total: Decimal,
}

/// Monthly movement totals for one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub currency: String,
    pub year: i32,
    pub month: u32,
    pub income: Decimal,
    pub expense: Decimal,
    /// `income - expense`.
    pub net: Decimal,
    pub transfers_in: Decimal,
    pub transfers_out: Decimal,
    /// Expense by category, largest first.
    pub expense_by_category: Vec<CategoryTotal>,
}

/// Pending monthly expenses with an expected-outflow hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingExpenses {
    pub instances: Vec<MonthlyExpenseInstance>,
    /// Sum of `previous_amount` over pending instances that have one.
    pub expected_outflow: Decimal,
}

/// Stats aggregator facade.
pub struct StatsService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> StatsService<'conn> {
    /// Creates service from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> LedgerResult<Self> {
        ensure_ledger_schema(conn)?;
        Ok(Self { conn })
    }

    /// Summarizes one month across all accounts, one entry per currency.
    ///
    /// Currencies without movements in the month are omitted.
    pub fn monthly_summary(&self, year: i32, month: u32) -> LedgerResult<Vec<MonthlySummary>> {
        let (from, until) = month_bounds(year, month)?;
        with_read_tx(self.conn, |conn| {
            let currencies = SqliteAccountRepository::new(conn)
                .list_accounts(true)?
                .into_iter()
                .map(|account| (account.id, account.currency))
                .collect::<HashMap<AccountId, String>>();
            let rows = month_rows(conn, None, from, until)?;

            let mut per_currency: BTreeMap<String, Accumulator> = BTreeMap::new();
            for row in &rows {
                let currency = currencies.get(&row.account_id).ok_or_else(|| {
                    LedgerError::Repo(RepoError::InvalidData(format!(
                        "transaction {} references unknown account {}",
                        row.id, row.account_id
                    )))
                })?;
                per_currency
                    .entry(currency.clone())
                    .or_default()
                    .add(row)?;
            }

            per_currency
                .into_iter()
                .map(|(currency, totals)| totals.finish(&currency, year, month))
                .collect::<LedgerResult<Vec<_>>>()
        })
    }

    /// Summarizes one month of a single account.
    pub fn account_monthly_summary(
        &self,
        account_id: AccountId,
        year: i32,
        month: u32,
    ) -> LedgerResult<MonthlySummary> {
        let (from, until) = month_bounds(year, month)?;
        with_read_tx(self.conn, |conn| {
            let account = require_account(&SqliteAccountRepository::new(conn), account_id)?;
            let mut totals = Accumulator::default();
            for row in &month_rows(conn, Some(account_id), from, until)? {
                totals.add(row)?;
            }
            totals.finish(&account.currency, year, month)
        })
    }

    /// Lists still-unpaid instances of one month.
    pub fn pending_expenses(&self, year: i32, month: u32) -> LedgerResult<PendingExpenses> {
        month_bounds(year, month)?;
        let instances = SqliteExpenseRepository::new(self.conn)
            .list_month(year, month)?
            .into_iter()
            .filter(|instance| !instance.is_paid())
            .collect::<Vec<_>>();
        let expected_outflow = instances
            .iter()
            .filter_map(|instance| instance.previous_amount)
            .try_fold(Decimal::ZERO, checked_sum)?;
        Ok(PendingExpenses {
            instances,
            expected_outflow,
        })
    }
}

fn month_rows(
    conn: &Connection,
    account_id: Option<AccountId>,
    from: NaiveDate,
    until: NaiveDate,
) -> LedgerResult<Vec<Transaction>> {
    let query = TransactionListQuery {
        account_id,
        from: Some(from),
        until: Some(until),
        ..TransactionListQuery::default()
    };
    Ok(SqliteTransactionRepository::new(conn).list_transactions(&query)?)
}

#[derive(Default)]
struct Accumulator {
    income: Decimal,
    expense: Decimal,
    transfers_in: Decimal,
    transfers_out: Decimal,
    by_category: HashMap<Option<CategoryId>, Decimal>,
}

impl Accumulator {
    fn add(&mut self, row: &Transaction) -> LedgerResult<()> {
        let slot = match (row.is_transfer, row.kind) {
            (true, TransactionType::Ingreso) => &mut self.transfers_in,
            (true, TransactionType::Egreso) => &mut self.transfers_out,
            (false, TransactionType::Ingreso) => &mut self.income,
            (false, TransactionType::Egreso) => {
                let category = self.by_category.entry(row.category_id).or_default();
                *category = checked_sum(*category, row.amount)?;
                &mut self.expense
            }
        };
        *slot = checked_sum(*slot, row.amount)?;
        Ok(())
    }

    fn finish(self, currency: &str, year: i32, month: u32) -> LedgerResult<MonthlySummary> {
        let mut expense_by_category = self
            .by_category
            .into_iter()
            .map(|(category_id, total)| CategoryTotal { category_id, total })
            .collect::<Vec<_>>();
        expense_by_category.sort_by(|left, right| {
            right
                .total
                .cmp(&left.total)
                .then_with(|| left.category_id.cmp(&right.category_id))
        });

        let net = self
            .income
            .checked_sub(self.expense)
            .ok_or(ValidationError::AmountOutOfRange)?;
        Ok(MonthlySummary {
            currency: currency.to_string(),
            year,
            month,
            income: self.income,
            expense: self.expense,
            net,
            transfers_in: self.transfers_in,
            transfers_out: self.transfers_out,
            expense_by_category,
        })
    }
}
