//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `pocketbook_core` linkage without the Flutter runtime.
//! - `pocketbook_cli demo` books a short scenario against an in-memory
//!   ledger and prints the resulting balances.

use chrono::NaiveDate;
use pocketbook_core::{
    open_db_in_memory, AccountService, ExpenseService, LedgerService, NewTransaction,
    NewTransfer, PaymentRequest, StatsService, TransactionType, TransferService,
};
use rust_decimal::Decimal;
use std::error::Error;
use std::process::ExitCode;
use uuid::Uuid;

fn main() -> ExitCode {
    println!("pocketbook_core ping={}", pocketbook_core::ping());
    println!("pocketbook_core version={}", pocketbook_core::core_version());

    if std::env::args().nth(1).as_deref() != Some("demo") {
        return ExitCode::SUCCESS;
    }
    match run_demo() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("demo failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_demo() -> Result<(), Box<dyn Error>> {
    let conn = open_db_in_memory()?;
    let accounts = AccountService::try_new(&conn)?;
    let ledger = LedgerService::try_new(&conn)?;
    let transfers = TransferService::try_new(&conn)?;
    let expenses = ExpenseService::try_new(&conn)?;

    let day = NaiveDate::from_ymd_opt(2024, 5, 3).ok_or("invalid demo date")?;
    let checking = accounts.create_account("Checking", "USD", Decimal::new(1000, 0))?;
    let cash = accounts.create_account("Cash", "USD", Decimal::ZERO)?;

    ledger.create_transaction(&NewTransaction {
        account_id: checking.id,
        category_id: Uuid::new_v4(),
        kind: TransactionType::Egreso,
        amount: Decimal::new(25050, 2),
        concept: "Groceries".to_string(),
        date: day,
        notes: None,
    })?;
    transfers.create_transfer(&NewTransfer {
        from_account_id: checking.id,
        to_account_id: cash.id,
        amount: Decimal::new(100, 0),
        concept: "ATM".to_string(),
        date: day,
        notes: None,
    })?;

    let internet = expenses.create_recurring_expense("Internet", None, None)?;
    let instance = expenses.open_month(internet.id, 2024, 5)?;
    expenses.pay(
        instance.id,
        &PaymentRequest {
            amount: Decimal::new(45, 0),
            account_id: checking.id,
            paid_date: Some(day),
            notes: None,
        },
    )?;

    for account in accounts.list_accounts(true)? {
        println!(
            "account name={} currency={} balance={}",
            account.name, account.currency, account.current_balance
        );
    }
    for summary in StatsService::try_new(&conn)?.monthly_summary(2024, 5)? {
        println!(
            "summary currency={} income={} expense={} net={} transfers_out={}",
            summary.currency, summary.income, summary.expense, summary.net, summary.transfers_out
        );
    }
    accounts.audit_all()?;
    println!("audit status=ok");
    Ok(())
}
