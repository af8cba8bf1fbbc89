use chrono::NaiveDate;
use pocketbook_core::db::open_db_in_memory;
use pocketbook_core::{
    Account, AccountService, ErrorKind, LedgerError, LedgerService, NewTransaction,
    TransactionListQuery, TransactionPatch, TransactionType, ValidationError,
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

fn account(conn: &Connection, name: &str, initial: Decimal) -> Account {
    AccountService::try_new(conn)
        .unwrap()
        .create_account(name, "ars", initial)
        .unwrap()
}

fn balance(conn: &Connection, account: &Account) -> Decimal {
    AccountService::try_new(conn)
        .unwrap()
        .get_account(account.id)
        .unwrap()
        .unwrap()
        .current_balance
}

fn movement(account: &Account, kind: TransactionType, amount: Decimal) -> NewTransaction {
    NewTransaction {
        account_id: account.id,
        category_id: Uuid::new_v4(),
        kind,
        amount,
        concept: "  Groceries  ".to_string(),
        date: day(3),
        notes: Some("weekly".to_string()),
    }
}

fn row_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM transactions;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn create_applies_signed_delta_and_normalizes_fields() {
    let conn = open_db_in_memory().unwrap();
    let wallet = account(&conn, "Wallet", dec!(1000));
    assert_eq!(wallet.currency, "ARS");
    let ledger = LedgerService::try_new(&conn).unwrap();

    let spent = ledger
        .create_transaction(&movement(&wallet, TransactionType::Egreso, dec!(250.50)))
        .unwrap();
    assert_eq!(spent.concept, "Groceries");
    assert!(!spent.is_transfer);
    assert_eq!(balance(&conn, &wallet), dec!(749.50));

    ledger
        .create_transaction(&movement(&wallet, TransactionType::Ingreso, dec!(100)))
        .unwrap();
    assert_eq!(balance(&conn, &wallet), dec!(849.50));

    let loaded = ledger.get_transaction(spent.id).unwrap().unwrap();
    assert_eq!(loaded, spent);
}

#[test]
fn update_replaces_old_delta_with_new_delta() {
    let conn = open_db_in_memory().unwrap();
    let wallet = account(&conn, "Wallet", dec!(1000));
    let ledger = LedgerService::try_new(&conn).unwrap();
    let spent = ledger
        .create_transaction(&movement(&wallet, TransactionType::Egreso, dec!(200)))
        .unwrap();

    let updated = ledger
        .update_transaction(
            spent.id,
            &TransactionPatch {
                amount: Some(dec!(350)),
                concept: Some("Supermarket".to_string()),
                notes: Some("   ".to_string()),
                ..TransactionPatch::default()
            },
        )
        .unwrap();

    assert_eq!(updated.amount, dec!(350));
    assert_eq!(updated.concept, "Supermarket");
    assert_eq!(updated.notes, None);
    assert_eq!(updated.date, spent.date);
    assert_eq!(balance(&conn, &wallet), dec!(650));
}

#[test]
fn delete_reverses_delta_and_hides_row() {
    let conn = open_db_in_memory().unwrap();
    let wallet = account(&conn, "Wallet", dec!(500));
    let ledger = LedgerService::try_new(&conn).unwrap();
    let earned = ledger
        .create_transaction(&movement(&wallet, TransactionType::Ingreso, dec!(120)))
        .unwrap();
    assert_eq!(balance(&conn, &wallet), dec!(620));

    ledger.delete_transaction(earned.id).unwrap();

    assert_eq!(balance(&conn, &wallet), dec!(500));
    assert!(ledger.get_transaction(earned.id).unwrap().is_none());
    assert_eq!(row_count(&conn), 1, "tombstones keep the row");

    let err = ledger.delete_transaction(earned.id).unwrap_err();
    assert!(matches!(err, LedgerError::TransactionNotFound(id) if id == earned.id));
}

#[test]
fn rejected_create_leaves_no_trace() {
    let conn = open_db_in_memory().unwrap();
    let wallet = account(&conn, "Wallet", dec!(100));
    let ledger = LedgerService::try_new(&conn).unwrap();

    for amount in [Decimal::ZERO, dec!(-5)] {
        let err = ledger
            .create_transaction(&movement(&wallet, TransactionType::Egreso, amount))
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::InvalidAmount(_))
        ));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    let mut ghost = movement(&wallet, TransactionType::Egreso, dec!(10));
    ghost.account_id = Uuid::new_v4();
    let err = ledger.create_transaction(&ghost).unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(_)));

    assert_eq!(row_count(&conn), 0);
    assert_eq!(balance(&conn, &wallet), dec!(100));
}

#[test]
fn inactive_account_rejects_new_bookings_but_keeps_history_editable() {
    let conn = open_db_in_memory().unwrap();
    let wallet = account(&conn, "Old card", dec!(0));
    let ledger = LedgerService::try_new(&conn).unwrap();
    let spent = ledger
        .create_transaction(&movement(&wallet, TransactionType::Egreso, dec!(40)))
        .unwrap();

    let archived = AccountService::try_new(&conn)
        .unwrap()
        .set_account_active(wallet.id, false)
        .unwrap();
    assert!(!archived.is_active);

    let err = ledger
        .create_transaction(&movement(&wallet, TransactionType::Egreso, dec!(1)))
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccountInactive(id) if id == wallet.id));
    assert_eq!(err.kind(), ErrorKind::StateConflict);

    ledger
        .update_transaction(
            spent.id,
            &TransactionPatch {
                amount: Some(dec!(30)),
                ..TransactionPatch::default()
            },
        )
        .unwrap();
    assert_eq!(balance(&conn, &wallet), dec!(-30));
}

#[test]
fn update_with_invalid_amount_changes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let wallet = account(&conn, "Wallet", dec!(1000));
    let ledger = LedgerService::try_new(&conn).unwrap();
    let spent = ledger
        .create_transaction(&movement(&wallet, TransactionType::Egreso, dec!(200)))
        .unwrap();

    let err = ledger
        .update_transaction(
            spent.id,
            &TransactionPatch {
                amount: Some(Decimal::ZERO),
                concept: Some("changed".to_string()),
                ..TransactionPatch::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.code(), "invalid_amount");

    let stored = ledger.get_transaction(spent.id).unwrap().unwrap();
    assert_eq!(stored, spent);
    assert_eq!(balance(&conn, &wallet), dec!(800));
}

#[test]
fn list_filters_by_account_range_and_type() {
    let conn = open_db_in_memory().unwrap();
    let wallet = account(&conn, "Wallet", dec!(0));
    let bank = account(&conn, "Bank", dec!(0));
    let ledger = LedgerService::try_new(&conn).unwrap();

    for (target, kind, date) in [
        (&wallet, TransactionType::Egreso, day(1)),
        (&wallet, TransactionType::Ingreso, day(10)),
        (&wallet, TransactionType::Egreso, day(20)),
        (&bank, TransactionType::Egreso, day(10)),
    ] {
        let mut request = movement(target, kind, dec!(10));
        request.date = date;
        ledger.create_transaction(&request).unwrap();
    }

    let wallet_rows = ledger
        .list_transactions(&TransactionListQuery {
            account_id: Some(wallet.id),
            ..TransactionListQuery::default()
        })
        .unwrap();
    assert_eq!(wallet_rows.len(), 3);
    assert!(wallet_rows.windows(2).all(|pair| pair[0].date >= pair[1].date));

    let mid_month_expenses = ledger
        .list_transactions(&TransactionListQuery {
            from: Some(day(5)),
            until: Some(day(25)),
            kind: Some(TransactionType::Egreso),
            ..TransactionListQuery::default()
        })
        .unwrap();
    assert_eq!(mid_month_expenses.len(), 2);

    let first_page = ledger
        .list_transactions(&TransactionListQuery {
            limit: Some(2),
            ..TransactionListQuery::default()
        })
        .unwrap();
    assert_eq!(first_page.len(), 2);
}
