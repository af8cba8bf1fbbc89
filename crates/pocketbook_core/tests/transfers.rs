use chrono::NaiveDate;
use pocketbook_core::db::open_db_in_memory;
use pocketbook_core::{
    Account, AccountService, ErrorKind, LedgerError, LedgerService, NewTransaction, NewTransfer,
    TransactionPatch, TransactionType, TransferPatch, TransferService, ValidationError,
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

fn account(conn: &Connection, name: &str, currency: &str, initial: Decimal) -> Account {
    AccountService::try_new(conn)
        .unwrap()
        .create_account(name, currency, initial)
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

fn transfer(from: &Account, to: &Account, amount: Decimal) -> NewTransfer {
    NewTransfer {
        from_account_id: from.id,
        to_account_id: to.id,
        amount,
        concept: "rent".to_string(),
        date: today(),
        notes: None,
    }
}

fn row_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM transactions;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn create_transfer_moves_money_with_two_linked_legs() {
    let conn = open_db_in_memory().unwrap();
    let a = account(&conn, "A", "ARS", dec!(1000));
    let b = account(&conn, "B", "ARS", dec!(500));
    let service = TransferService::try_new(&conn).unwrap();

    let created = service.create_transfer(&transfer(&a, &b, dec!(200))).unwrap();

    assert_eq!(balance(&conn, &a), dec!(800));
    assert_eq!(balance(&conn, &b), dec!(700));
    assert_eq!(created.from_account_id(), a.id);
    assert_eq!(created.to_account_id(), b.id);
    assert_eq!(created.egreso.kind, TransactionType::Egreso);
    assert_eq!(created.ingreso.kind, TransactionType::Ingreso);
    for leg in created.legs() {
        assert!(leg.is_transfer);
        assert_eq!(leg.transfer_pair_id, Some(created.pair_id));
        assert_eq!(leg.category_id, None);
    }
    assert_eq!(created.egreso.target_account_id, Some(b.id));
    assert_eq!(created.ingreso.target_account_id, Some(a.id));

    assert_eq!(service.get_transfer(created.pair_id).unwrap(), created);
}

#[test]
fn update_transfer_corrects_both_legs_symmetrically() {
    let conn = open_db_in_memory().unwrap();
    let a = account(&conn, "A", "ARS", dec!(1000));
    let b = account(&conn, "B", "ARS", dec!(500));
    let service = TransferService::try_new(&conn).unwrap();
    let created = service.create_transfer(&transfer(&a, &b, dec!(200))).unwrap();

    let updated = service
        .update_transfer(
            created.pair_id,
            &TransferPatch {
                amount: Some(dec!(300)),
                notes: Some("adjusted".to_string()),
                ..TransferPatch::default()
            },
        )
        .unwrap();

    assert_eq!(balance(&conn, &a), dec!(700));
    assert_eq!(balance(&conn, &b), dec!(800));
    assert_eq!(updated.amount(), dec!(300));
    assert_eq!(updated.egreso.notes.as_deref(), Some("adjusted"));
    assert_eq!(updated.ingreso.notes.as_deref(), Some("adjusted"));
    assert_eq!(updated.egreso.id, created.egreso.id);
}

#[test]
fn delete_transfer_by_either_leg_removes_both() {
    let conn = open_db_in_memory().unwrap();
    let a = account(&conn, "A", "ARS", dec!(1000));
    let b = account(&conn, "B", "ARS", dec!(500));
    let service = TransferService::try_new(&conn).unwrap();
    let created = service.create_transfer(&transfer(&a, &b, dec!(200))).unwrap();

    service.delete_transfer_by_leg(created.ingreso.id).unwrap();

    assert_eq!(balance(&conn, &a), dec!(1000));
    assert_eq!(balance(&conn, &b), dec!(500));
    let err = service.get_transfer(created.pair_id).unwrap_err();
    assert!(matches!(err, LedgerError::TransferNotFound(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn same_account_transfer_is_rejected_without_writes() {
    let conn = open_db_in_memory().unwrap();
    let a = account(&conn, "A", "ARS", dec!(1000));
    let service = TransferService::try_new(&conn).unwrap();

    let err = service.create_transfer(&transfer(&a, &a, dec!(100))).unwrap_err();

    assert!(matches!(
        err,
        LedgerError::Validation(ValidationError::SameAccount(id)) if id == a.id
    ));
    assert_eq!(row_count(&conn), 0);
    assert_eq!(balance(&conn, &a), dec!(1000));
}

#[test]
fn cross_currency_transfer_is_rejected_without_writes() {
    let conn = open_db_in_memory().unwrap();
    let a = account(&conn, "A", "ARS", dec!(1000));
    let c = account(&conn, "C", "USD", dec!(10));
    let service = TransferService::try_new(&conn).unwrap();

    let err = service.create_transfer(&transfer(&a, &c, dec!(50))).unwrap_err();

    assert_eq!(err.code(), "currency_mismatch");
    assert_eq!(row_count(&conn), 0);
    assert_eq!(balance(&conn, &a), dec!(1000));
    assert_eq!(balance(&conn, &c), dec!(10));
}

#[test]
fn overdraft_is_allowed() {
    let conn = open_db_in_memory().unwrap();
    let a = account(&conn, "A", "ARS", dec!(50));
    let b = account(&conn, "B", "ARS", dec!(0));
    let service = TransferService::try_new(&conn).unwrap();

    service.create_transfer(&transfer(&a, &b, dec!(80))).unwrap();

    assert_eq!(balance(&conn, &a), dec!(-30));
    assert_eq!(balance(&conn, &b), dec!(80));
}

#[test]
fn transfer_to_inactive_account_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let a = account(&conn, "A", "ARS", dec!(100));
    let b = account(&conn, "B", "ARS", dec!(0));
    AccountService::try_new(&conn)
        .unwrap()
        .set_account_active(b.id, false)
        .unwrap();

    let err = TransferService::try_new(&conn)
        .unwrap()
        .create_transfer(&transfer(&a, &b, dec!(10)))
        .unwrap_err();

    assert!(matches!(err, LedgerError::AccountInactive(id) if id == b.id));
    assert_eq!(row_count(&conn), 0);
}

#[test]
fn ledger_refuses_to_touch_transfer_legs() {
    let conn = open_db_in_memory().unwrap();
    let a = account(&conn, "A", "ARS", dec!(1000));
    let b = account(&conn, "B", "ARS", dec!(500));
    let created = TransferService::try_new(&conn)
        .unwrap()
        .create_transfer(&transfer(&a, &b, dec!(200)))
        .unwrap();
    let ledger = LedgerService::try_new(&conn).unwrap();

    let err = ledger
        .update_transaction(
            created.egreso.id,
            &TransactionPatch {
                amount: Some(dec!(1)),
                ..TransactionPatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, LedgerError::CannotEditTransferLeg(_)));

    let err = ledger.delete_transaction(created.ingreso.id).unwrap_err();
    assert!(matches!(err, LedgerError::CannotDeleteTransferLeg(_)));
    assert_eq!(balance(&conn, &a), dec!(800));
}

#[test]
fn delete_by_standalone_leg_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let a = account(&conn, "A", "ARS", dec!(1000));
    let standalone = LedgerService::try_new(&conn)
        .unwrap()
        .create_transaction(&NewTransaction {
            account_id: a.id,
            category_id: Uuid::new_v4(),
            kind: TransactionType::Egreso,
            amount: dec!(10),
            concept: "coffee".to_string(),
            date: today(),
            notes: None,
        })
        .unwrap();

    let err = TransferService::try_new(&conn)
        .unwrap()
        .delete_transfer_by_leg(standalone.id)
        .unwrap_err();

    assert!(matches!(err, LedgerError::NotATransferLeg(id) if id == standalone.id));
    assert_eq!(balance(&conn, &a), dec!(990));
}

#[test]
fn broken_pair_is_reported_and_left_untouched() {
    let conn = open_db_in_memory().unwrap();
    let a = account(&conn, "A", "ARS", dec!(1000));
    let b = account(&conn, "B", "ARS", dec!(500));
    let service = TransferService::try_new(&conn).unwrap();
    let created = service.create_transfer(&transfer(&a, &b, dec!(200))).unwrap();

    conn.execute(
        "UPDATE transactions SET is_deleted = 1 WHERE tx_uuid = ?1;",
        [created.ingreso.id.to_string()],
    )
    .unwrap();

    let err = service.delete_transfer(created.pair_id).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::IncompleteTransferPair { legs_found: 1, .. }
    ));
    assert!(err.is_consistency_violation());
    assert_eq!(balance(&conn, &a), dec!(800));
    assert_eq!(balance(&conn, &b), dec!(700));

    conn.execute(
        "UPDATE transactions SET is_deleted = 0, amount = '250' WHERE tx_uuid = ?1;",
        [created.ingreso.id.to_string()],
    )
    .unwrap();
    let err = service.get_transfer(created.pair_id).unwrap_err();
    assert!(matches!(err, LedgerError::TransferPairMismatch { .. }));
    assert_eq!(err.kind(), ErrorKind::ConsistencyViolation);
}

#[test]
fn update_on_one_legged_pair_is_reported_without_writes() {
    let conn = open_db_in_memory().unwrap();
    let a = account(&conn, "A", "ARS", dec!(1000));
    let b = account(&conn, "B", "ARS", dec!(500));
    let service = TransferService::try_new(&conn).unwrap();
    let created = service.create_transfer(&transfer(&a, &b, dec!(200))).unwrap();

    conn.execute(
        "UPDATE transactions SET is_deleted = 1 WHERE tx_uuid = ?1;",
        [created.ingreso.id.to_string()],
    )
    .unwrap();

    let err = service
        .update_transfer(
            created.pair_id,
            &TransferPatch {
                amount: Some(dec!(350)),
                concept: Some("deposit".to_string()),
                ..TransferPatch::default()
            },
        )
        .unwrap_err();

    assert!(matches!(
        err,
        LedgerError::IncompleteTransferPair { legs_found: 1, .. }
    ));
    assert_eq!(err.kind(), ErrorKind::ConsistencyViolation);
    assert_eq!(balance(&conn, &a), dec!(800));
    assert_eq!(balance(&conn, &b), dec!(700));

    let survivor = LedgerService::try_new(&conn)
        .unwrap()
        .get_transaction(created.egreso.id)
        .unwrap()
        .unwrap();
    assert_eq!(survivor.amount, dec!(200));
    assert_eq!(survivor.concept, "rent");
}

#[test]
fn rejected_transfer_update_changes_neither_leg() {
    let conn = open_db_in_memory().unwrap();
    let a = account(&conn, "A", "ARS", dec!(1000));
    let b = account(&conn, "B", "ARS", dec!(500));
    let service = TransferService::try_new(&conn).unwrap();
    let created = service.create_transfer(&transfer(&a, &b, dec!(200))).unwrap();

    let err = service
        .update_transfer(
            created.pair_id,
            &TransferPatch {
                amount: Some(Decimal::ZERO),
                concept: Some("groceries".to_string()),
                ..TransferPatch::default()
            },
        )
        .unwrap_err();

    assert!(matches!(
        err,
        LedgerError::Validation(ValidationError::InvalidAmount(_))
    ));
    assert_eq!(balance(&conn, &a), dec!(800));
    assert_eq!(balance(&conn, &b), dec!(700));

    let stored = service.get_transfer(created.pair_id).unwrap();
    assert_eq!(stored, created);
    for leg in stored.legs() {
        assert_eq!(leg.concept, "rent");
        assert_eq!(leg.amount, dec!(200));
    }
}
