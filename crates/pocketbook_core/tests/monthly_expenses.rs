use chrono::NaiveDate;
use pocketbook_core::db::open_db_in_memory;
use pocketbook_core::{
    Account, AccountService, ErrorKind, ExpenseService, ExpenseStatus, LedgerError,
    LedgerService, MonthlyExpenseInstance, PaymentPatch, PaymentRequest, TransactionPatch,
    TransactionType,
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).unwrap()
}

fn account(conn: &Connection, name: &str, initial: Decimal) -> Account {
    AccountService::try_new(conn)
        .unwrap()
        .create_account(name, "ARS", initial)
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

fn payment(account: &Account, amount: Decimal, paid_date: NaiveDate) -> PaymentRequest {
    PaymentRequest {
        amount,
        account_id: account.id,
        paid_date: Some(paid_date),
        notes: None,
    }
}

/// Opens April and May for one recurring bill, with April paid at 150.
fn may_with_previous_amount(
    conn: &Connection,
    account: &Account,
) -> (Uuid, MonthlyExpenseInstance) {
    let service = ExpenseService::try_new(conn).unwrap();
    let category = Uuid::new_v4();
    let expense = service
        .create_recurring_expense("Electricity", Some(category), None)
        .unwrap();
    let april = service.open_month(expense.id, 2024, 4).unwrap();
    service
        .pay(april.id, &payment(account, dec!(150), date(4, 10)))
        .unwrap();
    let may = service.open_month(expense.id, 2024, 5).unwrap();
    (category, may)
}

#[test]
fn open_month_is_idempotent_and_reports_previous_amount() {
    let conn = open_db_in_memory().unwrap();
    let a = account(&conn, "A", dec!(1000));
    let (_, may) = may_with_previous_amount(&conn, &a);
    let service = ExpenseService::try_new(&conn).unwrap();

    assert_eq!(may.status, ExpenseStatus::Pendiente);
    assert_eq!(may.previous_amount, Some(dec!(150)));
    assert_eq!(
        service
            .open_month(may.recurring_expense_id, 2024, 5)
            .unwrap(),
        may
    );
    assert_eq!(service.list_month(2024, 5).unwrap(), vec![may]);
}

#[test]
fn january_reads_previous_amount_from_december() {
    let conn = open_db_in_memory().unwrap();
    let a = account(&conn, "A", dec!(1000));
    let service = ExpenseService::try_new(&conn).unwrap();
    let expense = service
        .create_recurring_expense("Rent", None, Some(dec!(500)))
        .unwrap();

    let december = service.open_month(expense.id, 2023, 12).unwrap();
    service
        .pay(
            december.id,
            &payment(&a, dec!(480), NaiveDate::from_ymd_opt(2023, 12, 5).unwrap()),
        )
        .unwrap();
    let january = service.open_month(expense.id, 2024, 1).unwrap();

    assert_eq!(january.previous_amount, Some(dec!(480)));
}

#[test]
fn previous_amount_follows_later_changes_to_prior_month() {
    let conn = open_db_in_memory().unwrap();
    let a = account(&conn, "A", dec!(1000));
    let service = ExpenseService::try_new(&conn).unwrap();
    let expense = service
        .create_recurring_expense("Water", None, None)
        .unwrap();

    let january = service.open_month(expense.id, 2024, 1).unwrap();
    let february = service.open_month(expense.id, 2024, 2).unwrap();
    assert_eq!(february.previous_amount, None);

    service
        .pay(january.id, &payment(&a, dec!(150), date(1, 20)))
        .unwrap();
    assert_eq!(
        service.get_instance(february.id).unwrap().previous_amount,
        Some(dec!(150))
    );

    service
        .update(
            january.id,
            &PaymentPatch {
                amount: Some(dec!(170)),
                ..PaymentPatch::default()
            },
        )
        .unwrap();
    assert_eq!(
        service.list_month(2024, 2).unwrap()[0].previous_amount,
        Some(dec!(170))
    );

    service.undo_payment(january.id).unwrap();
    assert_eq!(
        service
            .open_month(expense.id, 2024, 2)
            .unwrap()
            .previous_amount,
        None
    );
}

#[test]
fn open_month_validates_month_and_expense() {
    let conn = open_db_in_memory().unwrap();
    let service = ExpenseService::try_new(&conn).unwrap();
    let expense = service
        .create_recurring_expense("Gym", None, None)
        .unwrap();

    let err = service.open_month(expense.id, 2024, 0).unwrap_err();
    assert_eq!(err.code(), "invalid_month");
    let err = service.open_month(Uuid::new_v4(), 2024, 5).unwrap_err();
    assert!(matches!(err, LedgerError::RecurringExpenseNotFound(_)));
}

#[test]
fn pay_books_linked_egreso_and_undo_restores_balance() {
    let conn = open_db_in_memory().unwrap();
    let a = account(&conn, "A", dec!(1000));
    let (category, may) = may_with_previous_amount(&conn, &a);
    let before_pay = balance(&conn, &a);
    let service = ExpenseService::try_new(&conn).unwrap();

    let paid = service
        .pay(may.id, &payment(&a, dec!(160), date(5, 8)))
        .unwrap();

    assert_eq!(paid.status, ExpenseStatus::Pagado);
    assert_eq!(paid.amount, Some(dec!(160)));
    assert_eq!(paid.account_id, Some(a.id));
    assert_eq!(paid.paid_date, Some(date(5, 8)));
    assert_eq!(balance(&conn, &a), before_pay - dec!(160));

    let (_, linked) = service.get_payment(may.id).unwrap();
    let linked = linked.unwrap();
    assert_eq!(Some(linked.id), paid.linked_transaction_id);
    assert_eq!(linked.kind, TransactionType::Egreso);
    assert_eq!(linked.concept, "Electricity");
    assert_eq!(linked.category_id, Some(category));

    let undone = service.undo_payment(may.id).unwrap();

    assert_eq!(undone.status, ExpenseStatus::Pendiente);
    assert_eq!(undone.amount, None);
    assert_eq!(undone.account_id, None);
    assert_eq!(undone.paid_date, None);
    assert_eq!(undone.linked_transaction_id, None);
    assert_eq!(undone.previous_amount, Some(dec!(150)));
    assert_eq!(balance(&conn, &a), before_pay);
    assert!(LedgerService::try_new(&conn)
        .unwrap()
        .get_transaction(linked.id)
        .unwrap()
        .is_none());
}

#[test]
fn pay_twice_and_undo_pending_are_state_conflicts() {
    let conn = open_db_in_memory().unwrap();
    let a = account(&conn, "A", dec!(1000));
    let (_, may) = may_with_previous_amount(&conn, &a);
    let service = ExpenseService::try_new(&conn).unwrap();

    let err = service.undo_payment(may.id).unwrap_err();
    assert!(matches!(err, LedgerError::NotPaid(id) if id == may.id));
    let err = service
        .update(
            may.id,
            &PaymentPatch {
                amount: Some(dec!(1)),
                ..PaymentPatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotPaid(_)));

    service
        .pay(may.id, &payment(&a, dec!(160), date(5, 8)))
        .unwrap();
    let after_first_pay = balance(&conn, &a);
    let err = service
        .pay(may.id, &payment(&a, dec!(160), date(5, 8)))
        .unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyPaid(_)));
    assert_eq!(err.kind(), ErrorKind::StateConflict);
    assert_eq!(balance(&conn, &a), after_first_pay);
}

#[test]
fn rejected_payment_leaves_instance_pending() {
    let conn = open_db_in_memory().unwrap();
    let a = account(&conn, "A", dec!(1000));
    let (_, may) = may_with_previous_amount(&conn, &a);
    let service = ExpenseService::try_new(&conn).unwrap();
    let before = balance(&conn, &a);

    let err = service
        .pay(may.id, &payment(&a, dec!(-1), date(5, 8)))
        .unwrap_err();
    assert_eq!(err.code(), "invalid_amount");

    let mut ghost = payment(&a, dec!(10), date(5, 8));
    ghost.account_id = Uuid::new_v4();
    let err = service.pay(may.id, &ghost).unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(_)));

    assert_eq!(service.get_instance(may.id).unwrap(), may);
    assert_eq!(balance(&conn, &a), before);
}

#[test]
fn update_moves_payment_between_accounts() {
    let conn = open_db_in_memory().unwrap();
    let a = account(&conn, "A", dec!(1000));
    let b = account(&conn, "B", dec!(300));
    let (_, may) = may_with_previous_amount(&conn, &a);
    let service = ExpenseService::try_new(&conn).unwrap();
    service
        .pay(may.id, &payment(&a, dec!(160), date(5, 8)))
        .unwrap();
    let a_after_pay = balance(&conn, &a);

    let updated = service
        .update(
            may.id,
            &PaymentPatch {
                amount: Some(dec!(175)),
                account_id: Some(b.id),
                paid_date: Some(date(5, 9)),
                notes: Some("late fee".to_string()),
            },
        )
        .unwrap();

    assert_eq!(updated.amount, Some(dec!(175)));
    assert_eq!(updated.account_id, Some(b.id));
    assert_eq!(updated.paid_date, Some(date(5, 9)));
    assert_eq!(updated.notes.as_deref(), Some("late fee"));
    assert_eq!(balance(&conn, &a), a_after_pay + dec!(160));
    assert_eq!(balance(&conn, &b), dec!(125));

    let (_, linked) = service.get_payment(may.id).unwrap();
    let linked = linked.unwrap();
    assert_eq!(linked.account_id, b.id);
    assert_eq!(linked.amount, dec!(175));
    assert_eq!(linked.date, date(5, 9));
}

#[test]
fn linked_payment_is_not_editable_through_ledger() {
    let conn = open_db_in_memory().unwrap();
    let a = account(&conn, "A", dec!(1000));
    let (_, may) = may_with_previous_amount(&conn, &a);
    let paid = ExpenseService::try_new(&conn)
        .unwrap()
        .pay(may.id, &payment(&a, dec!(160), date(5, 8)))
        .unwrap();
    let linked_id = paid.linked_transaction_id.unwrap();
    let ledger = LedgerService::try_new(&conn).unwrap();

    let err = ledger
        .update_transaction(
            linked_id,
            &TransactionPatch {
                amount: Some(dec!(1)),
                ..TransactionPatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::CannotEditLinkedPayment { instance_id, .. } if instance_id == may.id
    ));

    let err = ledger.delete_transaction(linked_id).unwrap_err();
    assert!(matches!(err, LedgerError::CannotDeleteLinkedPayment { .. }));
}

#[test]
fn missing_linked_transaction_is_a_consistency_violation() {
    let conn = open_db_in_memory().unwrap();
    let a = account(&conn, "A", dec!(1000));
    let (_, may) = may_with_previous_amount(&conn, &a);
    let service = ExpenseService::try_new(&conn).unwrap();
    let paid = service
        .pay(may.id, &payment(&a, dec!(160), date(5, 8)))
        .unwrap();
    conn.execute(
        "UPDATE transactions SET is_deleted = 1 WHERE tx_uuid = ?1;",
        [paid.linked_transaction_id.unwrap().to_string()],
    )
    .unwrap();

    let err = service.undo_payment(may.id).unwrap_err();

    assert!(matches!(err, LedgerError::PaymentLinkBroken(id) if id == may.id));
    assert!(err.is_consistency_violation());
    assert!(service.get_instance(may.id).unwrap().is_paid());
}

#[test]
fn pay_keeps_instance_notes_when_request_has_none() {
    let conn = open_db_in_memory().unwrap();
    let a = account(&conn, "A", dec!(1000));
    let (_, may) = may_with_previous_amount(&conn, &a);
    let service = ExpenseService::try_new(&conn).unwrap();
    service
        .pay(
            may.id,
            &PaymentRequest {
                notes: Some("autopay".to_string()),
                ..payment(&a, dec!(160), date(5, 8))
            },
        )
        .unwrap();
    service.undo_payment(may.id).unwrap();

    let repaid = service
        .pay(may.id, &payment(&a, dec!(165), date(5, 12)))
        .unwrap();

    assert_eq!(repaid.notes.as_deref(), Some("autopay"));
}

#[test]
fn paused_expense_keeps_opened_months_but_opens_no_new_ones() {
    let conn = open_db_in_memory().unwrap();
    let a = account(&conn, "A", dec!(1000));
    let service = ExpenseService::try_new(&conn).unwrap();
    let expense = service
        .create_recurring_expense("Streaming", None, Some(dec!(12)))
        .unwrap();
    let march = service.open_month(expense.id, 2024, 3).unwrap();

    let paused = service.set_recurring_active(expense.id, false).unwrap();
    assert!(!paused.is_active);

    let err = service.open_month(expense.id, 2024, 4).unwrap_err();
    assert!(matches!(err, LedgerError::RecurringExpenseInactive(id) if id == expense.id));
    assert_eq!(err.kind(), ErrorKind::StateConflict);
    assert!(service.list_month(2024, 4).unwrap().is_empty());

    assert_eq!(service.open_month(expense.id, 2024, 3).unwrap(), march);
    service
        .pay(march.id, &payment(&a, dec!(12), date(3, 2)))
        .unwrap();
    assert_eq!(balance(&conn, &a), dec!(988));

    assert!(service.set_recurring_active(expense.id, true).unwrap().is_active);
    let april = service.open_month(expense.id, 2024, 4).unwrap();
    assert_eq!(april.previous_amount, Some(dec!(12)));

    let err = service
        .set_recurring_active(Uuid::new_v4(), false)
        .unwrap_err();
    assert!(matches!(err, LedgerError::RecurringExpenseNotFound(_)));
}
