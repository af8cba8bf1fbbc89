//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose ledger, transfer, expense and stats operations to Dart via FRB.
//! - Parse boundary strings into typed requests before touching storage.
//!
//! # Invariants
//! - Exported functions never panic across the FFI boundary.
//! - Every ledger call answers with a `LedgerResponse`; payloads are
//!   camelCase JSON.
//! - Ids, amounts and dates travel as strings; malformed input is a
//!   `validation` error.

use pocketbook_core::model::validation::{parse_amount, parse_date};
use pocketbook_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, open_db,
    ping as ping_inner, AccountService, ExpenseService, LedgerError, LedgerResult, LedgerService,
    NewTransaction, NewTransfer, PaymentPatch, PaymentRequest, RepoError, StatsService,
    TransactionPatch, TransactionType, TransferPatch, TransferService, ValidationError,
};
use log::{info, warn};
use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::OnceLock;
use uuid::Uuid;

const DB_FILE_NAME: &str = "pocketbook_ledger.sqlite3";
const DB_PATH_ENV: &str = "POCKETBOOK_DB_PATH";
static DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Idempotent for the same `level + log_dir`; reconfiguration is rejected.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Pins the ledger database file for this process.
///
/// Must run before the first ledger call; afterwards only the same path is
/// accepted. Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn configure_db_path(db_path: String) -> String {
    let trimmed = db_path.trim();
    if trimmed.is_empty() {
        return "db_path cannot be empty".to_string();
    }
    let requested = PathBuf::from(trimmed);
    let active = DB_PATH.get_or_init(|| requested.clone());
    if *active == requested {
        info!("event=db_path_configure module=ffi status=ok");
        String::new()
    } else {
        warn!("event=db_path_configure module=ffi status=rejected error_code=already_configured");
        format!(
            "database already configured at `{}`; refusing to switch to `{}`",
            active.display(),
            requested.display()
        )
    }
}

/// Response envelope shared by every ledger call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// `validation|not_found|state_conflict|consistency_violation|storage`.
    pub error_kind: Option<String>,
    /// Stable snake_case code, e.g. `already_paid`.
    pub error_code: Option<String>,
    /// Human-readable message for diagnostics/UI.
    pub message: String,
    /// Result serialized as camelCase JSON; `None` for void operations.
    pub payload_json: Option<String>,
}

impl LedgerResponse {
    fn failure(err: &LedgerError) -> Self {
        Self {
            ok: false,
            error_kind: Some(err.kind().as_str().to_string()),
            error_code: Some(err.code().to_string()),
            message: err.to_string(),
            payload_json: None,
        }
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn account_create(name: String, currency: String, initial_balance: String) -> LedgerResponse {
    respond("Account created.", || {
        let initial_balance = parse_amount(&initial_balance)?;
        with_ledger_db(|conn| {
            AccountService::try_new(conn)?.create_account(&name, &currency, initial_balance)
        })
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn account_list(include_inactive: bool) -> LedgerResponse {
    respond("Accounts listed.", || {
        with_ledger_db(|conn| AccountService::try_new(conn)?.list_accounts(include_inactive))
    })
}

/// Books one standalone `ingreso` or `egreso`.
///
/// `kind` is `ingreso|egreso`; `date` is `YYYY-MM-DD`.
#[flutter_rust_bridge::frb(sync)]
pub fn ledger_create_transaction(
    account_id: String,
    category_id: String,
    kind: String,
    amount: String,
    concept: String,
    date: String,
    notes: Option<String>,
) -> LedgerResponse {
    respond("Transaction created.", || {
        let request = NewTransaction {
            account_id: parse_id("account_id", &account_id)?,
            category_id: parse_id("category_id", &category_id)?,
            kind: parse_kind(&kind)?,
            amount: parse_amount(&amount)?,
            concept,
            date: parse_date(&date)?,
            notes,
        };
        with_ledger_db(|conn| LedgerService::try_new(conn)?.create_transaction(&request))
    })
}

/// Updates a standalone movement; `None` keeps the stored value.
#[flutter_rust_bridge::frb(sync)]
pub fn ledger_update_transaction(
    transaction_id: String,
    amount: Option<String>,
    category_id: Option<String>,
    concept: Option<String>,
    date: Option<String>,
    notes: Option<String>,
) -> LedgerResponse {
    respond("Transaction updated.", || {
        let id = parse_id("transaction_id", &transaction_id)?;
        let patch = TransactionPatch {
            amount: parse_optional(amount.as_deref(), parse_amount)?,
            category_id: parse_optional(category_id.as_deref(), |raw| {
                parse_id("category_id", raw)
            })?,
            concept,
            date: parse_optional(date.as_deref(), parse_date)?,
            notes,
        };
        with_ledger_db(|conn| LedgerService::try_new(conn)?.update_transaction(id, &patch))
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn ledger_delete_transaction(transaction_id: String) -> LedgerResponse {
    respond_void("Transaction deleted.", || {
        let id = parse_id("transaction_id", &transaction_id)?;
        with_ledger_db(|conn| LedgerService::try_new(conn)?.delete_transaction(id))
    })
}

/// Moves money between two accounts of the same currency.
#[flutter_rust_bridge::frb(sync)]
pub fn ledger_create_transfer(
    from_account_id: String,
    to_account_id: String,
    amount: String,
    concept: String,
    date: String,
    notes: Option<String>,
) -> LedgerResponse {
    respond("Transfer created.", || {
        let request = NewTransfer {
            from_account_id: parse_id("from_account_id", &from_account_id)?,
            to_account_id: parse_id("to_account_id", &to_account_id)?,
            amount: parse_amount(&amount)?,
            concept,
            date: parse_date(&date)?,
            notes,
        };
        with_ledger_db(|conn| TransferService::try_new(conn)?.create_transfer(&request))
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn ledger_update_transfer(
    pair_id: String,
    amount: Option<String>,
    concept: Option<String>,
    date: Option<String>,
    notes: Option<String>,
) -> LedgerResponse {
    respond("Transfer updated.", || {
        let pair_id = parse_id("pair_id", &pair_id)?;
        let patch = TransferPatch {
            amount: parse_optional(amount.as_deref(), parse_amount)?,
            concept,
            date: parse_optional(date.as_deref(), parse_date)?,
            notes,
        };
        with_ledger_db(|conn| TransferService::try_new(conn)?.update_transfer(pair_id, &patch))
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn ledger_delete_transfer(pair_id: String) -> LedgerResponse {
    respond_void("Transfer deleted.", || {
        let pair_id = parse_id("pair_id", &pair_id)?;
        with_ledger_db(|conn| TransferService::try_new(conn)?.delete_transfer(pair_id))
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn expense_create_recurring(
    name: String,
    category_id: Option<String>,
    default_amount: Option<String>,
) -> LedgerResponse {
    respond("Recurring expense created.", || {
        let category_id =
            parse_optional(category_id.as_deref(), |raw| parse_id("category_id", raw))?;
        let default_amount = parse_optional(default_amount.as_deref(), parse_amount)?;
        with_ledger_db(|conn| {
            ExpenseService::try_new(conn)?.create_recurring_expense(
                &name,
                category_id,
                default_amount,
            )
        })
    })
}

/// Pauses (`active = false`) or resumes a recurring expense.
#[flutter_rust_bridge::frb(sync)]
pub fn expense_set_recurring_active(expense_id: String, active: bool) -> LedgerResponse {
    respond("Recurring expense updated.", || {
        let expense_id = parse_id("expense_id", &expense_id)?;
        with_ledger_db(|conn| {
            ExpenseService::try_new(conn)?.set_recurring_active(expense_id, active)
        })
    })
}

/// Opens (or returns) the instance of a recurring expense for one month.
#[flutter_rust_bridge::frb(sync)]
pub fn expense_open_month(expense_id: String, year: i32, month: u32) -> LedgerResponse {
    respond("Month opened.", || {
        let expense_id = parse_id("expense_id", &expense_id)?;
        with_ledger_db(|conn| ExpenseService::try_new(conn)?.open_month(expense_id, year, month))
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn expense_list_month(year: i32, month: u32) -> LedgerResponse {
    respond("Month listed.", || {
        with_ledger_db(|conn| ExpenseService::try_new(conn)?.list_month(year, month))
    })
}

/// Pays a pending instance; `paid_date` defaults to today.
#[flutter_rust_bridge::frb(sync)]
pub fn expense_pay(
    instance_id: String,
    amount: String,
    account_id: String,
    paid_date: Option<String>,
    notes: Option<String>,
) -> LedgerResponse {
    respond("Expense paid.", || {
        let instance_id = parse_id("instance_id", &instance_id)?;
        let request = PaymentRequest {
            amount: parse_amount(&amount)?,
            account_id: parse_id("account_id", &account_id)?,
            paid_date: parse_optional(paid_date.as_deref(), parse_date)?,
            notes,
        };
        with_ledger_db(|conn| ExpenseService::try_new(conn)?.pay(instance_id, &request))
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn expense_update(
    instance_id: String,
    amount: Option<String>,
    account_id: Option<String>,
    paid_date: Option<String>,
    notes: Option<String>,
) -> LedgerResponse {
    respond("Expense payment updated.", || {
        let instance_id = parse_id("instance_id", &instance_id)?;
        let patch = PaymentPatch {
            amount: parse_optional(amount.as_deref(), parse_amount)?,
            account_id: parse_optional(account_id.as_deref(), |raw| {
                parse_id("account_id", raw)
            })?,
            paid_date: parse_optional(paid_date.as_deref(), parse_date)?,
            notes,
        };
        with_ledger_db(|conn| ExpenseService::try_new(conn)?.update(instance_id, &patch))
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn expense_undo_payment(instance_id: String) -> LedgerResponse {
    respond("Expense payment undone.", || {
        let instance_id = parse_id("instance_id", &instance_id)?;
        with_ledger_db(|conn| ExpenseService::try_new(conn)?.undo_payment(instance_id))
    })
}

/// Per-currency totals of one month.
#[flutter_rust_bridge::frb(sync)]
pub fn stats_monthly_summary(year: i32, month: u32) -> LedgerResponse {
    respond("Summary computed.", || {
        with_ledger_db(|conn| StatsService::try_new(conn)?.monthly_summary(year, month))
    })
}

fn respond<T: Serialize>(message: &str, op: impl FnOnce() -> LedgerResult<T>) -> LedgerResponse {
    let value = match op() {
        Ok(value) => value,
        Err(err) => return LedgerResponse::failure(&err),
    };
    match serde_json::to_string(&value) {
        Ok(json) => LedgerResponse {
            ok: true,
            error_kind: None,
            error_code: None,
            message: message.to_string(),
            payload_json: Some(json),
        },
        Err(err) => LedgerResponse {
            ok: false,
            error_kind: Some("storage".to_string()),
            error_code: Some("payload_encoding_failed".to_string()),
            message: format!("failed to encode payload: {err}"),
            payload_json: None,
        },
    }
}

fn respond_void(message: &str, op: impl FnOnce() -> LedgerResult<()>) -> LedgerResponse {
    match op() {
        Ok(()) => LedgerResponse {
            ok: true,
            error_kind: None,
            error_code: None,
            message: message.to_string(),
            payload_json: None,
        },
        Err(err) => LedgerResponse::failure(&err),
    }
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DB_FILE_NAME)
        })
        .clone()
}

/// Opens a fresh connection per call; SQLite serializes the writers.
fn with_ledger_db<T>(op: impl FnOnce(&Connection) -> LedgerResult<T>) -> LedgerResult<T> {
    let conn = open_db(resolve_db_path()).map_err(RepoError::from)?;
    op(&conn)
}

fn parse_id(field: &'static str, raw: &str) -> Result<Uuid, ValidationError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ValidationError::InvalidInput {
        field,
        value: raw.to_string(),
    })
}

fn parse_kind(raw: &str) -> Result<TransactionType, ValidationError> {
    TransactionType::parse(raw.trim()).ok_or_else(|| ValidationError::InvalidInput {
        field: "kind",
        value: raw.to_string(),
    })
}

fn parse_optional<T>(
    raw: Option<&str>,
    parse: impl FnOnce(&str) -> Result<T, ValidationError>,
) -> Result<Option<T>, ValidationError> {
    raw.map(parse).transpose()
}
