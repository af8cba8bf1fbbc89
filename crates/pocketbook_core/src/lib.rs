//! Core ledger engine for Pocketbook.
//! Accounts, movements, transfers and monthly expense payments live here;
//! this crate owns every balance invariant.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::account::{Account, AccountId};
pub use model::expense::{
    ExpenseInstanceId, ExpenseStatus, MonthlyExpenseInstance, RecurringExpense,
    RecurringExpenseId,
};
pub use model::transaction::{
    CategoryId, Transaction, TransactionId, TransactionType, Transfer, TransferPairId,
};
pub use model::validation::ValidationError;
pub use repo::transaction_repo::TransactionListQuery;
pub use repo::{RepoError, RepoResult};
pub use service::account_service::{AccountService, BalanceAudit};
pub use service::error::{ErrorKind, LedgerError, LedgerResult};
pub use service::expense_service::{ExpenseService, PaymentPatch, PaymentRequest};
pub use service::ledger_service::{LedgerService, NewTransaction, TransactionPatch};
pub use service::stats_service::{CategoryTotal, MonthlySummary, PendingExpenses, StatsService};
pub use service::transfer_service::{NewTransfer, TransferPatch, TransferService};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
