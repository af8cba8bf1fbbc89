//! Ledger use-case services.
//!
//! # Responsibility
//! - Turn account, ledger, transfer and expense requests into atomic
//!   storage transactions.
//! - Keep FFI and CLI layers free of SQL and balance arithmetic.
//!
//! Every mutating call commits fully or leaves no trace.

pub mod account_service;
pub(crate) mod booking;
pub mod error;
pub mod expense_service;
pub mod ledger_service;
pub mod stats_service;
pub mod transfer_service;
