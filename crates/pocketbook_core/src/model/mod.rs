//! Ledger domain model.
//!
//! # Responsibility
//! - Define canonical records for accounts, transactions, transfers and
//!   monthly expense instances.
//! - Keep amount/currency validation next to the types it protects.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Amounts are exact decimals; floating point never enters the model.
//! - Transaction deletion is a tombstone (`is_deleted`), never a hard delete.

pub mod account;
pub mod expense;
pub mod transaction;
pub mod validation;
