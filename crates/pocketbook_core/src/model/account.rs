//! Account domain model.
//!
//! # Invariants
//! - `current_balance = initial_balance + Σ signed deltas` of every
//!   non-deleted transaction booked to the account.
//! - `currency` is an uppercase ISO 4217 alpha code.
//! - Inactive accounts keep their history but reject new bookings.

use crate::model::validation::{normalize_currency, normalize_name, ValidationError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable account identifier.
pub type AccountId = Uuid;

/// One money container owned by the user (cash, bank, card).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub currency: String,
    pub initial_balance: Decimal,
    /// Cached running balance, written only by ledger services.
    pub current_balance: Decimal,
    pub is_active: bool,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Account {
    /// Creates a new active account whose balance equals its opening balance.
    ///
    /// Negative opening balances are accepted (credit lines, debts).
    pub fn new(
        name: &str,
        currency: &str,
        initial_balance: Decimal,
        now_ms: i64,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            id: Uuid::new_v4(),
            name: normalize_name(name)?,
            currency: normalize_currency(currency)?,
            initial_balance,
            current_balance: initial_balance,
            is_active: true,
            created_at: now_ms,
            updated_at: now_ms,
        })
    }
}
