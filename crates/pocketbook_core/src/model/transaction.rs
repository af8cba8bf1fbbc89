//! Transaction and transfer domain model.
//!
//! # Responsibility
//! - Define single-leg movements (`ingreso`/`egreso`) against one account.
//! - Define the `Transfer` aggregate that always carries both legs.
//!
//! # Invariants
//! - `amount > 0`; the sign comes from `kind`.
//! - `transfer_pair_id` and `target_account_id` are set iff `is_transfer`.
//! - A transfer is exactly one `egreso` leg on the source account and one
//!   `ingreso` leg on the destination, sharing amount, date, concept, notes
//!   and `transfer_pair_id`.

use crate::model::account::AccountId;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable transaction identifier.
pub type TransactionId = Uuid;

/// Identifier shared by the two legs of one transfer.
pub type TransferPairId = Uuid;

/// Opaque category reference; categories are managed outside the ledger.
pub type CategoryId = Uuid;

/// Movement direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Credit: money entering the account.
    Ingreso,
    /// Debit: money leaving the account.
    Egreso,
}

impl TransactionType {
    /// Applies this direction's sign to a positive amount.
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            Self::Ingreso => amount,
            Self::Egreso => -amount,
        }
    }

    /// Stable lowercase label used in storage and at the FFI boundary.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ingreso => "ingreso",
            Self::Egreso => "egreso",
        }
    }

    /// Parses a stored or boundary label.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ingreso" => Some(Self::Ingreso),
            "egreso" => Some(Self::Egreso),
            _ => None,
        }
    }
}

/// One ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    /// `None` for transfer legs.
    pub category_id: Option<CategoryId>,
    /// Serialized as `type` to match the client contract.
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: Decimal,
    pub concept: String,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub is_transfer: bool,
    /// Counterpart account of a transfer leg.
    pub target_account_id: Option<AccountId>,
    pub transfer_pair_id: Option<TransferPairId>,
    pub is_deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Transaction {
    /// Balance effect of this row on its account.
    pub fn signed_amount(&self) -> Decimal {
        self.kind.signed(self.amount)
    }
}

/// Aggregate view of one transfer. Legs are never exposed for mutation
/// individually.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub pair_id: TransferPairId,
    /// Debit leg on the source account.
    pub egreso: Transaction,
    /// Credit leg on the destination account.
    pub ingreso: Transaction,
}

impl Transfer {
    pub fn from_account_id(&self) -> AccountId {
        self.egreso.account_id
    }

    pub fn to_account_id(&self) -> AccountId {
        self.ingreso.account_id
    }

    pub fn amount(&self) -> Decimal {
        self.egreso.amount
    }

    /// Both legs, debit first.
    pub fn legs(&self) -> [&Transaction; 2] {
        [&self.egreso, &self.ingreso]
    }
}
