//! Ledger service error taxonomy.
//!
//! # Responsibility
//! - Give every rejection a stable category and machine-readable code.
//! - Keep consistency violations distinguishable from user-facing errors.
//!
//! # Invariants
//! - `Validation`, `NotFound` and `StateConflict` errors are raised before
//!   any write; the open storage transaction is dropped (rolled back).
//! - `ConsistencyViolation` errors are never repaired automatically.

use crate::model::account::AccountId;
use crate::model::expense::{ExpenseInstanceId, RecurringExpenseId};
use crate::model::transaction::{TransactionId, TransferPairId};
use crate::model::validation::ValidationError;
use crate::repo::RepoError;
use log::{error, info, warn};
use rust_decimal::Decimal;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Coarse error category exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    StateConflict,
    /// Internal: stored state already breaks a ledger invariant.
    ConsistencyViolation,
    Storage,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::StateConflict => "state_conflict",
            Self::ConsistencyViolation => "consistency_violation",
            Self::Storage => "storage",
        }
    }
}

/// Errors from ledger, transfer, expense and stats services.
#[derive(Debug)]
pub enum LedgerError {
    Validation(ValidationError),
    AccountNotFound(AccountId),
    TransactionNotFound(TransactionId),
    TransferNotFound(TransferPairId),
    RecurringExpenseNotFound(RecurringExpenseId),
    ExpenseInstanceNotFound(ExpenseInstanceId),
    /// Account is archived and cannot receive new bookings.
    AccountInactive(AccountId),
    /// Recurring expense is paused and opens no new months.
    RecurringExpenseInactive(RecurringExpenseId),
    /// Transfer legs change only through the transfer coordinator.
    CannotEditTransferLeg(TransactionId),
    CannotDeleteTransferLeg(TransactionId),
    /// Payment transactions change only through their expense instance.
    CannotEditLinkedPayment {
        transaction_id: TransactionId,
        instance_id: ExpenseInstanceId,
    },
    CannotDeleteLinkedPayment {
        transaction_id: TransactionId,
        instance_id: ExpenseInstanceId,
    },
    /// Transfer operation addressed a standalone transaction.
    NotATransferLeg(TransactionId),
    AlreadyPaid(ExpenseInstanceId),
    NotPaid(ExpenseInstanceId),
    /// Stored pair does not have exactly two legs.
    IncompleteTransferPair {
        pair_id: TransferPairId,
        legs_found: usize,
    },
    /// Stored pair has two legs that disagree with each other.
    TransferPairMismatch {
        pair_id: TransferPairId,
        detail: &'static str,
    },
    /// Cached balance disagrees with the ledger rows.
    BalanceMismatch {
        account_id: AccountId,
        recorded: Decimal,
        expected: Decimal,
    },
    /// Paid instance whose linked transaction is missing or deleted.
    PaymentLinkBroken(ExpenseInstanceId),
    Repo(RepoError),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::AccountNotFound(_)
            | Self::TransactionNotFound(_)
            | Self::TransferNotFound(_)
            | Self::RecurringExpenseNotFound(_)
            | Self::ExpenseInstanceNotFound(_) => ErrorKind::NotFound,
            Self::AccountInactive(_)
            | Self::RecurringExpenseInactive(_)
            | Self::CannotEditTransferLeg(_)
            | Self::CannotDeleteTransferLeg(_)
            | Self::CannotEditLinkedPayment { .. }
            | Self::CannotDeleteLinkedPayment { .. }
            | Self::NotATransferLeg(_)
            | Self::AlreadyPaid(_)
            | Self::NotPaid(_) => ErrorKind::StateConflict,
            Self::IncompleteTransferPair { .. }
            | Self::TransferPairMismatch { .. }
            | Self::BalanceMismatch { .. }
            | Self::PaymentLinkBroken(_)
            | Self::Repo(RepoError::InvalidData(_)) => ErrorKind::ConsistencyViolation,
            Self::Repo(_) => ErrorKind::Storage,
        }
    }

    pub fn is_consistency_violation(&self) -> bool {
        self.kind() == ErrorKind::ConsistencyViolation
    }

    /// Stable snake_case code for logs and the FFI envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(err) => match err {
                ValidationError::InvalidAmount(_) => "invalid_amount",
                ValidationError::AmountOutOfRange => "amount_out_of_range",
                ValidationError::InvalidCurrency(_) => "invalid_currency",
                ValidationError::InvalidName => "invalid_name",
                ValidationError::InvalidMonth { .. } => "invalid_month",
                ValidationError::SameAccount(_) => "same_account",
                ValidationError::CurrencyMismatch { .. } => "currency_mismatch",
                ValidationError::InvalidInput { .. } => "invalid_input",
            },
            Self::AccountNotFound(_) => "account_not_found",
            Self::TransactionNotFound(_) => "transaction_not_found",
            Self::TransferNotFound(_) => "transfer_not_found",
            Self::RecurringExpenseNotFound(_) => "recurring_expense_not_found",
            Self::ExpenseInstanceNotFound(_) => "expense_instance_not_found",
            Self::AccountInactive(_) => "account_inactive",
            Self::RecurringExpenseInactive(_) => "recurring_expense_inactive",
            Self::CannotEditTransferLeg(_) => "cannot_edit_transfer_leg",
            Self::CannotDeleteTransferLeg(_) => "cannot_delete_transfer_leg",
            Self::CannotEditLinkedPayment { .. } => "cannot_edit_linked_payment",
            Self::CannotDeleteLinkedPayment { .. } => "cannot_delete_linked_payment",
            Self::NotATransferLeg(_) => "not_a_transfer_leg",
            Self::AlreadyPaid(_) => "already_paid",
            Self::NotPaid(_) => "not_paid",
            Self::IncompleteTransferPair { .. } => "incomplete_transfer_pair",
            Self::TransferPairMismatch { .. } => "transfer_pair_mismatch",
            Self::BalanceMismatch { .. } => "balance_mismatch",
            Self::PaymentLinkBroken(_) => "payment_link_broken",
            Self::Repo(RepoError::InvalidData(_)) => "invalid_persisted_data",
            Self::Repo(_) => "storage_failure",
        }
    }
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::AccountNotFound(id) => write!(f, "account not found: {id}"),
            Self::TransactionNotFound(id) => write!(f, "transaction not found: {id}"),
            Self::TransferNotFound(id) => write!(f, "transfer not found: {id}"),
            Self::RecurringExpenseNotFound(id) => write!(f, "recurring expense not found: {id}"),
            Self::ExpenseInstanceNotFound(id) => {
                write!(f, "monthly expense instance not found: {id}")
            }
            Self::AccountInactive(id) => write!(f, "account is inactive: {id}"),
            Self::RecurringExpenseInactive(id) => {
                write!(f, "recurring expense is inactive: {id}")
            }
            Self::CannotEditTransferLeg(id) => write!(
                f,
                "transaction {id} is a transfer leg; update it through its transfer"
            ),
            Self::CannotDeleteTransferLeg(id) => write!(
                f,
                "transaction {id} is a transfer leg; delete it through its transfer"
            ),
            Self::CannotEditLinkedPayment {
                transaction_id,
                instance_id,
            } => write!(
                f,
                "transaction {transaction_id} pays expense instance {instance_id}; update the instance instead"
            ),
            Self::CannotDeleteLinkedPayment {
                transaction_id,
                instance_id,
            } => write!(
                f,
                "transaction {transaction_id} pays expense instance {instance_id}; undo the payment instead"
            ),
            Self::NotATransferLeg(id) => write!(f, "transaction is not a transfer leg: {id}"),
            Self::AlreadyPaid(id) => write!(f, "monthly expense instance already paid: {id}"),
            Self::NotPaid(id) => write!(f, "monthly expense instance is not paid: {id}"),
            Self::IncompleteTransferPair {
                pair_id,
                legs_found,
            } => write!(
                f,
                "transfer pair {pair_id} has {legs_found} active leg(s), expected 2"
            ),
            Self::TransferPairMismatch { pair_id, detail } => {
                write!(f, "transfer pair {pair_id} is inconsistent: {detail}")
            }
            Self::BalanceMismatch {
                account_id,
                recorded,
                expected,
            } => write!(
                f,
                "account {account_id} balance {recorded} does not match ledger total {expected}"
            ),
            Self::PaymentLinkBroken(id) => write!(
                f,
                "paid expense instance {id} has no active linked transaction"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LedgerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for LedgerError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for LedgerError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

/// Emits one metadata-only completion event for a service call.
///
/// Expected rejections log at `warn`; consistency and storage failures at
/// `error`.
pub(crate) fn log_outcome<T>(
    event: &str,
    module: &str,
    started_at: Instant,
    result: &LedgerResult<T>,
) {
    let duration_ms = started_at.elapsed().as_millis();
    match result {
        Ok(_) => info!("event={event} module={module} status=ok duration_ms={duration_ms}"),
        Err(err) => match err.kind() {
            ErrorKind::ConsistencyViolation | ErrorKind::Storage => error!(
                "event={} module={} status=error duration_ms={} error_kind={} error_code={} error={}",
                event,
                module,
                duration_ms,
                err.kind().as_str(),
                err.code(),
                err
            ),
            _ => warn!(
                "event={} module={} status=rejected duration_ms={} error_kind={} error_code={}",
                event,
                module,
                duration_ms,
                err.kind().as_str(),
                err.code()
            ),
        },
    }
}
