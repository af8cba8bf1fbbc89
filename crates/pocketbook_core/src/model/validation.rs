//! Input validation shared by the ledger model.
//!
//! # Invariants
//! - Validation never touches storage; callers run it before any write.

use crate::model::account::AccountId;
use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Rejections raised before any mutation is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Amount is zero or negative.
    InvalidAmount(Decimal),
    /// Arithmetic on the amount would leave the supported decimal range.
    AmountOutOfRange,
    /// Currency is not a three-letter ISO 4217 alpha code.
    InvalidCurrency(String),
    /// Name is blank after trim.
    InvalidName,
    /// Year/month pair does not name a calendar month.
    InvalidMonth { year: i32, month: u32 },
    /// Transfer source and destination are the same account.
    SameAccount(AccountId),
    /// Transfer accounts hold different currencies.
    CurrencyMismatch { from: String, to: String },
    /// Boundary input could not be parsed.
    InvalidInput { field: &'static str, value: String },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAmount(amount) => {
                write!(f, "amount must be greater than zero, got {amount}")
            }
            Self::AmountOutOfRange => write!(f, "amount is outside the supported range"),
            Self::InvalidCurrency(code) => {
                write!(f, "currency must be a 3-letter ISO code, got `{code}`")
            }
            Self::InvalidName => write!(f, "name must not be blank"),
            Self::InvalidMonth { year, month } => {
                write!(f, "invalid calendar month {year}-{month:02}")
            }
            Self::SameAccount(id) => {
                write!(f, "transfer source and destination are the same account: {id}")
            }
            Self::CurrencyMismatch { from, to } => {
                write!(f, "transfer currency mismatch: {from} -> {to}")
            }
            Self::InvalidInput { field, value } => write!(f, "invalid {field}: `{value}`"),
        }
    }
}

impl Error for ValidationError {}

/// Returns `amount` when it is strictly positive.
pub fn ensure_positive(amount: Decimal) -> Result<Decimal, ValidationError> {
    if amount > Decimal::ZERO {
        Ok(amount)
    } else {
        Err(ValidationError::InvalidAmount(amount))
    }
}

/// Normalizes an ISO 4217 alpha code to uppercase.
pub fn normalize_currency(code: &str) -> Result<String, ValidationError> {
    let trimmed = code.trim();
    if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(trimmed.to_ascii_uppercase())
    } else {
        Err(ValidationError::InvalidCurrency(trimmed.to_string()))
    }
}

/// Trims a display name and rejects blank values.
pub fn normalize_name(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidName);
    }
    Ok(trimmed.to_string())
}

/// Trims free-form notes; blank notes are stored as `None`.
pub fn normalize_notes(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_string)
}

/// Returns the first day of the given calendar month.
pub fn month_start(year: i32, month: u32) -> Result<NaiveDate, ValidationError> {
    NaiveDate::from_ymd_opt(year, month, 1).ok_or(ValidationError::InvalidMonth { year, month })
}

/// Returns `[first day, first day of next month)` for the given month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), ValidationError> {
    let start = month_start(year, month)?;
    let end = start
        .checked_add_months(Months::new(1))
        .ok_or(ValidationError::InvalidMonth { year, month })?;
    Ok((start, end))
}

/// Adds two amounts, rejecting results outside the decimal range.
pub fn checked_sum(left: Decimal, right: Decimal) -> Result<Decimal, ValidationError> {
    left.checked_add(right)
        .ok_or(ValidationError::AmountOutOfRange)
}

/// Parses a decimal amount from boundary text.
pub fn parse_amount(raw: &str) -> Result<Decimal, ValidationError> {
    Decimal::from_str(raw.trim()).map_err(|_| ValidationError::InvalidInput {
        field: "amount",
        value: raw.to_string(),
    })
}

/// Parses an ISO `YYYY-MM-DD` date from boundary text.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| ValidationError::InvalidInput {
        field: "date",
        value: raw.to_string(),
    })
}
