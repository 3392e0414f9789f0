//! Platform fee computation.

use rust_decimal::Decimal;
use thiserror::Error;

use coursepay_shared::types::{Money, MoneyError};

/// Errors from fee computation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeeError {
    /// Fees are only computed for positive amounts.
    #[error("amount must be positive")]
    NonPositiveAmount,

    /// Fee percentage outside the 0..=100 range.
    #[error("fee percent {0} outside 0..=100")]
    InvalidPercent(Decimal),

    /// Underlying money arithmetic failed.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// The fee split of a payment amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeBreakdown {
    /// Gross amount charged to the student.
    pub amount: Money,
    /// Platform's share, rounded half-up at the minor unit.
    pub platform_fee: Money,
    /// Instructor's share.
    pub instructor_payout: Money,
}

/// Splits `amount` into platform fee and instructor payout.
///
/// The payout is always `amount - platform_fee`, never computed
/// independently, so the two shares sum to the amount exactly.
pub fn split_fee(amount: Money, fee_percent: Decimal) -> Result<FeeBreakdown, FeeError> {
    if amount.is_zero() || amount.is_negative() {
        return Err(FeeError::NonPositiveAmount);
    }
    if fee_percent < Decimal::ZERO || fee_percent > Decimal::ONE_HUNDRED {
        return Err(FeeError::InvalidPercent(fee_percent));
    }

    let platform_fee = amount.percent(fee_percent)?;
    let instructor_payout = amount.checked_sub(platform_fee)?;

    Ok(FeeBreakdown {
        amount,
        platform_fee,
        instructor_payout,
    })
}
