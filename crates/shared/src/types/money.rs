//! Money as integer minor units with decimal boundaries.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Amounts are stored as `i64` minor units (paise, cents) and only
//! converted to `rust_decimal::Decimal` when parsing or formatting.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors arising from money construction or arithmetic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    /// The decimal amount carries more precision than the currency allows.
    #[error("amount {0} has more decimal places than {1} allows")]
    ExcessPrecision(Decimal, Currency),

    /// The amount does not fit in 64-bit minor units.
    #[error("amount out of range")]
    Overflow,

    /// Arithmetic mixed two different currencies.
    #[error("currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch {
        /// Currency of the left-hand operand.
        expected: Currency,
        /// Currency of the right-hand operand.
        got: Currency,
    },

    /// The amount string could not be parsed as a decimal.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

/// ISO 4217 currency codes supported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Indian Rupee (gateway native currency).
    Inr,
    /// US Dollar.
    Usd,
    /// Euro.
    Eur,
}

impl Currency {
    /// Number of decimal places in the major-unit representation.
    #[must_use]
    pub const fn exponent(self) -> u32 {
        match self {
            Self::Inr | Self::Usd | Self::Eur => 2,
        }
    }

    /// Minor units per major unit (100 for 2-decimal currencies).
    #[must_use]
    pub const fn minor_per_major(self) -> i64 {
        match self {
            Self::Inr | Self::Usd | Self::Eur => 100,
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inr => write!(f, "INR"),
            Self::Usd => write!(f, "USD"),
            Self::Eur => write!(f, "EUR"),
        }
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INR" => Ok(Self::Inr),
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            _ => Err(format!("Unknown currency: {s}")),
        }
    }
}

/// A monetary amount in integer minor units of a currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    minor: i64,
    currency: Currency,
}

impl Money {
    /// Creates a Money value directly from minor units.
    #[must_use]
    pub const fn from_minor(minor: i64, currency: Currency) -> Self {
        Self { minor, currency }
    }

    /// Creates a zero amount in the given currency.
    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self { minor: 0, currency }
    }

    /// Converts a major-unit decimal (e.g. `299.99`) into minor units.
    ///
    /// Rejects amounts with more precision than the currency carries;
    /// rounding at this boundary would silently lose money.
    pub fn from_decimal(amount: Decimal, currency: Currency) -> Result<Self, MoneyError> {
        let scaled = amount
            .checked_mul(Decimal::from(currency.minor_per_major()))
            .ok_or(MoneyError::Overflow)?;
        if !scaled.fract().is_zero() {
            return Err(MoneyError::ExcessPrecision(amount, currency));
        }
        let minor = scaled.to_i64().ok_or(MoneyError::Overflow)?;
        Ok(Self { minor, currency })
    }

    /// Parses a decimal string (e.g. `"299.99"`) into minor units.
    pub fn parse(s: &str, currency: Currency) -> Result<Self, MoneyError> {
        let amount: Decimal = s
            .trim()
            .parse()
            .map_err(|_| MoneyError::InvalidAmount(s.to_string()))?;
        Self::from_decimal(amount, currency)
    }

    /// Returns the amount in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.minor
    }

    /// Returns the currency.
    #[must_use]
    pub const fn currency(self) -> Currency {
        self.currency
    }

    /// Returns the amount as a major-unit decimal with the currency's scale.
    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.minor, self.currency.exponent())
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.minor == 0
    }

    /// Returns true if the amount is negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.minor < 0
    }

    /// Checked addition; both operands must share a currency.
    pub fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        self.ensure_same_currency(other)?;
        let minor = self
            .minor
            .checked_add(other.minor)
            .ok_or(MoneyError::Overflow)?;
        Ok(Self { minor, currency: self.currency })
    }

    /// Checked subtraction; both operands must share a currency.
    pub fn checked_sub(self, other: Self) -> Result<Self, MoneyError> {
        self.ensure_same_currency(other)?;
        let minor = self
            .minor
            .checked_sub(other.minor)
            .ok_or(MoneyError::Overflow)?;
        Ok(Self { minor, currency: self.currency })
    }

    /// Computes `percent`% of this amount, rounded half-up at the minor
    /// unit boundary.
    ///
    /// 29999 paise at 10% is 2999.9 paise and rounds up to 3000 (30.00).
    pub fn percent(self, percent: Decimal) -> Result<Self, MoneyError> {
        let raw = Decimal::from(self.minor)
            .checked_mul(percent)
            .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
            .ok_or(MoneyError::Overflow)?;
        let minor = raw
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or(MoneyError::Overflow)?;
        Ok(Self { minor, currency: self.currency })
    }

    fn ensure_same_currency(self, other: Self) -> Result<(), MoneyError> {
        if self.currency == other.currency {
            Ok(())
        } else {
            Err(MoneyError::CurrencyMismatch {
                expected: self.currency,
                got: other.currency,
            })
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.to_decimal(), self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_decimal_exact() {
        let money = Money::from_decimal(dec!(299.99), Currency::Inr).unwrap();
        assert_eq!(money.minor(), 29999);
        assert_eq!(money.to_decimal(), dec!(299.99));
    }

    #[test]
    fn test_from_decimal_whole_amount() {
        let money = Money::from_decimal(dec!(100), Currency::Usd).unwrap();
        assert_eq!(money.minor(), 10000);
    }

    #[test]
    fn test_from_decimal_rejects_excess_precision() {
        let result = Money::from_decimal(dec!(10.999), Currency::Inr);
        assert!(matches!(result, Err(MoneyError::ExcessPrecision(_, _))));
    }

    #[test]
    fn test_parse_valid_and_invalid() {
        assert_eq!(
            Money::parse("299.99", Currency::Inr).unwrap().minor(),
            29999
        );
        assert!(matches!(
            Money::parse("not-a-number", Currency::Inr),
            Err(MoneyError::InvalidAmount(_))
        ));
    }

    #[rstest::rstest]
    // 29999 * 10% = 2999.9 -> 3000
    #[case(29999, dec!(10.00), 3000)]
    // 25 * 50% = 12.5 -> 13 (half-up, not banker's)
    #[case(25, dec!(50), 13)]
    #[case(35, dec!(50), 18)]
    #[case(100, dec!(2.5), 3)]
    #[case(10000, dec!(100), 10000)]
    fn test_percent_rounds_half_up(
        #[case] minor: i64,
        #[case] percent: Decimal,
        #[case] expected: i64,
    ) {
        let amount = Money::from_minor(minor, Currency::Inr);
        assert_eq!(amount.percent(percent).unwrap().minor(), expected);
    }

    #[test]
    fn test_percent_zero() {
        let amount = Money::from_minor(29999, Currency::Inr);
        assert!(amount.percent(Decimal::ZERO).unwrap().is_zero());
    }

    #[test]
    fn test_checked_sub_same_currency() {
        let a = Money::from_minor(29999, Currency::Inr);
        let b = Money::from_minor(3000, Currency::Inr);
        assert_eq!(a.checked_sub(b).unwrap().minor(), 26999);
    }

    #[test]
    fn test_checked_add_currency_mismatch() {
        let a = Money::from_minor(100, Currency::Inr);
        let b = Money::from_minor(100, Currency::Usd);
        assert!(matches!(
            a.checked_add(b),
            Err(MoneyError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_display_keeps_scale() {
        let money = Money::from_minor(3000, Currency::Inr);
        assert_eq!(money.to_string(), "30.00 INR");
    }

    #[test]
    fn test_is_negative() {
        assert!(Money::from_minor(-1, Currency::Inr).is_negative());
        assert!(!Money::zero(Currency::Inr).is_negative());
    }
}
