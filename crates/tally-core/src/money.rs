//! # Money Module
//!
//! The `Money` type plus the formatting and parsing helpers used at the
//! edges of the system (PDF/report code, shell input fields).
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.29 * 100 = 28.999999999999996                                      │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents everywhere after the input boundary        │
//! │    Every column, every total, every debt balance is an i64 of cents.    │
//! │    The only float→cents conversion is parse_cents_from_float(), and it  │
//! │    TRUNCATES (0.29 → 28). Tests pin that behaviour.                     │
//! │                                                                         │
//! │  Percentages truncate too:                                              │
//! │    333 cents at 33% = 10989 / 100 = 109 (not 110)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::money::{format_currency, Money};
//!
//! let line = Money::from_cents(1000);
//! assert_eq!(line.percent_of(10).cents(), 100);
//! assert_eq!(line.less_percent(10).cents(), 900);
//! assert_eq!(format_currency(1900, "DZD"), "19.00 DZD");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// Signed, so a debt adjustment can carry a negative delta. Stored
/// balances are clamped by the ledger, never by this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let price = Money::from_cents(1234);
    /// assert_eq!(price.cents(), 1234);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns zero money.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a unit price by a quantity, saturating at the `i64` bounds.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// Multiplies a unit price by a quantity. `None` on overflow.
    ///
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(250).checked_multiply_quantity(4), Some(Money::from_cents(1000)));
    /// assert_eq!(Money::from_cents(4_000_000_000).checked_multiply_quantity(4_000_000_000), None);
    /// ```
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Adds `other`. `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Returns `pct` percent of this amount, truncated toward zero.
    ///
    /// ## Implementation
    /// `amount * pct / 100` in i128 so large balances cannot overflow.
    /// Integer division truncates; there is no rounding term.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// // 333 × 33% = 109.89 → 109
    /// assert_eq!(Money::from_cents(333).percent_of(33).cents(), 109);
    /// ```
    pub fn percent_of(&self, pct: i64) -> Money {
        let part = self.0 as i128 * pct as i128 / 100;
        Money(part as i64)
    }

    /// Returns this amount minus `pct` percent of it.
    #[inline]
    pub fn less_percent(&self, pct: i64) -> Money {
        *self - self.percent_of(pct)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Renders as a plain two-decimal amount: `12.34`, `-0.05`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

// Operators saturate at the i64 bounds. The ledger uses the checked_*
// methods wherever an overflow must be reported.

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Formatting / Parsing
// =============================================================================

/// Formats cents as a two-decimal amount without a currency code.
///
/// ```rust
/// use tally_core::money::format_cents;
///
/// assert_eq!(format_cents(1234), "12.34");
/// assert_eq!(format_cents(-550), "-5.50");
/// ```
pub fn format_cents(cents: i64) -> String {
    Money::from_cents(cents).to_string()
}

/// Formats cents followed by the currency code: `"19.00 DZD"`.
///
/// An empty code yields the bare amount.
pub fn format_currency(cents: i64, currency: &str) -> String {
    let currency = currency.trim();
    if currency.is_empty() {
        return format_cents(cents);
    }
    format!("{} {}", format_cents(cents), currency)
}

/// Converts a user-typed decimal amount to cents by TRUNCATION.
///
/// This is the single place floats enter the system. `amount * 100` is
/// cut toward zero, never rounded, so `0.29` becomes `28` cents.
///
/// ```rust
/// use tally_core::money::parse_cents_from_float;
///
/// assert_eq!(parse_cents_from_float(12.34), 1234);
/// assert_eq!(parse_cents_from_float(0.29), 28);
/// ```
pub fn parse_cents_from_float(amount: f64) -> i64 {
    (amount * 100.0).trunc() as i64
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
        assert_eq!(Money::from_cents(0).to_string(), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);

        let total: Money = [a, b, b].into_iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_percent_truncates() {
        assert_eq!(Money::from_cents(333).percent_of(33).cents(), 109);
        assert_eq!(Money::from_cents(1890).percent_of(5).cents(), 94);
        assert_eq!(Money::from_cents(999).percent_of(33).cents(), 329);
        assert_eq!(Money::from_cents(1000).less_percent(10).cents(), 900);
        assert_eq!(Money::from_cents(1000).percent_of(0).cents(), 0);
    }

    #[test]
    fn test_percent_of_large_amount_does_not_overflow() {
        let big = Money::from_cents(i64::MAX / 2);
        assert_eq!(big.percent_of(100), big);
    }

    #[test]
    fn test_overflow_is_reported_or_saturated() {
        let price = Money::from_cents(4_000_000_000);

        assert_eq!(price.checked_multiply_quantity(4_000_000_000), None);
        assert_eq!(price.checked_multiply_quantity(3), Some(Money::from_cents(12_000_000_000)));
        assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);

        assert_eq!((price * 4_000_000_000).cents(), i64::MAX);
        assert_eq!((Money::from_cents(i64::MAX) + Money::from_cents(1)).cents(), i64::MAX);
        assert_eq!((Money::from_cents(i64::MIN) - Money::from_cents(1)).cents(), i64::MIN);

        let total: Money = [Money::from_cents(i64::MAX), Money::from_cents(5)].into_iter().sum();
        assert_eq!(total.cents(), i64::MAX);
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(1900, "DZD"), "19.00 DZD");
        assert_eq!(format_currency(5, " USD "), "0.05 USD");
        assert_eq!(format_currency(1234, ""), "12.34");
    }

    #[test]
    fn test_parse_then_format_round_trip() {
        assert_eq!(format_cents(parse_cents_from_float(12.34)), "12.34");
    }

    /// Pins truncation: a rounding implementation would give 29 and 115.
    #[test]
    fn test_parse_cents_truncates_instead_of_rounding() {
        assert_eq!(parse_cents_from_float(0.29), 28);
        assert_eq!(parse_cents_from_float(1.15), 114);
        assert_eq!(parse_cents_from_float(19.999), 1999);
        assert_eq!(parse_cents_from_float(-2.509), -250);
    }
}
