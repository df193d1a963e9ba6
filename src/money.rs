//! Money Value Type
//!
//! Exact decimal amounts tagged with an ISO-4217 style currency code.
//!
//! ## Rules
//! - Amounts are `rust_decimal::Decimal`, never floating point
//! - Every constructor and arithmetic result is rounded once to 2 decimal
//!   places, round-half-up (midpoint away from zero)
//! - Arithmetic and comparison require matching currencies; crossing
//!   currencies needs an explicit rate via [`Money::convert`]
//! - Values are immutable: every operation returns a new `Money`

use crate::error::WalletError;
use rust_decimal::prelude::*;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Decimal places kept for storage and display.
pub const MONEY_SCALE: u32 = 2;

// ============================================================================
// Currency
// ============================================================================

/// Three-letter uppercase currency code (e.g. `PEN`, `USD`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Currency([u8; 3]);

impl Currency {
    /// Normalize (trim + uppercase) and validate a currency code.
    pub fn parse(code: &str) -> Result<Self, WalletError> {
        let normalized = code.trim().to_ascii_uppercase();
        let bytes = normalized.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_uppercase) {
            return Err(WalletError::InvalidCurrency {
                code: code.to_string(),
            });
        }
        Ok(Self([bytes[0], bytes[1], bytes[2]]))
    }

    pub fn as_str(&self) -> &str {
        // Only ASCII uppercase letters are ever stored
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Currency {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::parse(s)
    }
}

impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ============================================================================
// Money
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

/// Round to the money scale, half-up, and pad to exactly two places.
fn normalize(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

impl Money {
    /// Build from a decimal amount and a raw currency code.
    pub fn new(amount: Decimal, currency: &str) -> Result<Self, WalletError> {
        Ok(Self::of(amount, Currency::parse(currency)?))
    }

    /// Build from an already validated currency.
    pub fn of(amount: Decimal, currency: Currency) -> Self {
        Self {
            amount: normalize(amount),
            currency,
        }
    }

    /// Parse a textual amount, e.g. `Money::parse("1000.50", "pen")`.
    pub fn parse(amount: &str, currency: &str) -> Result<Self, WalletError> {
        let currency = Currency::parse(currency)?;
        let amount = Decimal::from_str(amount.trim())
            .map_err(|_| WalletError::invalid_amount(amount))?;
        Ok(Self::of(amount, currency))
    }

    pub fn zero(currency: Currency) -> Self {
        Self::of(Decimal::ZERO, currency)
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), WalletError> {
        if self.currency != other.currency {
            return Err(WalletError::mismatch(self.currency, other.currency));
        }
        Ok(())
    }

    pub fn add(&self, other: &Money) -> Result<Money, WalletError> {
        self.ensure_same_currency(other)?;
        let sum = self
            .amount
            .checked_add(other.amount)
            .ok_or_else(|| WalletError::invalid_amount(format!("{} + {}", self, other)))?;
        Ok(Self::of(sum, self.currency))
    }

    pub fn subtract(&self, other: &Money) -> Result<Money, WalletError> {
        self.ensure_same_currency(other)?;
        let diff = self
            .amount
            .checked_sub(other.amount)
            .ok_or_else(|| WalletError::invalid_amount(format!("{} - {}", self, other)))?;
        Ok(Self::of(diff, self.currency))
    }

    pub fn compare(&self, other: &Money) -> Result<Ordering, WalletError> {
        self.ensure_same_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Convert into `target` using an explicit `rate` (units of target per
    /// unit of self).
    pub fn convert(&self, target: Currency, rate: Decimal) -> Result<Money, WalletError> {
        if rate <= Decimal::ZERO {
            return Err(WalletError::invalid_amount(format!("rate {}", rate)));
        }
        let converted = self
            .amount
            .checked_mul(rate)
            .ok_or_else(|| WalletError::invalid_amount(format!("{} x {}", self, rate)))?;
        Ok(Self::of(converted, target))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn pen(amount: &str) -> Money {
        Money::parse(amount, "PEN").unwrap()
    }

    // ========================================================================
    // Construction
    // ========================================================================

    #[test]
    fn qa_currency_is_normalized() {
        assert_eq!(Currency::parse(" pen ").unwrap().as_str(), "PEN");
        assert_eq!(Money::parse("1", "usd").unwrap().currency().as_str(), "USD");
    }

    #[test]
    fn qa_currency_rejects_bad_codes() {
        for code in ["", "PE", "PENN", "P3N", "€UR"] {
            let err = Currency::parse(code).unwrap_err();
            assert!(matches!(err, WalletError::InvalidCurrency { .. }), "{code}");
        }
    }

    #[test]
    fn qa_parse_rejects_garbage() {
        for raw in ["", "abc", "1,000.00", "12.3.4"] {
            let err = Money::parse(raw, "PEN").unwrap_err();
            assert!(matches!(err, WalletError::InvalidAmount { .. }), "{raw}");
        }
    }

    #[test]
    fn qa_rounding_is_half_up_to_two_places() {
        assert_eq!(pen("0.005").amount(), Decimal::new(1, 2));
        assert_eq!(pen("0.004").amount(), Decimal::new(0, 2));
        assert_eq!(pen("2.675").amount(), Decimal::new(268, 2));
        assert_eq!(pen("-0.005").amount(), Decimal::new(-1, 2));
        assert_eq!(pen("7").to_string(), "7.00 PEN");
    }

    // ========================================================================
    // Arithmetic
    // ========================================================================

    #[test]
    fn qa_add_then_subtract_restores_value() {
        let a = pen("1000.00");
        let b = pen("0.10");
        let back = a.add(&b).unwrap().subtract(&b).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn qa_parse_of_display_roundtrips() {
        let m = pen("123.45");
        let amount_text = m.amount().to_string();
        assert_eq!(Money::parse(&amount_text, m.currency().as_str()).unwrap(), m);
    }

    #[test]
    fn qa_cross_currency_ops_rejected() {
        let a = pen("1.00");
        let b = Money::parse("1.00", "USD").unwrap();
        assert!(matches!(a.add(&b), Err(WalletError::CurrencyMismatch { .. })));
        assert!(matches!(a.subtract(&b), Err(WalletError::CurrencyMismatch { .. })));
        assert!(matches!(a.compare(&b), Err(WalletError::CurrencyMismatch { .. })));
    }

    #[test]
    fn qa_sign_predicates() {
        assert!(pen("0").is_zero());
        assert!(pen("0.001").is_zero());
        assert!(pen("-0.01").is_negative());
        assert!(pen("0.01").is_positive());
        assert_eq!(pen("5").compare(&pen("5.00")).unwrap(), Ordering::Equal);
        assert_eq!(pen("4.99").compare(&pen("5")).unwrap(), Ordering::Less);
    }

    #[test]
    fn qa_convert_rounds_result() {
        let usd = Currency::parse("USD").unwrap();
        let converted = pen("100.00").convert(usd, Decimal::new(26789, 5)).unwrap();
        assert_eq!(converted.to_string(), "26.79 USD");
        assert!(pen("1").convert(usd, Decimal::ZERO).is_err());
    }
}
