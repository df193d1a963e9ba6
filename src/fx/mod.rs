//! Currency conversion
//!
//! Rates come from an injected [`CurrencyConverter`]. The ledger itself never
//! converts implicitly: a foreign-currency amount is rejected with
//! `CurrencyMismatch`, and callers that want to move money across currencies
//! convert first through [`CurrencyExchange`].

pub mod open_er_api;

pub use open_er_api::OpenErApiConverter;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::FixedRateConfig;
use crate::error::WalletError;
use crate::money::{Currency, Money};

/// Rate source: units of `to` per one unit of `from`.
#[async_trait]
pub trait CurrencyConverter: Send + Sync {
    /// Get converter name for logging
    fn name(&self) -> &'static str;

    async fn rate(&self, from: Currency, to: Currency) -> Result<Decimal, WalletError>;
}

pub(crate) fn unavailable(from: Currency, to: Currency, reason: impl Into<String>) -> WalletError {
    WalletError::RateUnavailable {
        from: from.to_string(),
        to: to.to_string(),
        reason: reason.into(),
    }
}

// ============================================================================
// FixedRates
// ============================================================================

/// In-process rate table. A missing pair is derived from its inverse.
#[derive(Debug, Clone, Default)]
pub struct FixedRates {
    rates: HashMap<(Currency, Currency), Decimal>,
}

impl FixedRates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, from: Currency, to: Currency, rate: Decimal) -> Self {
        self.rates.insert((from, to), rate);
        self
    }

    pub fn from_config(entries: &[FixedRateConfig]) -> Result<Self, WalletError> {
        entries.iter().try_fold(Self::new(), |table, entry| {
            let from = Currency::parse(&entry.from)?;
            let to = Currency::parse(&entry.to)?;
            if entry.rate <= Decimal::ZERO {
                return Err(WalletError::invalid_amount(format!("rate {}", entry.rate)));
            }
            Ok(table.with_rate(from, to, entry.rate))
        })
    }
}

#[async_trait]
impl CurrencyConverter for FixedRates {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn rate(&self, from: Currency, to: Currency) -> Result<Decimal, WalletError> {
        if from == to {
            return Ok(Decimal::ONE);
        }
        if let Some(rate) = self.rates.get(&(from, to)) {
            return Ok(*rate);
        }
        self.rates
            .get(&(to, from))
            .and_then(|inverse| Decimal::ONE.checked_div(*inverse))
            .ok_or_else(|| unavailable(from, to, "pair not configured"))
    }
}

// ============================================================================
// CurrencyExchange
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversion {
    pub original: Money,
    pub converted: Money,
    pub rate: Decimal,
}

pub struct CurrencyExchange {
    converter: Arc<dyn CurrencyConverter>,
}

impl CurrencyExchange {
    pub fn new(converter: Arc<dyn CurrencyConverter>) -> Self {
        Self { converter }
    }

    /// Converted amount is `amount x rate`, rounded to 2 places half-up.
    pub async fn convert(&self, amount: &Money, target: Currency) -> Result<Conversion, WalletError> {
        let rate = if amount.currency() == target {
            Decimal::ONE
        } else {
            self.converter
                .rate(amount.currency(), target)
                .await
                .inspect_err(|e| {
                    warn!(converter = self.converter.name(), code = e.code(), "Rate lookup failed: {}", e)
                })?
        };
        if rate <= Decimal::ZERO {
            return Err(unavailable(amount.currency(), target, format!("non-positive rate {}", rate)));
        }

        let converted = amount.convert(target, rate)?;
        debug!(original = %amount, converted = %converted, rate = %rate, "Converted");
        Ok(Conversion {
            original: *amount,
            converted,
            rate,
        })
    }
}
