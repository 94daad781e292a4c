use std::fmt::Display;

use chrono::{DateTime, Utc};
use mps_common::{Money, NGN_CURRENCY_CODE};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A cached exchange rate: how many units of `base_currency` one naira buys. Used only to
/// present stored base-currency amounts in another currency; nothing stored is ever rewritten.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub base_currency: String,
    pub rate: f64,
    pub updated_at: DateTime<Utc>,
}

impl Default for ExchangeRate {
    fn default() -> Self {
        Self { base_currency: NGN_CURRENCY_CODE.to_string(), rate: 1.0, updated_at: Utc::now() }
    }
}

impl ExchangeRate {
    pub fn new(base_currency: String, rate: f64) -> Self {
        Self { base_currency, rate, updated_at: Utc::now() }
    }

    /// Converts a base-currency amount into this rate's currency, in fractional major units.
    pub fn convert(&self, amount: Money) -> f64 {
        (amount.value() as f64 / 100.0) * self.rate
    }
}

impl Display for ExchangeRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "₦1 = {} {} (as of {})", self.rate, self.base_currency, self.updated_at)
    }
}
