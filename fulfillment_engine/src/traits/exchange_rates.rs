use thiserror::Error;

use crate::mpe_api::exchange_objects::ExchangeRate;

/// Access to the cached exchange-rate table. Rates are presentation-layer only; stored amounts
/// are always base currency and are never rewritten on a rate change.
#[allow(async_fn_in_trait)]
pub trait ExchangeRates: Clone {
    async fn fetch_last_rate(&self, currency: &str) -> Result<ExchangeRate, ExchangeRateError>;

    async fn set_exchange_rate(&self, rate: &ExchangeRate) -> Result<(), ExchangeRateError>;
}

#[derive(Debug, Clone, Error)]
pub enum ExchangeRateError {
    #[error("Exchange rate database error: {0}")]
    DatabaseError(String),
    #[error("No exchange rate has been cached for {0}")]
    RateDoesNotExist(String),
}
