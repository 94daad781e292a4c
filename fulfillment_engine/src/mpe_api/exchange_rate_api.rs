use crate::{
    mpe_api::exchange_objects::ExchangeRate,
    traits::{ExchangeRateError, ExchangeRates},
};

/// Thin API over the exchange-rate cache.
#[derive(Debug, Clone)]
pub struct ExchangeRateApi<B> {
    db: B,
}

impl<B> ExchangeRateApi<B>
where B: ExchangeRates
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn fetch_last_rate(&self, currency: &str) -> Result<ExchangeRate, ExchangeRateError> {
        self.db.fetch_last_rate(currency).await
    }

    pub async fn set_exchange_rate(&self, rate: &ExchangeRate) -> Result<(), ExchangeRateError> {
        self.db.set_exchange_rate(rate).await
    }
}
