use sqlx::SqliteConnection;

use crate::{mpe_api::exchange_objects::ExchangeRate, traits::ExchangeRateError};

pub async fn fetch_last_rate(currency: &str, conn: &mut SqliteConnection) -> Result<ExchangeRate, ExchangeRateError> {
    let result: Option<ExchangeRate> =
        sqlx::query_as("SELECT * FROM exchange_rates WHERE base_currency = $1 ORDER BY updated_at DESC, rowid DESC LIMIT 1")
            .bind(currency)
            .fetch_optional(conn)
            .await
            .map_err(|e| ExchangeRateError::DatabaseError(e.to_string()))?;
    result.ok_or_else(|| ExchangeRateError::RateDoesNotExist(currency.to_string()))
}

pub async fn set_exchange_rate(rate: &ExchangeRate, conn: &mut SqliteConnection) -> Result<(), ExchangeRateError> {
    sqlx::query("INSERT INTO exchange_rates (base_currency, rate) VALUES ($1, $2)")
        .bind(&rate.base_currency)
        .bind(rate.rate)
        .execute(conn)
        .await
        .map_err(|e| ExchangeRateError::DatabaseError(e.to_string()))?;
    Ok(())
}
