use std::sync::Arc;

use log::*;
use mps_common::VerifiedPayment;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    config::GatewayConfig,
    data_objects::{ChargeLocator, PaystackEnvelope, PaystackTransaction, VerificationOutcome},
    GatewayApiError,
    GatewayVerifier,
    VerifyFuture,
};

const PAYSTACK_BASE_URL: &str = "https://api.paystack.co";

/// The primary (base currency) gateway: a synchronous verify-by-reference REST call.
#[derive(Clone)]
pub struct PaystackApi {
    client: Arc<Client>,
    base_url: String,
}

impl PaystackApi {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayApiError> {
        Self::with_base_url(config, PAYSTACK_BASE_URL)
    }

    /// Mostly useful for pointing the client at a stub server in tests.
    pub fn with_base_url(config: &GatewayConfig, base_url: &str) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.paystack_secret_key.reveal());
        let val = HeaderValue::from_str(&bearer).map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { client: Arc::new(client), base_url: base_url.to_string() })
    }

    async fn rest_query<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<T, GatewayApiError> {
        let url = format!("{}{path}", self.base_url);
        trace!("Sending Paystack query: {url}");
        let response = self
            .client
            .request(method, url)
            .send()
            .await
            .map_err(|e| GatewayApiError::Transport(e.to_string()))?;
        if response.status().is_success() {
            trace!("Paystack query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayApiError::Transport(e.to_string()))?;
            Err(GatewayApiError::QueryError { status, message })
        }
    }

    /// Calls `GET /transaction/verify/{reference}` and normalizes the answer.
    pub async fn verify_by_reference(&self, reference: &str) -> Result<VerificationOutcome, GatewayApiError> {
        debug!("Verifying Paystack transaction [{reference}]");
        let envelope: PaystackEnvelope =
            self.rest_query(Method::GET, &format!("/transaction/verify/{reference}")).await?;
        if !envelope.status {
            // The envelope-level flag means the API call itself failed (unknown reference,
            // revoked key). Recoverable; not a declined charge.
            return Err(GatewayApiError::QueryError { status: 200, message: envelope.message });
        }
        let data = envelope.data.ok_or_else(|| GatewayApiError::MissingField("data".to_string()))?;
        normalize_paystack(data)
    }
}

/// Normalizes a Paystack transaction payload. Also used by tests with canned fixtures, so it is
/// independent of the HTTP client.
pub fn normalize_paystack(data: Value) -> Result<VerificationOutcome, GatewayApiError> {
    let tx: PaystackTransaction =
        serde_json::from_value(data.clone()).map_err(|e| GatewayApiError::JsonError(e.to_string()))?;
    if tx.status != "success" {
        info!("Paystack transaction [{}] is not successful: {}", tx.reference, tx.status);
        return Ok(VerificationOutcome::Declined { status: tx.status });
    }
    // A success result is never partially populated; anything essential missing is a hard error,
    // not a silently defaulted field.
    let paid_at = tx.paid_at.ok_or_else(|| GatewayApiError::MissingField("paid_at".to_string()))?;
    let channel = tx.channel.clone().ok_or_else(|| GatewayApiError::MissingField("channel".to_string()))?;
    let auth = tx.authorization.clone().unwrap_or_default();
    Ok(VerificationOutcome::Success(VerifiedPayment {
        paid_at,
        channel,
        currency: tx.currency.clone(),
        fees: tx.fees(),
        card_type: auth.card_type,
        bank: auth.bank,
        country_code: auth.country_code,
        gateway_response: tx.gateway_response.clone().unwrap_or_else(|| "Successful".to_string()),
        log: data,
    }))
}

impl GatewayVerifier for PaystackApi {
    fn verify(&self, locator: &ChargeLocator) -> VerifyFuture {
        let api = self.clone();
        let reference = locator.reference.clone();
        Box::pin(async move { api.verify_by_reference(&reference).await })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn success_fixture() -> Value {
        serde_json::json!({
            "status": "success",
            "reference": "MPS-7GQ2KX94BD",
            "amount": 900000,
            "paid_at": "2026-08-07T10:15:00Z",
            "channel": "card",
            "currency": "NGN",
            "fees": 13500,
            "gateway_response": "Successful",
            "authorization": {
                "card_type": "visa",
                "bank": "Test Bank",
                "country_code": "NG"
            }
        })
    }

    #[test]
    fn successful_transactions_normalize_fully() {
        let outcome = normalize_paystack(success_fixture()).unwrap();
        let VerificationOutcome::Success(v) = outcome else {
            panic!("expected success");
        };
        assert_eq!(v.channel, "card");
        assert_eq!(v.currency, "NGN");
        assert_eq!(v.fees.value(), 13500);
        assert_eq!(v.card_type.as_deref(), Some("visa"));
        assert_eq!(v.bank.as_deref(), Some("Test Bank"));
        assert_eq!(v.country_code.as_deref(), Some("NG"));
        assert_eq!(v.gateway_response, "Successful");
        assert_eq!(v.log["reference"], "MPS-7GQ2KX94BD");
    }

    #[test]
    fn non_success_statuses_are_declines_not_errors() {
        let mut data = success_fixture();
        data["status"] = Value::from("abandoned");
        let outcome = normalize_paystack(data).unwrap();
        assert!(matches!(outcome, VerificationOutcome::Declined { status } if status == "abandoned"));
    }

    #[test]
    fn a_success_without_paid_at_is_rejected() {
        let mut data = success_fixture();
        data.as_object_mut().unwrap().remove("paid_at");
        let err = normalize_paystack(data).unwrap_err();
        assert!(matches!(err, GatewayApiError::MissingField(f) if f == "paid_at"));
    }
}
