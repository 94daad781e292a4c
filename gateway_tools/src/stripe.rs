use std::sync::Arc;

use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use log::*;
use mps_common::{Money, Secret, VerifiedPayment};
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

use crate::{
    data_objects::{ChargeLocator, StripeIntent, StripeIntentCreated, VerificationOutcome},
    GatewayApiError,
    GatewayConfig,
    GatewayVerifier,
    VerifyFuture,
};

const STRIPE_BASE_URL: &str = "https://api.stripe.com/v1";
/// Webhook events older than this are rejected to blunt replay attacks.
pub const STRIPE_SIGNATURE_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

/// The alternate (non-NGN) gateway: payment intents, retrieved with the charge expanded so a
/// verification needs exactly one round trip.
#[derive(Clone)]
pub struct StripeApi {
    client: Arc<Client>,
    base_url: String,
    webhook_secret: Secret<String>,
}

impl StripeApi {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayApiError> {
        Self::with_base_url(config, STRIPE_BASE_URL)
    }

    pub fn with_base_url(config: &GatewayConfig, base_url: &str) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        let bearer = format!("Bearer {}", config.stripe_secret_key.reveal());
        let val = HeaderValue::from_str(&bearer).map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { client: Arc::new(client), base_url: base_url.to_string(), webhook_secret: config.stripe_webhook_secret.clone() })
    }

    /// Creates a payment intent for the given amount, tagging it with the payment reference so
    /// webhook events can be correlated back. Returns the intent id and client secret.
    pub async fn create_intent(
        &self,
        amount: Money,
        currency: &str,
        reference: &str,
    ) -> Result<StripeIntentCreated, GatewayApiError> {
        debug!("Creating Stripe intent for [{reference}]");
        let amount = amount.value().to_string();
        let currency = currency.to_lowercase();
        let form: Vec<(&str, &str)> = vec![
            ("amount", amount.as_str()),
            ("currency", currency.as_str()),
            ("metadata[reference]", reference),
            ("automatic_payment_methods[enabled]", "true"),
        ];
        let url = format!("{}/payment_intents", self.base_url);
        let response = self
            .client
            .request(Method::POST, url)
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayApiError::Transport(e.to_string()))?;
        if response.status().is_success() {
            response.json::<StripeIntentCreated>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayApiError::Transport(e.to_string()))?;
            Err(GatewayApiError::QueryError { status, message })
        }
    }

    /// Calls `GET /payment_intents/{id}` with the latest charge expanded and normalizes the
    /// answer.
    pub async fn retrieve_intent(&self, intent_id: &str) -> Result<VerificationOutcome, GatewayApiError> {
        debug!("Retrieving Stripe intent [{intent_id}]");
        let url = format!("{}/payment_intents/{intent_id}", self.base_url);
        let response = self
            .client
            .request(Method::GET, url)
            .query(&[("expand[]", "latest_charge"), ("expand[]", "latest_charge.balance_transaction")])
            .send()
            .await
            .map_err(|e| GatewayApiError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayApiError::Transport(e.to_string()))?;
            return Err(GatewayApiError::QueryError { status, message });
        }
        let raw = response.json::<Value>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()))?;
        normalize_stripe_intent(raw)
    }

    /// Verifies a `stripe-signature` header against the raw webhook body.
    ///
    /// The header carries a timestamp and one or more `v1` HMAC-SHA256 signatures over
    /// `"{timestamp}.{body}"`. An event whose timestamp is outside the tolerance window fails
    /// verification even with a valid signature.
    pub fn verify_webhook_signature(&self, payload: &[u8], signature_header: &str) -> Result<bool, GatewayApiError> {
        let (timestamp, signatures) = parse_signature_header(signature_header)?;
        let age = Utc::now().timestamp() - timestamp;
        if age.abs() > STRIPE_SIGNATURE_TOLERANCE_SECS {
            warn!("Webhook timestamp is {age}s old; outside the tolerance window");
            return Ok(false);
        }
        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.reveal().as_bytes())
            .map_err(|e| GatewayApiError::InvalidSignature(e.to_string()))?;
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        let expected = hex::encode(mac.finalize().into_bytes());
        Ok(signatures.iter().any(|s| s == &expected))
    }

    /// Verifies and parses a webhook delivery in one step.
    pub fn parse_webhook_event(&self, payload: &[u8], signature_header: &str) -> Result<StripeEvent, GatewayApiError> {
        if !self.verify_webhook_signature(payload, signature_header)? {
            return Err(GatewayApiError::InvalidSignature("signature mismatch or stale timestamp".to_string()));
        }
        serde_json::from_slice(payload).map_err(|e| GatewayApiError::JsonError(e.to_string()))
    }
}

fn parse_signature_header(header: &str) -> Result<(i64, Vec<String>), GatewayApiError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", t)) => {
                timestamp =
                    Some(t.parse::<i64>().map_err(|e| GatewayApiError::InvalidSignature(e.to_string()))?)
            },
            Some(("v1", sig)) => signatures.push(sig.to_string()),
            _ => {},
        }
    }
    let timestamp = timestamp.ok_or_else(|| GatewayApiError::InvalidSignature("no timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(GatewayApiError::InvalidSignature("no v1 signature".to_string()));
    }
    Ok((timestamp, signatures))
}

/// A signed event from the Stripe webhook endpoint. Only the intent payload is modelled; the
/// ingress ignores event types it does not handle.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: Value,
}

impl StripeEvent {
    /// The payment reference the intent was tagged with at creation time.
    pub fn reference(&self) -> Option<&str> {
        self.data.object.get("metadata").and_then(|m| m.get("reference")).and_then(|r| r.as_str())
    }
}

/// Normalizes a payment-intent payload, from the retrieve call or from a webhook event. The
/// shapes agree, which is what lets the ingress skip the second network round trip.
pub fn normalize_stripe_intent(raw: Value) -> Result<VerificationOutcome, GatewayApiError> {
    let intent: StripeIntent =
        serde_json::from_value(raw.clone()).map_err(|e| GatewayApiError::JsonError(e.to_string()))?;
    if intent.status != "succeeded" {
        info!("Stripe intent [{}] is not successful: {}", intent.id, intent.status);
        return Ok(VerificationOutcome::Declined { status: intent.status });
    }
    let charge = intent.latest_charge.ok_or_else(|| GatewayApiError::MissingField("latest_charge".to_string()))?;
    let paid_at = Utc
        .timestamp_opt(charge.created, 0)
        .single()
        .ok_or_else(|| GatewayApiError::MissingField("latest_charge.created".to_string()))?;
    let details = charge.payment_method_details.unwrap_or_default();
    let card = details.card.unwrap_or_default();
    let channel = details.method_type.unwrap_or_else(|| "card".to_string());
    let fees = charge.balance_transaction.map(|bt| Money::from(bt.fee)).unwrap_or_default();
    let gateway_response = charge
        .outcome
        .and_then(|o| o.seller_message)
        .unwrap_or_else(|| "Payment complete.".to_string());
    Ok(VerificationOutcome::Success(VerifiedPayment {
        paid_at,
        channel,
        currency: intent.currency.to_uppercase(),
        fees,
        card_type: card.brand,
        bank: None,
        country_code: card.country,
        gateway_response,
        log: raw,
    }))
}

impl GatewayVerifier for StripeApi {
    fn verify(&self, locator: &ChargeLocator) -> VerifyFuture {
        let api = self.clone();
        let reference = locator.reference.clone();
        let intent_id = locator.stripe_intent_id.clone();
        Box::pin(async move {
            let intent_id = intent_id.ok_or_else(|| {
                warn!("Payment [{reference}] routed to Stripe but has no intent id");
                GatewayApiError::MissingField("stripe_intent_id".to_string())
            })?;
            api.retrieve_intent(&intent_id).await
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn test_api() -> StripeApi {
        let config = GatewayConfig {
            stripe_webhook_secret: Secret::new("whsec_test123secret456".to_string()),
            ..Default::default()
        };
        StripeApi::new(&config).unwrap()
    }

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signatures_verify() {
        let api = test_api();
        let payload = br#"{"type":"payment_intent.succeeded"}"#;
        let t = Utc::now().timestamp();
        let header = format!("t={t},v1={}", sign(payload, "whsec_test123secret456", t));
        assert!(api.verify_webhook_signature(payload, &header).unwrap());
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let api = test_api();
        let payload = br#"{"type":"payment_intent.succeeded"}"#;
        let t = Utc::now().timestamp();
        let header = format!("t={t},v1={}", sign(payload, "wrong_secret", t));
        assert!(!api.verify_webhook_signature(payload, &header).unwrap());
    }

    #[test]
    fn tampered_payloads_fail_verification() {
        let api = test_api();
        let payload = br#"{"type":"payment_intent.succeeded"}"#;
        let t = Utc::now().timestamp();
        let header = format!("t={t},v1={}", sign(payload, "whsec_test123secret456", t));
        let tampered = br#"{"type":"payment_intent.succeeded","amount":1}"#;
        assert!(!api.verify_webhook_signature(tampered, &header).unwrap());
    }

    #[test]
    fn stale_timestamps_fail_verification() {
        let api = test_api();
        let payload = br#"{"type":"payment_intent.succeeded"}"#;
        let t = Utc::now().timestamp() - STRIPE_SIGNATURE_TOLERANCE_SECS - 60;
        let header = format!("t={t},v1={}", sign(payload, "whsec_test123secret456", t));
        assert!(!api.verify_webhook_signature(payload, &header).unwrap());
    }

    fn intent_fixture() -> Value {
        serde_json::json!({
            "id": "pi_3PtTestIntent",
            "status": "succeeded",
            "currency": "usd",
            "metadata": { "reference": "MPS-7GQ2KX94BD" },
            "latest_charge": {
                "id": "ch_3PtTestCharge",
                "status": "succeeded",
                "created": 1786010100,
                "payment_method_details": { "type": "card", "card": { "brand": "visa", "country": "US" } },
                "balance_transaction": { "fee": 59 },
                "outcome": { "seller_message": "Payment complete." }
            }
        })
    }

    #[test]
    fn succeeded_intents_normalize_fully() {
        let outcome = normalize_stripe_intent(intent_fixture()).unwrap();
        let VerificationOutcome::Success(v) = outcome else {
            panic!("expected success");
        };
        assert_eq!(v.currency, "USD");
        assert_eq!(v.channel, "card");
        assert_eq!(v.fees.value(), 59);
        assert_eq!(v.card_type.as_deref(), Some("visa"));
        assert_eq!(v.country_code.as_deref(), Some("US"));
        assert_eq!(v.gateway_response, "Payment complete.");
    }

    #[test]
    fn unsettled_intents_are_declines() {
        let mut raw = intent_fixture();
        raw["status"] = Value::from("requires_payment_method");
        let outcome = normalize_stripe_intent(raw).unwrap();
        assert!(matches!(outcome, VerificationOutcome::Declined { status } if status == "requires_payment_method"));
    }

    #[test]
    fn webhook_events_surface_the_reference() {
        let event = serde_json::json!({
            "type": "payment_intent.succeeded",
            "data": { "object": intent_fixture() }
        });
        let event: StripeEvent = serde_json::from_value(event).unwrap();
        assert_eq!(event.event_type, "payment_intent.succeeded");
        assert_eq!(event.reference(), Some("MPS-7GQ2KX94BD"));
    }
}
