use chrono::{DateTime, Utc};
use mps_common::{Money, VerifiedPayment};
use serde::Deserialize;

/// What the caller knows about the charge it wants verified. Paystack locates charges by the
/// payment reference; Stripe by the intent id the reference issuer attached.
#[derive(Debug, Clone)]
pub struct ChargeLocator {
    pub reference: String,
    pub stripe_intent_id: Option<String>,
}

/// The tagged outcome of a verification call. A transport or parse problem is *not* an outcome;
/// those surface as [`crate::GatewayApiError`] so the caller retries later.
#[derive(Debug, Clone)]
pub enum VerificationOutcome {
    Success(VerifiedPayment),
    /// The gateway answered definitively and the charge did not go through. The payment record
    /// stays pending.
    Declined { status: String },
}

//--------------------------------------      Paystack       ---------------------------------------------------------

/// The envelope every Paystack REST response arrives in.
#[derive(Debug, Clone, Deserialize)]
pub struct PaystackEnvelope {
    pub status: bool,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaystackTransaction {
    pub status: String,
    pub reference: String,
    /// Amount in kobo.
    pub amount: i64,
    pub paid_at: Option<DateTime<Utc>>,
    pub channel: Option<String>,
    pub currency: String,
    #[serde(default)]
    pub fees: Option<i64>,
    pub gateway_response: Option<String>,
    #[serde(default)]
    pub authorization: Option<PaystackAuthorization>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaystackAuthorization {
    pub card_type: Option<String>,
    pub bank: Option<String>,
    pub country_code: Option<String>,
}

impl PaystackTransaction {
    pub fn fees(&self) -> Money {
        Money::from(self.fees.unwrap_or(0))
    }
}

//--------------------------------------       Stripe        ---------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct StripeIntent {
    pub id: String,
    pub status: String,
    pub currency: String,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub latest_charge: Option<StripeCharge>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCharge {
    pub id: String,
    pub status: String,
    /// Unix timestamp of the charge.
    pub created: i64,
    #[serde(default)]
    pub payment_method_details: Option<StripePaymentMethodDetails>,
    #[serde(default)]
    pub balance_transaction: Option<StripeBalanceTransaction>,
    #[serde(default)]
    pub outcome: Option<StripeOutcome>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripePaymentMethodDetails {
    #[serde(rename = "type")]
    pub method_type: Option<String>,
    #[serde(default)]
    pub card: Option<StripeCardDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeCardDetails {
    pub brand: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeBalanceTransaction {
    /// Gateway fee in the settlement currency's minor unit.
    pub fee: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeOutcome {
    pub seller_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeIntentCreated {
    pub id: String,
    pub client_secret: String,
}
