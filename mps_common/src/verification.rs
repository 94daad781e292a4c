use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Money;

/// The normalized result of a successful gateway verification.
///
/// Both gateway adapters (Paystack's verify-by-reference call and Stripe's retrieve-intent call)
/// and the webhook ingress produce this one shape, so the fulfillment pipeline never sees
/// gateway-specific payloads. A `VerifiedPayment` is only ever constructed for a charge the
/// gateway reports as settled; partially populated success records do not exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedPayment {
    /// When the gateway recorded the charge as paid.
    pub paid_at: DateTime<Utc>,
    /// The payment channel reported by the gateway (card, bank_transfer, ussd, ...).
    pub channel: String,
    /// The settlement currency reported by the gateway.
    pub currency: String,
    /// Gateway fees, in minor units of the settlement currency.
    pub fees: Money,
    pub card_type: Option<String>,
    pub bank: Option<String>,
    pub country_code: Option<String>,
    /// The gateway's human-readable outcome line, e.g. "Successful" or "Approved".
    pub gateway_response: String,
    /// The raw gateway payload, retained verbatim for reconciliation.
    pub log: serde_json::Value,
}
