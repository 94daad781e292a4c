use fulfillment_engine::db_types::{Order, Payment, ProductOrder};
use mps_common::Money;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<T: ToString>(message: T) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<T: ToString>(message: T) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// The caller's identity, resolved by the identity provider at the edge and forwarded in trusted
/// headers.
#[derive(Debug, Clone)]
pub struct BuyerIdentity {
    pub buyer_id: String,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceParams {
    pub country: String,
    #[serde(default)]
    pub method: Option<String>,
    /// Charge currency; defaults to the base currency.
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferenceResponse {
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_client_secret: Option<String>,
    pub amount: Money,
    pub currency: String,
    pub full_name: String,
    pub email: String,
    pub payment_status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyParams {
    pub reference: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyResponse {
    pub payment: Payment,
    pub order: Order,
    pub product_orders: Vec<ProductOrder>,
    pub added_points: i64,
    pub already_processed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BasketTotalParams {
    pub country: String,
    #[serde(default)]
    pub method: Option<String>,
    /// Optional display currency; converted with the cached rate, stored amounts untouched.
    #[serde(default)]
    pub display_currency: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BasketTotalResponse {
    pub items_total: Money,
    pub delivery_fee: Money,
    pub voucher_amount: Money,
    pub total: Money,
    pub total_without_voucher: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_total: Option<f64>,
}
