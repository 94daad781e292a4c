//! Database types for the fulfillment pipeline.
//!
//! These are the records the storage backends persist and the public API hands out. Status
//! vocabularies are stored as TEXT and decoded through their `FromStr` implementations; money is
//! always [`Money`] minor units.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use mps_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid status value: {0}")]
pub struct ConversionError(String);

impl ConversionError {
    pub(crate) fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

//--------------------------------------   PaymentStatus     ---------------------------------------------------------
/// A payment starts `Pending` and transitions to `Success` exactly once. There is no failure
/// state: a declined or abandoned verification simply leaves the record pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Success,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Success => write!(f, "Success"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Success" => Ok(Self::Success),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment status: {value}. But this conversion cannot fail. Defaulting to Pending");
            PaymentStatus::Pending
        })
    }
}

//--------------------------------------      Payment        ---------------------------------------------------------
/// One checkout attempt, keyed by the human-readable `reference`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    pub id: i64,
    pub reference: String,
    pub basket_id: i64,
    pub buyer_id: String,
    pub status: PaymentStatus,
    /// The charge amount presented to the gateway. Equal to `total` at issue time.
    pub amount: Money,
    pub items_total: Money,
    pub delivery_fee: Money,
    pub voucher_amount: Money,
    pub total: Money,
    pub currency: String,
    pub stripe_intent_id: Option<String>,
    #[serde(skip_serializing)]
    pub stripe_client_secret: Option<String>,
    pub channel: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub fees: Option<Money>,
    /// Raw gateway payload as JSON text, kept for reconciliation.
    #[serde(skip_serializing)]
    pub gateway_log: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The record inserted when a reference is first issued for a basket.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub reference: String,
    pub basket_id: i64,
    pub buyer_id: String,
    pub amount: Money,
    pub items_total: Money,
    pub delivery_fee: Money,
    pub voucher_amount: Money,
    pub total: Money,
    pub currency: String,
    pub stripe_intent_id: Option<String>,
    pub stripe_client_secret: Option<String>,
}

//--------------------------------------       OrderId       ---------------------------------------------------------
/// The human-readable order identifier handed to buyers and shops.
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
/// A committed order. Exactly one exists per successful payment; `payment_id` carries a UNIQUE
/// constraint, which is the invariant the whole dedup story rests on.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub payment_id: i64,
    pub buyer_id: String,
    /// JSON snapshot of the delivery address at order time.
    pub delivery: String,
    pub loyalty_points: i64,
    #[serde(skip_serializing)]
    pub points_credited: bool,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------  ProductOrderStatus ---------------------------------------------------------
/// Fulfillment progression for a single line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum ProductOrderStatus {
    OrderPlaced,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl Display for ProductOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductOrderStatus::OrderPlaced => write!(f, "OrderPlaced"),
            ProductOrderStatus::Processing => write!(f, "Processing"),
            ProductOrderStatus::Shipped => write!(f, "Shipped"),
            ProductOrderStatus::Delivered => write!(f, "Delivered"),
            ProductOrderStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for ProductOrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OrderPlaced" => Ok(Self::OrderPlaced),
            "Processing" => Ok(Self::Processing),
            "Shipped" => Ok(Self::Shipped),
            "Delivered" => Ok(Self::Delivered),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid product order status: {s}"))),
        }
    }
}

//--------------------------------------   RevenueStatus     ---------------------------------------------------------
/// Vendor payout state. Independent of the fulfillment status; a shop's revenue flips to `Paid`
/// by the payout job, which is outside this pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum RevenueStatus {
    Pending,
    Paid,
}

impl Display for RevenueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RevenueStatus::Pending => write!(f, "Pending"),
            RevenueStatus::Paid => write!(f, "Paid"),
        }
    }
}

//--------------------------------------    ProductOrder     ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProductOrder {
    pub id: i64,
    pub order_ref: i64,
    pub product_id: String,
    pub sku: String,
    pub quantity: i64,
    /// Catalog price at the instant the order was created.
    pub unit_price: Money,
    pub shop_id: String,
    pub status: ProductOrderStatus,
    pub shop_revenue: Money,
    pub revenue_status: RevenueStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       Basket        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Basket {
    pub id: i64,
    pub buyer_id: String,
    pub delivery_country: Option<String>,
    pub delivery_method: Option<String>,
    pub delivery_address_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct BasketItem {
    pub id: i64,
    pub basket_id: i64,
    pub product_id: String,
    pub sku: String,
    pub quantity: i64,
    /// Free-form made-to-order instructions. A line with notes is bespoke and exempt from stock
    /// tracking.
    pub bespoke_notes: Option<String>,
}

//--------------------------------------  ProductVariation   ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct ProductVariation {
    pub id: i64,
    pub product_id: String,
    pub sku: String,
    pub price: Money,
    pub quantity: i64,
    pub bespoke: bool,
}

//--------------------------------------     PricedLine      ---------------------------------------------------------
/// A basket line joined against the catalog, ready for the pricing engine. A line whose variation
/// has disappeared from the catalog carries `unit_price: None` and is skipped, not an error.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub product_id: String,
    pub sku: String,
    pub quantity: i64,
    pub unit_price: Option<Money>,
    pub shop_id: Option<String>,
    pub bespoke: bool,
}

//--------------------------------------      Voucher        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Voucher {
    pub id: i64,
    pub code: String,
    pub buyer_id: String,
    pub amount: Money,
    /// Set when the buyer marks the voucher for a basket; it only applies to that basket.
    pub basket_id: Option<i64>,
    pub redeemed: bool,
}

//--------------------------------------  DeliveryAddress    ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub id: i64,
    pub buyer_id: String,
    pub recipient: String,
    pub line1: String,
    pub city: String,
    pub country: String,
    pub phone: Option<String>,
}

//--------------------------------------       Buyer         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Buyer {
    pub buyer_id: String,
    pub full_name: String,
    pub email: String,
    pub loyalty_points: i64,
    pub has_ordered: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
