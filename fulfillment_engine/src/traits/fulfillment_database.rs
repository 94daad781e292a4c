use mps_common::VerifiedPayment;
use thiserror::Error;

use crate::{
    db_types::{NewPayment, Order, OrderId, Payment},
    traits::{BasketStore, FulfilledOrder},
};

/// This trait defines the highest level of behaviour for backends supporting the fulfillment
/// pipeline.
///
/// This behaviour includes:
/// * Issuing and locating payment records for checkout attempts
/// * The pending → success payment transition (the state machine's single edge)
/// * Creating exactly one order per successful payment, with its line items and stock decrements
/// * The idempotent per-task writes the queue worker performs
#[allow(async_fn_in_trait)]
pub trait FulfillmentDatabase: Clone + BasketStore {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Fetches the payment for the given reference, if any.
    async fn fetch_payment_by_reference(&self, reference: &str) -> Result<Option<Payment>, FulfillmentError>;

    /// Fetches the pending payment for the given basket, if one exists. Used by the reference
    /// issuer to hand back the same reference on repeated checkout calls.
    async fn fetch_pending_payment_for_basket(&self, basket_id: i64) -> Result<Option<Payment>, FulfillmentError>;

    /// Inserts a new pending payment. The reference carries a UNIQUE constraint; a collision is
    /// reported as [`FulfillmentError::ReferenceCollision`] so the issuer can mint a fresh
    /// reference and retry.
    async fn insert_pending_payment(&self, payment: NewPayment) -> Result<Payment, FulfillmentError>;

    /// Applies the pending → success transition for the given reference in a single guarded
    /// update.
    ///
    /// Returns the payment record and a flag indicating whether *this* call flipped the status.
    /// If the payment is already `Success`, the stored record is returned unchanged with the flag
    /// set to false; verification metadata from a later call never overwrites the first. The
    /// transition is monotonic; nothing in this pipeline moves a payment back to pending.
    async fn confirm_payment(
        &self,
        reference: &str,
        verified: &VerifiedPayment,
    ) -> Result<(Payment, bool), FulfillmentError>;

    /// Finds the payment whose Stripe intent matches `intent_id`. The webhook ingress falls back
    /// to this when an event arrives without the reference in its metadata.
    async fn fetch_payment_by_stripe_intent(&self, intent_id: &str) -> Result<Option<Payment>, FulfillmentError>;

    /// Records the Stripe intent id and client secret minted for a pending payment, returning
    /// the updated record. A payment that has already succeeded is returned unchanged.
    async fn attach_stripe_intent(
        &self,
        reference: &str,
        intent_id: &str,
        client_secret: &str,
    ) -> Result<Payment, FulfillmentError>;

    /// Fetches the order created from the given payment, if one exists.
    async fn fetch_order_by_payment_id(&self, payment_id: i64) -> Result<Option<Order>, FulfillmentError>;

    /// Fetches an order by its public order id.
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, FulfillmentError>;

    /// Creates the order for a successful payment in one atomic transaction:
    ///
    /// * requires the basket behind the payment to still exist and to have a resolved delivery
    ///   address;
    /// * inserts the order row and one product-order row per basket line, with prices locked at
    ///   the catalog price at this instant (lines whose variation has vanished are skipped);
    /// * decrements each non-bespoke variation's stock with a floor-guarded update;
    /// * redeems the applied voucher, if any;
    /// * deletes the basket.
    ///
    /// If another caller has already created the order for this payment (detected up front, or
    /// via the UNIQUE constraint on `orders.payment_id` losing a race), the winner's order is
    /// returned with `inserted == false` and nothing is mutated.
    async fn create_order_for_payment(
        &self,
        payment: &Payment,
        order_id: OrderId,
        loyalty_points: i64,
    ) -> Result<(FulfilledOrder, bool), FulfillmentError>;

    /// Fetches the product orders belonging to an order.
    async fn fetch_product_orders(&self, order_ref: i64) -> Result<Vec<crate::db_types::ProductOrder>, FulfillmentError>;

    /// Credits the order's loyalty points to its buyer. Guarded by the order's `points_credited`
    /// flag, so re-running the task is harmless. Returns true if this call performed the credit.
    async fn credit_loyalty_points(&self, order_id: &OrderId) -> Result<bool, FulfillmentError>;

    /// Marks the buyer as having placed at least one order. Naturally idempotent.
    async fn mark_buyer_ordered(&self, buyer_id: &str) -> Result<(), FulfillmentError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), FulfillmentError> {
        Ok(())
    }
}

/// Everything the orchestrator needs from one backend: the fulfillment store plus the task
/// queue. Blanket-implemented, so any backend providing both traits qualifies.
pub trait PipelineDatabase: FulfillmentDatabase + crate::traits::TaskQueue {}

impl<T: FulfillmentDatabase + crate::traits::TaskQueue> PipelineDatabase for T {}

#[derive(Debug, Clone, Error)]
pub enum FulfillmentError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("No payment exists for reference {0}")]
    PaymentNotFound(String),
    #[error("A payment reference collided with an existing one: {0}")]
    ReferenceCollision(String),
    #[error("The basket (id {0}) behind this payment no longer exists")]
    BasketNotFound(i64),
    #[error("Buyer {0} has no open basket")]
    NoOpenBasket(String),
    #[error("The basket (id {0}) has no line items")]
    EmptyBasket(i64),
    #[error("Buyer {0} is not known to the pipeline")]
    BuyerNotFound(String),
    #[error("Payment {0} has no resolved delivery address")]
    DeliveryAddressMissing(String),
    #[error("Not enough stock of {product_id}/{sku} to cover {requested} unit(s)")]
    InsufficientStock { product_id: String, sku: String, requested: i64 },
    #[error("An order already exists for payment id {0}")]
    OrderAlreadyExists(i64),
    #[error(
        "Payment {reference} (id {payment_id}) is marked successful but its order could not be created: {reason}. \
         Manual reconciliation is required."
    )]
    OrderCreationFailed { reference: String, payment_id: i64, reason: String },
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("No queued job exists with id {0}")]
    JobNotFound(String),
    #[error("Could not serialize task payload: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for FulfillmentError {
    fn from(e: sqlx::Error) -> Self {
        FulfillmentError::DatabaseError(e.to_string())
    }
}
