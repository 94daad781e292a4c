use std::fmt::Debug;

use log::*;
use mps_common::VerifiedPayment;
use serde::Serialize;

use crate::{
    db_types::{Order, Payment, ProductOrder},
    events::{EventProducers, FulfillmentFailedEvent, OrderCreatedEvent},
    helpers::new_order_id,
    pricing,
    tasks::tasks_for_order,
    traits::{FulfillmentDatabase, FulfillmentError, TaskQueue},
};

/// The result of pushing one verified payment through the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct FulfillmentOutcome {
    pub payment: Payment,
    pub order: Order,
    pub product_orders: Vec<ProductOrder>,
    pub added_points: i64,
    /// True when a previous call (or a concurrent one that won the race) already created the
    /// order. Nothing was mutated and no tasks were enqueued by this call.
    pub already_processed: bool,
}

/// `FulfillmentApi` is the order fulfillment orchestrator: the single entry point that turns a
/// successful gateway verification into a durable order, whichever door the signal came through
/// (frontend poll or webhook).
///
/// The API holds no locks. Idempotency rests on three storage-level guards, in order:
/// the guarded pending→success update, the UNIQUE constraint on `orders.payment_id`, and the
/// queue's primary-key dedup on the payment reference.
pub struct FulfillmentApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for FulfillmentApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FulfillmentApi")
    }
}

impl<B> FulfillmentApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> FulfillmentApi<B>
where B: FulfillmentDatabase + TaskQueue
{
    /// Processes a verified payment signal for `reference`.
    ///
    /// 1. Load the payment (NotFound if the reference is unknown).
    /// 2. Apply the pending→success transition; a repeat call finds it already flipped and the
    ///    stored verification metadata wins.
    /// 3. If an order already references this payment, return it with `already_processed` set:
    ///    no inventory mutation, no new tasks.
    /// 4. Recompute the loyalty points from the payment's recorded item subtotal (pure, so a
    ///    retry computes the same number).
    /// 5. Create the order, its product orders, the stock decrements, the voucher redemption and
    ///    the basket deletion in one transaction.
    /// 6. Enqueue the side-effect job, keyed by the reference.
    ///
    /// A failure after the payment has flipped is surfaced as
    /// [`FulfillmentError::OrderCreationFailed`] and published to the fulfillment-failed hook:
    /// money has moved, so this path must reach an operator, never a log file alone.
    pub async fn process_payment(
        &self,
        reference: &str,
        verified: &VerifiedPayment,
    ) -> Result<FulfillmentOutcome, FulfillmentError> {
        self.db
            .fetch_payment_by_reference(reference)
            .await?
            .ok_or_else(|| FulfillmentError::PaymentNotFound(reference.to_string()))?;

        let (payment, flipped) = self.db.confirm_payment(reference, verified).await?;
        if flipped {
            debug!("🔄️💰️ Payment [{reference}] transitioned to success");
        } else {
            trace!("🔄️💰️ Payment [{reference}] was already successful");
        }

        let added_points = pricing::loyalty_points_for(payment.items_total);

        if let Some(existing) = self.db.fetch_order_by_payment_id(payment.id).await? {
            debug!("🔄️📦️ Order {} already exists for [{reference}]. Returning it unchanged.", existing.order_id);
            let product_orders = self.db.fetch_product_orders(existing.id).await?;
            return Ok(FulfillmentOutcome {
                payment,
                order: existing,
                product_orders,
                added_points,
                already_processed: true,
            });
        }

        match self.create_order_and_enqueue(&payment, added_points).await {
            Ok((order, product_orders, inserted)) => {
                if inserted {
                    info!(
                        "🔄️📦️ Order {} created for [{reference}]: {} line(s), {} point(s)",
                        order.order_id,
                        product_orders.len(),
                        added_points
                    );
                } else {
                    debug!("🔄️📦️ Lost the creation race for [{reference}]; returning the winner's order");
                }
                Ok(FulfillmentOutcome { payment, order, product_orders, added_points, already_processed: !inserted })
            },
            Err(e) => {
                error!(
                    "🚨️ Payment [{reference}] (id {}) is successful but order creation failed: {e}. Manual \
                     reconciliation required.",
                    payment.id
                );
                self.call_fulfillment_failed_hook(&payment, &e).await;
                Err(FulfillmentError::OrderCreationFailed {
                    reference: reference.to_string(),
                    payment_id: payment.id,
                    reason: e.to_string(),
                })
            },
        }
    }

    async fn create_order_and_enqueue(
        &self,
        payment: &Payment,
        added_points: i64,
    ) -> Result<(Order, Vec<ProductOrder>, bool), FulfillmentError> {
        let buyer = self
            .db
            .fetch_buyer(&payment.buyer_id)
            .await?
            .ok_or_else(|| FulfillmentError::BuyerNotFound(payment.buyer_id.clone()))?;

        let (fulfilled, inserted) = self.db.create_order_for_payment(payment, new_order_id(), added_points).await?;
        if !inserted {
            return Ok((fulfilled.order, fulfilled.product_orders, false));
        }

        let tasks = tasks_for_order(payment, &fulfilled, &buyer.full_name, &buyer.email);
        let queued = self.db.enqueue_job(&payment.reference, &tasks).await?;
        if queued {
            debug!("🔄️📬️ Enqueued {} task(s) for [{}]", tasks.len(), payment.reference);
        } else {
            // The queue's primary-key dedup caught a replay the order lookup missed.
            debug!("🔄️📬️ A job for [{}] is already queued. Skipping enqueue.", payment.reference);
        }
        self.call_order_created_hook(&fulfilled.order).await;
        Ok((fulfilled.order, fulfilled.product_orders, true))
    }

    async fn call_order_created_hook(&self, order: &Order) {
        for emitter in &self.producers.order_created_producer {
            trace!("🔄️📦️ Notifying order created hook subscribers");
            let event = OrderCreatedEvent { order: order.clone() };
            emitter.publish_event(event).await;
        }
    }

    async fn call_fulfillment_failed_hook(&self, payment: &Payment, error: &FulfillmentError) {
        for emitter in &self.producers.fulfillment_failed_producer {
            let event = FulfillmentFailedEvent {
                reference: payment.reference.clone(),
                payment_id: payment.id,
                reason: error.to_string(),
            };
            emitter.publish_event(event).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}
