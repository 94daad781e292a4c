//! `SqliteDatabase` is a concrete implementation of a fulfillment pipeline backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the
//! [`crate::traits`] module. Correctness under concurrent verify calls comes entirely from the
//! constraints and guarded updates in the schema; nothing here takes a lock.
use std::fmt::Debug;

use chrono::Duration;
use log::*;
use mps_common::VerifiedPayment;
use sqlx::SqlitePool;

use super::db::{addresses, baskets, buyers, db_url, exchange_rates, new_pool, orders, payments, products, queue, vouchers};
use crate::{
    db_types::{
        Basket,
        BasketItem,
        Buyer,
        DeliveryAddress,
        NewPayment,
        Order,
        OrderId,
        Payment,
        PricedLine,
        ProductOrder,
        Voucher,
    },
    mpe_api::exchange_objects::ExchangeRate,
    pricing,
    tasks::WorkerTask,
    traits::{
        BasketStore,
        ExchangeRateError,
        ExchangeRates,
        FulfilledOrder,
        FulfillmentDatabase,
        FulfillmentError,
        JobStatus,
        QueuedJob,
        TaskQueue,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database instance using the URL from the environment (`MPS_DATABASE_URL`).
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl BasketStore for SqliteDatabase {
    async fn fetch_buyer(&self, buyer_id: &str) -> Result<Option<Buyer>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(buyers::fetch_buyer(buyer_id, &mut conn).await?)
    }

    async fn fetch_basket_for_buyer(&self, buyer_id: &str) -> Result<Option<Basket>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(baskets::fetch_basket_for_buyer(buyer_id, &mut conn).await?)
    }

    async fn fetch_basket(&self, basket_id: i64) -> Result<Option<Basket>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(baskets::fetch_basket(basket_id, &mut conn).await?)
    }

    async fn fetch_basket_items(&self, basket_id: i64) -> Result<Vec<BasketItem>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(baskets::fetch_basket_items(basket_id, &mut conn).await?)
    }

    async fn fetch_priced_lines(&self, basket_id: i64) -> Result<Vec<PricedLine>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(baskets::fetch_priced_lines(basket_id, &mut conn).await?)
    }

    async fn fetch_voucher_for_basket(
        &self,
        basket_id: i64,
        buyer_id: &str,
    ) -> Result<Option<Voucher>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(vouchers::fetch_voucher_for_basket(basket_id, buyer_id, &mut conn).await?)
    }

    async fn fetch_address(&self, address_id: i64, buyer_id: &str) -> Result<Option<DeliveryAddress>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(addresses::fetch_address(address_id, buyer_id, &mut conn).await?)
    }
}

impl FulfillmentDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch_payment_by_reference(&self, reference: &str) -> Result<Option<Payment>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payment_by_reference(reference, &mut conn).await?)
    }

    async fn fetch_pending_payment_for_basket(&self, basket_id: i64) -> Result<Option<Payment>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_pending_payment_for_basket(basket_id, &mut conn).await?)
    }

    async fn insert_pending_payment(&self, payment: NewPayment) -> Result<Payment, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        payments::insert_pending_payment(payment, &mut conn).await
    }

    async fn confirm_payment(
        &self,
        reference: &str,
        verified: &VerifiedPayment,
    ) -> Result<(Payment, bool), FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        payments::confirm_payment(reference, verified, &mut conn).await
    }

    async fn fetch_payment_by_stripe_intent(&self, intent_id: &str) -> Result<Option<Payment>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payment_by_stripe_intent(intent_id, &mut conn).await?)
    }

    async fn attach_stripe_intent(
        &self,
        reference: &str,
        intent_id: &str,
        client_secret: &str,
    ) -> Result<Payment, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        payments::attach_stripe_intent(reference, intent_id, client_secret, &mut conn).await
    }

    async fn fetch_order_by_payment_id(&self, payment_id: i64) -> Result<Option<Order>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_payment_id(payment_id, &mut conn).await?)
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_order_id(order_id, &mut conn).await?)
    }

    /// The whole multi-step order creation runs in one transaction: a failure anywhere rolls
    /// back the order, its lines, every stock decrement, the voucher redemption and the basket
    /// deletion together, so a half-created order can never be observed.
    async fn create_order_for_payment(
        &self,
        payment: &Payment,
        order_id: OrderId,
        loyalty_points: i64,
    ) -> Result<(FulfilledOrder, bool), FulfillmentError> {
        let mut tx = self.pool.begin().await?;

        if let Some(existing) = orders::fetch_order_by_payment_id(payment.id, &mut tx).await? {
            let product_orders = orders::fetch_product_orders(existing.id, &mut tx).await?;
            return Ok((FulfilledOrder { order: existing, product_orders }, false));
        }

        let basket = baskets::fetch_basket(payment.basket_id, &mut tx)
            .await?
            .ok_or(FulfillmentError::BasketNotFound(payment.basket_id))?;
        let address_id = basket
            .delivery_address_id
            .ok_or_else(|| FulfillmentError::DeliveryAddressMissing(payment.reference.clone()))?;
        let address = addresses::fetch_address(address_id, &basket.buyer_id, &mut tx)
            .await?
            .ok_or_else(|| FulfillmentError::DeliveryAddressMissing(payment.reference.clone()))?;
        let delivery =
            serde_json::to_string(&address).map_err(|e| FulfillmentError::SerializationError(e.to_string()))?;

        let lines = baskets::fetch_priced_lines(basket.id, &mut tx).await?;
        if lines.is_empty() {
            return Err(FulfillmentError::EmptyBasket(basket.id));
        }

        let order = match orders::insert_order(
            &order_id,
            payment.id,
            &payment.buyer_id,
            &delivery,
            loyalty_points,
            &mut tx,
        )
        .await
        {
            Ok(order) => order,
            Err(sqlx::Error::Database(de)) if de.is_unique_violation() => {
                // Another verify call or the webhook won the race between our dedup check and
                // this insert. Roll back and hand the winner's order back instead.
                drop(tx);
                debug!("🗃️ Payment id {} was fulfilled concurrently. Fetching the winner's order.", payment.id);
                let mut conn = self.pool.acquire().await?;
                let existing = orders::fetch_order_by_payment_id(payment.id, &mut conn)
                    .await?
                    .ok_or(FulfillmentError::OrderAlreadyExists(payment.id))?;
                let product_orders = orders::fetch_product_orders(existing.id, &mut conn).await?;
                return Ok((FulfilledOrder { order: existing, product_orders }, false));
            },
            Err(e) => return Err(e.into()),
        };

        let mut product_orders = Vec::with_capacity(lines.len());
        for line in &lines {
            // lines whose catalog entry has vanished are skipped, mirroring the pricing engine
            let (Some(unit_price), Some(shop_id)) = (line.unit_price, line.shop_id.as_deref()) else {
                warn!(
                    "🗃️ Skipping basket line {}/{}: no longer in the catalog (order {})",
                    line.product_id, line.sku, order.order_id
                );
                continue;
            };
            let revenue = pricing::shop_revenue_for(unit_price * line.quantity);
            let po = orders::insert_product_order(
                order.id,
                &line.product_id,
                &line.sku,
                line.quantity,
                unit_price,
                shop_id,
                revenue,
                &mut tx,
            )
            .await?;
            if !line.bespoke {
                let decremented = products::decrement_stock(&line.product_id, &line.sku, line.quantity, &mut tx).await?;
                if !decremented {
                    return Err(FulfillmentError::InsufficientStock {
                        product_id: line.product_id.clone(),
                        sku: line.sku.clone(),
                        requested: line.quantity,
                    });
                }
            }
            product_orders.push(po);
        }

        if let Some(voucher) = vouchers::fetch_voucher_for_basket(basket.id, &basket.buyer_id, &mut tx).await? {
            vouchers::redeem_voucher(voucher.id, &mut tx).await?;
        }
        baskets::delete_basket(basket.id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order [{}] committed with {} line(s)", order.order_id, product_orders.len());
        Ok((FulfilledOrder { order, product_orders }, true))
    }

    async fn fetch_product_orders(&self, order_ref: i64) -> Result<Vec<ProductOrder>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_product_orders(order_ref, &mut conn).await?)
    }

    async fn credit_loyalty_points(&self, order_id: &OrderId) -> Result<bool, FulfillmentError> {
        let mut tx = self.pool.begin().await?;
        let Some((buyer_id, points)) = orders::take_points_credit(order_id, &mut tx).await? else {
            return Ok(false);
        };
        buyers::add_loyalty_points(&buyer_id, points, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Credited {points} point(s) to buyer {buyer_id} for order {order_id}");
        Ok(true)
    }

    async fn mark_buyer_ordered(&self, buyer_id: &str) -> Result<(), FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        Ok(buyers::mark_buyer_ordered(buyer_id, &mut conn).await?)
    }
}

impl TaskQueue for SqliteDatabase {
    async fn enqueue_job(&self, job_id: &str, tasks: &[WorkerTask]) -> Result<bool, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        queue::enqueue_job(job_id, tasks, &mut conn).await
    }

    async fn claim_due_job(&self) -> Result<Option<QueuedJob>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        queue::claim_due_job(&mut conn).await
    }

    async fn complete_job(&self, job_id: &str) -> Result<(), FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        queue::complete_job(job_id, &mut conn).await
    }

    async fn retry_or_bury_job(
        &self,
        job_id: &str,
        max_attempts: i64,
        base_backoff: Duration,
    ) -> Result<JobStatus, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        queue::retry_or_bury_job(job_id, max_attempts, base_backoff, &mut conn).await
    }

    async fn requeue_stale_jobs(&self, stale_after: Duration) -> Result<u64, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        queue::requeue_stale_jobs(stale_after, &mut conn).await
    }

    async fn fetch_job(&self, job_id: &str) -> Result<Option<QueuedJob>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        queue::fetch_job(job_id, &mut conn).await
    }
}

impl ExchangeRates for SqliteDatabase {
    async fn fetch_last_rate(&self, currency: &str) -> Result<ExchangeRate, ExchangeRateError> {
        let mut conn =
            self.pool.acquire().await.map_err(|e| ExchangeRateError::DatabaseError(e.to_string()))?;
        exchange_rates::fetch_last_rate(currency, &mut conn).await
    }

    async fn set_exchange_rate(&self, rate: &ExchangeRate) -> Result<(), ExchangeRateError> {
        let mut conn =
            self.pool.acquire().await.map_err(|e| ExchangeRateError::DatabaseError(e.to_string()))?;
        exchange_rates::set_exchange_rate(rate, &mut conn).await
    }
}
