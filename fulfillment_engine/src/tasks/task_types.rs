use serde::{Deserialize, Serialize};

use crate::{
    db_types::{OrderId, Payment},
    traits::{FulfilledOrder, Receipt, ReceiptLine},
};

/// A single queued side-effect instruction. Tasks are self-contained: everything a task needs is
/// in its payload, so re-running one never depends on state that may have moved since enqueue.
/// Delivery is at-least-once; each variant is safe to repeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task_type", content = "payload")]
pub enum WorkerTask {
    /// Tell a shop that items of theirs were just ordered.
    NotifyShop { shop_id: String, order_id: OrderId, item_count: i64 },
    /// Confirm the order to the buyer in-app / by push.
    NotifyBuyer { buyer_id: String, order_id: OrderId },
    /// Send the buyer their receipt email (the mailer attaches the generated PDF).
    EmailReceipt { receipt: Receipt },
    /// Surface the new order on the admin dashboard feed.
    NotifyAdmins { order_id: OrderId, buyer_id: String },
    /// Credit the order's loyalty points to the buyer's balance.
    CreditLoyaltyPoints { order_id: OrderId },
    /// Flip the buyer's first-order marker.
    MarkBuyerOrdered { buyer_id: String },
    /// Tell a shop owner that pending revenue has been recorded for payout.
    NotifyShopRevenue { shop_id: String, order_id: OrderId, amount: mps_common::Money },
}

/// Builds the ordered task list implied by a freshly created order.
///
/// One `NotifyShop` per distinct shop, the buyer-facing notifications, the receipt email, the
/// admin feed entry, the loyalty credit, the first-order marker and one revenue notification per
/// shop. The ordering is deliberate: buyer- and shop-facing messages first, bookkeeping last.
pub fn tasks_for_order(payment: &Payment, fulfilled: &FulfilledOrder, buyer_name: &str, buyer_email: &str) -> Vec<WorkerTask> {
    let order = &fulfilled.order;
    let mut tasks = Vec::new();

    let mut shops: Vec<String> = Vec::new();
    for po in &fulfilled.product_orders {
        if !shops.contains(&po.shop_id) {
            shops.push(po.shop_id.clone());
        }
    }
    for shop_id in &shops {
        let item_count = fulfilled.product_orders.iter().filter(|po| &po.shop_id == shop_id).count() as i64;
        tasks.push(WorkerTask::NotifyShop { shop_id: shop_id.clone(), order_id: order.order_id.clone(), item_count });
    }

    tasks.push(WorkerTask::NotifyBuyer { buyer_id: order.buyer_id.clone(), order_id: order.order_id.clone() });

    let lines = fulfilled
        .product_orders
        .iter()
        .map(|po| ReceiptLine {
            description: format!("{} ({})", po.product_id, po.sku),
            quantity: po.quantity,
            unit_price: po.unit_price,
        })
        .collect();
    tasks.push(WorkerTask::EmailReceipt {
        receipt: Receipt {
            email: buyer_email.to_string(),
            full_name: buyer_name.to_string(),
            order_id: order.order_id.as_str().to_string(),
            total: payment.total,
            currency: payment.currency.clone(),
            lines,
        },
    });

    tasks.push(WorkerTask::NotifyAdmins { order_id: order.order_id.clone(), buyer_id: order.buyer_id.clone() });
    tasks.push(WorkerTask::CreditLoyaltyPoints { order_id: order.order_id.clone() });
    tasks.push(WorkerTask::MarkBuyerOrdered { buyer_id: order.buyer_id.clone() });

    for shop_id in &shops {
        let amount: mps_common::Money =
            fulfilled.product_orders.iter().filter(|po| &po.shop_id == shop_id).map(|po| po.shop_revenue).sum();
        if amount.value() > 0 {
            tasks.push(WorkerTask::NotifyShopRevenue {
                shop_id: shop_id.clone(),
                order_id: order.order_id.clone(),
                amount,
            });
        }
    }

    tasks
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use mps_common::Money;

    use super::*;
    use crate::db_types::{Order, PaymentStatus, ProductOrder, ProductOrderStatus, RevenueStatus};

    fn payment() -> Payment {
        Payment {
            id: 7,
            reference: "MPS-TESTREF001".into(),
            basket_id: 1,
            buyer_id: "buyer-1".into(),
            status: PaymentStatus::Success,
            amount: Money::from_naira(9_000),
            items_total: Money::from_naira(8_000),
            delivery_fee: Money::from_naira(1_000),
            voucher_amount: Money::from(0),
            total: Money::from_naira(9_000),
            currency: "NGN".into(),
            stripe_intent_id: None,
            stripe_client_secret: None,
            channel: Some("card".into()),
            paid_at: Some(Utc::now()),
            fees: Some(Money::from(10_000)),
            gateway_log: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn product_order(shop: &str, revenue: i64) -> ProductOrder {
        ProductOrder {
            id: 0,
            order_ref: 3,
            product_id: "prod-1".into(),
            sku: "sku-1".into(),
            quantity: 1,
            unit_price: Money::from_naira(4_000),
            shop_id: shop.into(),
            status: ProductOrderStatus::OrderPlaced,
            shop_revenue: Money::from(revenue),
            revenue_status: RevenueStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn fulfilled(pos: Vec<ProductOrder>) -> FulfilledOrder {
        FulfilledOrder {
            order: Order {
                id: 3,
                order_id: OrderId("ORD-20260807-ABC123".into()),
                payment_id: 7,
                buyer_id: "buyer-1".into(),
                delivery: "{}".into(),
                loyalty_points: 8,
                points_credited: false,
                created_at: Utc::now(),
            },
            product_orders: pos,
        }
    }

    #[test]
    fn one_shop_notification_per_distinct_shop() {
        let f = fulfilled(vec![product_order("shop-a", 100), product_order("shop-a", 100), product_order("shop-b", 50)]);
        let tasks = tasks_for_order(&payment(), &f, "Ada", "ada@example.com");
        let shop_notes = tasks.iter().filter(|t| matches!(t, WorkerTask::NotifyShop { .. })).count();
        assert_eq!(shop_notes, 2);
        let revenue_notes = tasks.iter().filter(|t| matches!(t, WorkerTask::NotifyShopRevenue { .. })).count();
        assert_eq!(revenue_notes, 2);
    }

    #[test]
    fn zero_revenue_shops_get_no_revenue_notification() {
        let f = fulfilled(vec![product_order("shop-a", 0)]);
        let tasks = tasks_for_order(&payment(), &f, "Ada", "ada@example.com");
        assert!(!tasks.iter().any(|t| matches!(t, WorkerTask::NotifyShopRevenue { .. })));
    }

    #[test]
    fn task_payloads_round_trip_through_json() {
        let f = fulfilled(vec![product_order("shop-a", 100)]);
        let tasks = tasks_for_order(&payment(), &f, "Ada", "ada@example.com");
        let json = serde_json::to_string(&tasks).unwrap();
        let back: Vec<WorkerTask> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tasks);
    }
}
