use log::debug;
use mps_common::Money;
use sqlx::SqliteConnection;

use crate::db_types::{Order, OrderId, ProductOrder};

pub async fn fetch_order_by_payment_id(
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE payment_id = $1").bind(payment_id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Inserts the order row. This is not atomic on its own; the caller embeds it in the
/// order-creation transaction. A UNIQUE violation on `payment_id` means another caller has
/// already fulfilled this payment and is surfaced untouched for the caller to handle.
pub async fn insert_order(
    order_id: &OrderId,
    payment_id: i64,
    buyer_id: &str,
    delivery: &str,
    loyalty_points: i64,
    conn: &mut SqliteConnection,
) -> Result<Order, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                payment_id,
                buyer_id,
                delivery,
                loyalty_points
            ) VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(payment_id)
    .bind(buyer_id)
    .bind(delivery)
    .bind(loyalty_points)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Order [{}] inserted for payment id {payment_id}", order_id);
    Ok(order)
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_product_order(
    order_ref: i64,
    product_id: &str,
    sku: &str,
    quantity: i64,
    unit_price: Money,
    shop_id: &str,
    shop_revenue: Money,
    conn: &mut SqliteConnection,
) -> Result<ProductOrder, sqlx::Error> {
    let po = sqlx::query_as(
        r#"
            INSERT INTO product_orders (
                order_ref,
                product_id,
                sku,
                quantity,
                unit_price,
                shop_id,
                shop_revenue
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(order_ref)
    .bind(product_id)
    .bind(sku)
    .bind(quantity)
    .bind(unit_price)
    .bind(shop_id)
    .bind(shop_revenue)
    .fetch_one(conn)
    .await?;
    Ok(po)
}

pub async fn fetch_product_orders(order_ref: i64, conn: &mut SqliteConnection) -> Result<Vec<ProductOrder>, sqlx::Error> {
    let rows = sqlx::query_as("SELECT * FROM product_orders WHERE order_ref = $1 ORDER BY id")
        .bind(order_ref)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

/// Flips the order's `points_credited` marker. Returns the order's point count when this call won
/// the flip, or None when the points were already credited (a replayed task).
pub async fn take_points_credit(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<(String, i64)>, sqlx::Error> {
    let row: Option<Order> = sqlx::query_as(
        "UPDATE orders SET points_credited = 1 WHERE order_id = $1 AND points_credited = 0 RETURNING *",
    )
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(row.map(|o| (o.buyer_id, o.loyalty_points)))
}
