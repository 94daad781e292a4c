use sqlx::SqliteConnection;

use crate::db_types::Buyer;

pub async fn fetch_buyer(buyer_id: &str, conn: &mut SqliteConnection) -> Result<Option<Buyer>, sqlx::Error> {
    let buyer =
        sqlx::query_as("SELECT * FROM buyers WHERE buyer_id = $1").bind(buyer_id).fetch_optional(conn).await?;
    Ok(buyer)
}

pub async fn add_loyalty_points(buyer_id: &str, points: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE buyers SET loyalty_points = loyalty_points + $2, updated_at = CURRENT_TIMESTAMP WHERE buyer_id = $1",
    )
    .bind(buyer_id)
    .bind(points)
    .execute(conn)
    .await?;
    Ok(())
}

/// Naturally idempotent; replays are no-ops.
pub async fn mark_buyer_ordered(buyer_id: &str, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE buyers SET has_ordered = 1, updated_at = CURRENT_TIMESTAMP WHERE buyer_id = $1")
        .bind(buyer_id)
        .execute(conn)
        .await?;
    Ok(())
}
