use sqlx::SqliteConnection;

use crate::db_types::DeliveryAddress;

/// Fetches a delivery address, scoped to its owner so one buyer can never ship to another's
/// address book entry.
pub async fn fetch_address(
    address_id: i64,
    buyer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<DeliveryAddress>, sqlx::Error> {
    let address = sqlx::query_as("SELECT * FROM delivery_addresses WHERE id = $1 AND buyer_id = $2")
        .bind(address_id)
        .bind(buyer_id)
        .fetch_optional(conn)
        .await?;
    Ok(address)
}
