use crate::db_types::Order;

/// Emitted once per order the pipeline creates (never for an `already_processed` replay).
#[derive(Debug, Clone)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

/// Emitted when a payment has flipped to success but its order could not be created. Money has
/// moved, so subscribers to this event are expected to wake a human.
#[derive(Debug, Clone)]
pub struct FulfillmentFailedEvent {
    pub reference: String,
    pub payment_id: i64,
    pub reason: String,
}
