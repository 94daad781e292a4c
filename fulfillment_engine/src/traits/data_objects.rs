use serde::Serialize;

use crate::db_types::{Order, ProductOrder};

/// An order together with the product orders created alongside it.
#[derive(Debug, Clone, Serialize)]
pub struct FulfilledOrder {
    pub order: Order,
    pub product_orders: Vec<ProductOrder>,
}
