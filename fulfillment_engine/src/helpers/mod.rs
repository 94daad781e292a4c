mod idents;

pub use idents::{new_order_id, new_reference, ORDER_ID_PREFIX, REFERENCE_PREFIX};
