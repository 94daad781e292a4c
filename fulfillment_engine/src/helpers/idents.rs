//! Generation of the human-readable identifiers the pipeline hands out.
//!
//! References and order ids are random rather than sequential so they leak no volume
//! information, and they are checked against the relevant UNIQUE index before use (the issuer
//! retries on the vanishingly-rare collision rather than assuming uniqueness).
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};

use crate::db_types::OrderId;

pub const REFERENCE_PREFIX: &str = "MPS";
pub const ORDER_ID_PREFIX: &str = "ORD";

fn random_block(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Mints a payment reference, e.g. `MPS-7GQ2KX94BD`.
pub fn new_reference() -> String {
    format!("{REFERENCE_PREFIX}-{}", random_block(10))
}

/// Mints an order id carrying the order date, e.g. `ORD-20260807-K4Q7ZP`.
pub fn new_order_id() -> OrderId {
    let date = Utc::now().format("%Y%m%d");
    OrderId(format!("{ORDER_ID_PREFIX}-{date}-{}", random_block(6)))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn references_carry_the_prefix_and_length() {
        let r = new_reference();
        assert!(r.starts_with("MPS-"));
        assert_eq!(r.len(), 14);
        assert!(r.chars().all(|c| c == '-' || c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn order_ids_embed_the_date() {
        let oid = new_order_id();
        let date = Utc::now().format("%Y%m%d").to_string();
        assert!(oid.as_str().starts_with(&format!("ORD-{date}-")));
    }

    #[test]
    fn mini_fuzz() {
        for _ in 0..1000 {
            let r = new_reference();
            assert_eq!(r.len(), 14);
        }
    }
}
