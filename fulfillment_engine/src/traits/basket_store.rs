use crate::{
    db_types::{Basket, BasketItem, Buyer, DeliveryAddress, PricedLine, Voucher},
    traits::FulfillmentError,
};

/// Read access to the checkout-side state the pipeline consumes: baskets, their lines joined
/// against the catalog, vouchers and address books. Basket CRUD itself belongs to the wider
/// application; the pipeline only ever reads here (and deletes the basket inside the
/// order-creation transaction).
#[allow(async_fn_in_trait)]
pub trait BasketStore: Clone {
    async fn fetch_buyer(&self, buyer_id: &str) -> Result<Option<Buyer>, FulfillmentError>;

    /// Fetches the buyer's open basket. At most one exists per buyer.
    async fn fetch_basket_for_buyer(&self, buyer_id: &str) -> Result<Option<Basket>, FulfillmentError>;

    async fn fetch_basket(&self, basket_id: i64) -> Result<Option<Basket>, FulfillmentError>;

    async fn fetch_basket_items(&self, basket_id: i64) -> Result<Vec<BasketItem>, FulfillmentError>;

    /// Fetches the basket lines left-joined against the catalog. Lines whose variation has been
    /// removed from the catalog come back with no price and are skipped by the pricing engine.
    async fn fetch_priced_lines(&self, basket_id: i64) -> Result<Vec<PricedLine>, FulfillmentError>;

    /// Fetches the voucher marked for this basket, but only if it belongs to the given buyer and
    /// has not been redeemed. Anything else prices as "no voucher".
    async fn fetch_voucher_for_basket(&self, basket_id: i64, buyer_id: &str)
        -> Result<Option<Voucher>, FulfillmentError>;

    /// Fetches a delivery address, scoped to its owner.
    async fn fetch_address(&self, address_id: i64, buyer_id: &str) -> Result<Option<DeliveryAddress>, FulfillmentError>;
}
