//! The pricing engine.
//!
//! Pure functions from a basket snapshot to a costing. Nothing here touches storage; the caller
//! supplies the catalog-joined lines, the (already validated) voucher amount and the delivery
//! tariff inputs, and presentation-currency conversion happens strictly downstream via the cached
//! exchange rate.
use mps_common::Money;
use serde::Serialize;

use crate::db_types::PricedLine;

/// Flat delivery tariff, in minor units. The original storefront ships from one country, so the
/// tariff only distinguishes domestic vs international and standard vs express.
const DOMESTIC_STANDARD_FEE: Money = Money::from_minor(100_000); // ₦1,000
const DOMESTIC_EXPRESS_FEE: Money = Money::from_minor(250_000); // ₦2,500
const INTERNATIONAL_STANDARD_FEE: Money = Money::from_minor(1_500_000); // ₦15,000
const INTERNATIONAL_EXPRESS_FEE: Money = Money::from_minor(3_000_000); // ₦30,000

pub const HOME_COUNTRY: &str = "NG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMethod {
    Standard,
    Express,
}

impl DeliveryMethod {
    pub fn parse_or_standard(value: Option<&str>) -> Self {
        match value.map(|s| s.to_ascii_lowercase()) {
            Some(s) if s == "express" => Self::Express,
            _ => Self::Standard,
        }
    }
}

/// The delivery fee for a destination country and method.
pub fn delivery_fee_for(country: &str, method: DeliveryMethod) -> Money {
    let domestic = country.eq_ignore_ascii_case(HOME_COUNTRY);
    match (domestic, method) {
        (true, DeliveryMethod::Standard) => DOMESTIC_STANDARD_FEE,
        (true, DeliveryMethod::Express) => DOMESTIC_EXPRESS_FEE,
        (false, DeliveryMethod::Standard) => INTERNATIONAL_STANDARD_FEE,
        (false, DeliveryMethod::Express) => INTERNATIONAL_EXPRESS_FEE,
    }
}

/// Per-line breakdown parallel to the basket lines that actually priced.
#[derive(Debug, Clone, Serialize)]
pub struct ItemCost {
    pub product_id: String,
    pub sku: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct BasketCosting {
    pub items_total: Money,
    pub delivery_fee: Money,
    pub voucher_amount: Money,
    /// `items_total + delivery_fee - voucher_amount`, floored at zero.
    pub total: Money,
    /// What the basket would have cost without the voucher. Equal to `total` when no voucher
    /// applied.
    pub total_without_voucher: Money,
    pub items: Vec<ItemCost>,
}

/// Prices a basket snapshot.
///
/// Lines without a catalog price (the product or variation has been deleted since the line was
/// added) are skipped rather than failing the whole basket. The voucher amount must already have
/// passed the ownership/marked-for-basket checks; pass zero for "no voucher".
pub fn price_basket(lines: &[PricedLine], voucher_amount: Money, delivery_fee: Money) -> BasketCosting {
    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let Some(unit_price) = line.unit_price else {
            continue;
        };
        items.push(ItemCost {
            product_id: line.product_id.clone(),
            sku: line.sku.clone(),
            quantity: line.quantity,
            unit_price,
            line_total: unit_price * line.quantity,
        });
    }
    let items_total: Money = items.iter().map(|i| i.line_total).sum();
    let total = (items_total + delivery_fee - voucher_amount).floored();
    let total_without_voucher = if voucher_amount.value() > 0 { total + voucher_amount } else { total };
    BasketCosting { items_total, delivery_fee, voucher_amount, total, total_without_voucher, items }
}

/// Marketplace commission, in permille of a line total.
const COMMISSION_PERMILLE: i64 = 100;

/// The vendor's share of a line: the line total less the marketplace commission.
pub fn shop_revenue_for(line_total: Money) -> Money {
    Money::from(line_total.value() * (1000 - COMMISSION_PERMILLE) / 1000)
}

/// Loyalty points accrued by a purchase: one point per ₦1,000 of the item subtotal, floored.
///
/// Deliberately a function of the payment's recorded `items_total` alone, so a retried
/// fulfillment recomputes the same value no matter what has changed in the catalog since.
pub fn loyalty_points_for(items_total: Money) -> i64 {
    (items_total.value() / 100_000).max(0)
}

#[cfg(test)]
mod test {
    use super::*;

    fn line(product: &str, naira: i64, qty: i64) -> PricedLine {
        PricedLine {
            product_id: product.to_string(),
            sku: format!("{product}-sku"),
            quantity: qty,
            unit_price: Some(Money::from_naira(naira)),
            shop_id: Some("shop-1".to_string()),
            bespoke: false,
        }
    }

    #[test]
    fn two_items_standard_delivery_no_voucher() {
        // NGN 5,000 + NGN 3,000 items, NGN 1,000 standard delivery
        let lines = vec![line("a", 5_000, 1), line("b", 3_000, 1)];
        let fee = delivery_fee_for("NG", DeliveryMethod::Standard);
        let costing = price_basket(&lines, Money::from(0), fee);
        assert_eq!(costing.items_total, Money::from_naira(8_000));
        assert_eq!(costing.delivery_fee, Money::from_naira(1_000));
        assert_eq!(costing.total, Money::from_naira(9_000));
        assert_eq!(costing.total_without_voucher, Money::from_naira(9_000));
    }

    #[test]
    fn voucher_subtracts_and_reports_undiscounted_total() {
        let lines = vec![line("a", 5_000, 1), line("b", 3_000, 1)];
        let fee = delivery_fee_for("NG", DeliveryMethod::Standard);
        let costing = price_basket(&lines, Money::from_naira(2_000), fee);
        assert_eq!(costing.total, Money::from_naira(7_000));
        assert_eq!(costing.total_without_voucher, Money::from_naira(9_000));
    }

    #[test]
    fn total_is_floored_at_zero() {
        let lines = vec![line("a", 500, 1)];
        let costing = price_basket(&lines, Money::from_naira(10_000), delivery_fee_for("NG", DeliveryMethod::Standard));
        assert_eq!(costing.total, Money::from(0));
        assert_eq!(costing.total_without_voucher, Money::from_naira(10_000));
    }

    #[test]
    fn missing_catalog_entries_are_skipped() {
        let mut lines = vec![line("a", 5_000, 2)];
        lines.push(PricedLine {
            product_id: "ghost".into(),
            sku: "ghost-sku".into(),
            quantity: 3,
            unit_price: None,
            shop_id: None,
            bespoke: false,
        });
        let costing = price_basket(&lines, Money::from(0), Money::from(0));
        assert_eq!(costing.items_total, Money::from_naira(10_000));
        assert_eq!(costing.items.len(), 1);
    }

    #[test]
    fn quantities_multiply_into_line_totals() {
        let lines = vec![line("a", 1_500, 4)];
        let costing = price_basket(&lines, Money::from(0), Money::from(0));
        assert_eq!(costing.items[0].line_total, Money::from_naira(6_000));
        assert_eq!(costing.total, Money::from_naira(6_000));
    }

    #[test]
    fn delivery_tariff_distinguishes_destination_and_method() {
        assert_eq!(delivery_fee_for("NG", DeliveryMethod::Standard), Money::from_naira(1_000));
        assert_eq!(delivery_fee_for("ng", DeliveryMethod::Express), Money::from_naira(2_500));
        assert_eq!(delivery_fee_for("GH", DeliveryMethod::Standard), Money::from_naira(15_000));
        assert_eq!(delivery_fee_for("US", DeliveryMethod::Express), Money::from_naira(30_000));
    }

    #[test]
    fn shop_revenue_deducts_the_commission() {
        assert_eq!(shop_revenue_for(Money::from_naira(1_000)), Money::from_naira(900));
        assert_eq!(shop_revenue_for(Money::from(0)), Money::from(0));
    }

    #[test]
    fn loyalty_points_floor_per_thousand_naira() {
        assert_eq!(loyalty_points_for(Money::from_naira(8_000)), 8);
        assert_eq!(loyalty_points_for(Money::from_naira(999)), 0);
        assert_eq!(loyalty_points_for(Money::from_naira(1_999)), 1);
        assert_eq!(loyalty_points_for(Money::from(-500)), 0);
    }
}
