//! Point-of-sale cart and totals.
//!
//! The cashier assembles a [`Cart`] of services and retail products, applies
//! an optional discount and loyalty redemption, and the branch's tax rate is
//! added on top. [`Cart::totals`] is the single source of the receipt
//! numbers; it runs the steps in a fixed order:
//!
//! 1. subtotal of all lines
//! 2. discount (percentage or fixed, capped at the subtotal)
//! 3. loyalty discount (capped at what is left after the discount)
//! 4. tax on the net amount
//! 5. points earned on the net amount (tax excluded)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Money;
use crate::loyalty::LoyaltyPolicy;

/// Errors raised while pricing a cart.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// Nothing to sell.
    #[error("cart is empty")]
    EmptyCart,

    /// A line has quantity zero.
    #[error("quantity for {0} must be at least 1")]
    ZeroQuantity(String),

    /// A line has a negative price.
    #[error("price for {0} cannot be negative")]
    NegativePrice(String),

    /// Percentage outside 0-100 or a negative fixed amount.
    #[error("invalid discount: {0}")]
    InvalidDiscount(String),

    /// Tax rate outside 0-1.
    #[error("invalid tax rate {0}")]
    InvalidTaxRate(Decimal),

    /// Negative points requested.
    #[error("points to redeem cannot be negative")]
    NegativeRedemption,

    /// The redemption is worth more than the amount left to pay.
    #[error("cannot redeem {requested} points, at most {max} apply to this sale")]
    RedemptionExceedsTotal { requested: i64, max: i64 },
}

/// What a line item sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Service,
    Product,
}

/// One line on the receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub kind: ItemKind,
    /// ID of the service or product.
    pub item_id: i32,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl LineItem {
    /// `unit_price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Money {
        (self.unit_price * self.quantity).round()
    }
}

/// Discount applied to the whole sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Discount {
    #[default]
    None,
    /// Percent off the subtotal, 0-100.
    Percentage(Decimal),
    /// Fixed amount off the subtotal.
    Fixed(Money),
}

impl Discount {
    fn validate(&self) -> Result<(), CartError> {
        match self {
            Self::None => Ok(()),
            Self::Percentage(p) if *p < Decimal::ZERO || *p > Decimal::ONE_HUNDRED => Err(
                CartError::InvalidDiscount(format!("percentage {p} is outside 0-100")),
            ),
            Self::Fixed(amount) if amount.is_negative() => Err(CartError::InvalidDiscount(
                format!("fixed amount {amount} is negative"),
            )),
            Self::Percentage(_) | Self::Fixed(_) => Ok(()),
        }
    }

    fn amount_for(&self, subtotal: Money) -> Money {
        let raw = match self {
            Self::None => Money::zero(),
            Self::Percentage(p) => subtotal.percent_of(*p),
            Self::Fixed(amount) => amount.round(),
        };
        raw.min(subtotal)
    }
}

/// Receipt figures for a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub points_redeemed: i64,
    pub loyalty_discount: Money,
    /// Amount after discounts, before tax.
    pub net: Money,
    pub tax: Money,
    pub total: Money,
    pub points_earned: i64,
}

/// A sale being assembled at the counter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cart {
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub discount: Discount,
    /// Tax rate as a fraction, e.g. `0.12`.
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub points_to_redeem: i64,
}

impl Cart {
    /// An empty cart taxed at `tax_rate`.
    #[must_use]
    pub fn new(tax_rate: Decimal) -> Self {
        Self {
            tax_rate,
            ..Self::default()
        }
    }

    /// Add a line, merging with an existing line for the same item.
    pub fn add_item(&mut self, item: LineItem) {
        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|i| i.kind == item.kind && i.item_id == item.item_id)
        {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
        } else {
            self.items.push(item);
        }
    }

    /// Remove the line for an item. Returns `true` if a line was removed.
    pub fn remove_item(&mut self, kind: ItemKind, item_id: i32) -> bool {
        let before = self.items.len();
        self.items
            .retain(|i| !(i.kind == kind && i.item_id == item_id));
        self.items.len() != before
    }

    /// Set the quantity of a line; zero removes it.
    pub fn set_quantity(&mut self, kind: ItemKind, item_id: i32, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove_item(kind, item_id);
        }
        match self
            .items
            .iter_mut()
            .find(|i| i.kind == kind && i.item_id == item_id)
        {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn unit_count(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    fn validate(&self) -> Result<(), CartError> {
        if self.items.is_empty() {
            return Err(CartError::EmptyCart);
        }
        for item in &self.items {
            if item.quantity == 0 {
                return Err(CartError::ZeroQuantity(item.name.clone()));
            }
            if item.unit_price.is_negative() {
                return Err(CartError::NegativePrice(item.name.clone()));
            }
        }
        self.discount.validate()?;
        if self.tax_rate < Decimal::ZERO || self.tax_rate > Decimal::ONE {
            return Err(CartError::InvalidTaxRate(self.tax_rate));
        }
        if self.points_to_redeem < 0 {
            return Err(CartError::NegativeRedemption);
        }
        Ok(())
    }

    /// Price the cart.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if the cart is empty or malformed, or if the
    /// requested redemption is worth more than the discounted subtotal.
    pub fn totals(&self, policy: &LoyaltyPolicy) -> Result<CartTotals, CartError> {
        self.validate()?;

        let subtotal: Money = self.items.iter().map(LineItem::line_total).sum();
        let discount = self.discount.amount_for(subtotal);
        let after_discount = subtotal.saturating_sub(discount);

        let max_points = policy.max_redeemable(after_discount);
        if self.points_to_redeem > max_points {
            return Err(CartError::RedemptionExceedsTotal {
                requested: self.points_to_redeem,
                max: max_points,
            });
        }
        let loyalty_discount = policy
            .redemption_value(self.points_to_redeem)
            .min(after_discount);

        let net = after_discount.saturating_sub(loyalty_discount);
        let tax = net.apply_rate(self.tax_rate);
        let total = (net + tax).round();

        Ok(CartTotals {
            subtotal,
            discount,
            points_redeemed: self.points_to_redeem,
            loyalty_discount,
            net,
            tax,
            total,
            points_earned: policy.points_for(net),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn haircut() -> LineItem {
        LineItem {
            kind: ItemKind::Service,
            item_id: 1,
            name: "Haircut".to_string(),
            unit_price: Money::from_minor(50_000),
            quantity: 1,
        }
    }

    fn shampoo(quantity: u32) -> LineItem {
        LineItem {
            kind: ItemKind::Product,
            item_id: 1,
            name: "Argan Shampoo".to_string(),
            unit_price: Money::from_minor(35_050),
            quantity,
        }
    }

    fn vat() -> Decimal {
        Decimal::new(12, 2)
    }

    #[test]
    fn test_plain_sale() {
        let mut cart = Cart::new(vat());
        cart.add_item(haircut());
        cart.add_item(shampoo(2));

        let totals = cart.totals(&LoyaltyPolicy::default()).unwrap();
        assert_eq!(totals.subtotal, Money::from_minor(120_100));
        assert_eq!(totals.discount, Money::zero());
        assert_eq!(totals.net, Money::from_minor(120_100));
        assert_eq!(totals.tax, Money::from_minor(14_412));
        assert_eq!(totals.total, Money::from_minor(134_512));
        assert_eq!(totals.points_earned, 12);
    }

    #[test]
    fn test_same_item_merges_but_service_and_product_ids_do_not_collide() {
        let mut cart = Cart::new(Decimal::ZERO);
        cart.add_item(shampoo(1));
        cart.add_item(shampoo(2));
        cart.add_item(haircut());

        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.unit_count(), 4);
    }

    #[test]
    fn test_percentage_discount_then_loyalty_then_tax() {
        let mut cart = Cart::new(vat());
        cart.add_item(haircut());
        cart.discount = Discount::Percentage(Decimal::new(10, 0));
        cart.points_to_redeem = 50;

        let totals = cart.totals(&LoyaltyPolicy::default()).unwrap();
        assert_eq!(totals.discount, Money::from_minor(5_000));
        assert_eq!(totals.loyalty_discount, Money::from_minor(5_000));
        assert_eq!(totals.net, Money::from_minor(40_000));
        assert_eq!(totals.tax, Money::from_minor(4_800));
        assert_eq!(totals.total, Money::from_minor(44_800));
        assert_eq!(totals.points_earned, 4);
    }

    #[test]
    fn test_fixed_discount_capped_at_subtotal() {
        let mut cart = Cart::new(vat());
        cart.add_item(haircut());
        cart.discount = Discount::Fixed(Money::from_minor(90_000));

        let totals = cart.totals(&LoyaltyPolicy::default()).unwrap();
        assert_eq!(totals.discount, Money::from_minor(50_000));
        assert_eq!(totals.total, Money::zero());
        assert_eq!(totals.points_earned, 0);
    }

    #[test]
    fn test_redemption_cannot_exceed_amount_due() {
        let mut cart = Cart::new(vat());
        cart.add_item(haircut());
        cart.points_to_redeem = 501;

        assert_eq!(
            cart.totals(&LoyaltyPolicy::default()),
            Err(CartError::RedemptionExceedsTotal {
                requested: 501,
                max: 500
            })
        );
    }

    #[test]
    fn test_validation_errors() {
        let policy = LoyaltyPolicy::default();

        assert_eq!(Cart::new(vat()).totals(&policy), Err(CartError::EmptyCart));

        let mut cart = Cart::new(vat());
        cart.add_item(shampoo(0));
        assert!(matches!(cart.totals(&policy), Err(CartError::ZeroQuantity(_))));

        let mut cart = Cart::new(Decimal::new(15, 1));
        cart.add_item(haircut());
        assert!(matches!(cart.totals(&policy), Err(CartError::InvalidTaxRate(_))));

        let mut cart = Cart::new(vat());
        cart.add_item(haircut());
        cart.discount = Discount::Percentage(Decimal::new(101, 0));
        assert!(matches!(cart.totals(&policy), Err(CartError::InvalidDiscount(_))));
    }

    #[test]
    fn test_set_quantity_zero_removes_line() {
        let mut cart = Cart::new(vat());
        cart.add_item(shampoo(3));
        assert!(cart.set_quantity(ItemKind::Product, 1, 0));
        assert!(cart.items.is_empty());
        assert!(!cart.set_quantity(ItemKind::Product, 1, 2));
    }

    #[test]
    fn test_discount_serde_shape() {
        let d: Discount = serde_json::from_str(r#"{"type":"percentage","value":"15"}"#).unwrap();
        assert_eq!(d, Discount::Percentage(Decimal::new(15, 0)));
        let none: Discount = serde_json::from_str(r#"{"type":"none"}"#).unwrap();
        assert_eq!(none, Discount::None);
    }
}
