//! A client's points across sales at two branches.
//!
//! Points are earned and redeemed per branch; the client's total is the
//! sum of the branch balances.

use rust_decimal::Decimal;

use salonhub_core::loyalty::{LoyaltyBalance, LoyaltyError, LoyaltyPolicy, PointsChange};
use salonhub_core::pos::{Cart, CartError, Discount, ItemKind, LineItem};
use salonhub_core::{BranchId, Money};

const DOWNTOWN: BranchId = BranchId::new(1);
const RIVERSIDE: BranchId = BranchId::new(2);

fn line(kind: ItemKind, item_id: i32, cents: i64, quantity: u32) -> LineItem {
    LineItem {
        kind,
        item_id,
        name: format!("{kind:?} {item_id}"),
        unit_price: Money::from_minor(cents),
        quantity,
    }
}

fn cart(items: Vec<LineItem>, tax_percent: i64) -> Cart {
    let mut cart = Cart::new(Decimal::new(tax_percent, 2));
    for item in items {
        cart.add_item(item);
    }
    cart
}

#[test]
fn test_points_stay_at_earning_branch() {
    let policy = LoyaltyPolicy::default();
    let mut balance = LoyaltyBalance::new();

    // 250.00 colour at Downtown earns 2 points at 100 per point
    let sale = cart(vec![line(ItemKind::Service, 3, 25_000, 1)], 0)
        .totals(&policy)
        .unwrap();
    assert_eq!(sale.points_earned, 2);
    balance.apply(DOWNTOWN, PointsChange::Credit(sale.points_earned)).unwrap();

    // 1,000.00 at Riverside earns 10 more there
    let sale = cart(vec![line(ItemKind::Service, 1, 50_000, 2)], 0)
        .totals(&policy)
        .unwrap();
    balance.apply(RIVERSIDE, PointsChange::Credit(sale.points_earned)).unwrap();

    assert_eq!(balance.points_at(DOWNTOWN), 2);
    assert_eq!(balance.points_at(RIVERSIDE), 10);
    assert_eq!(balance.total(), 12);

    // Riverside points cannot be spent at Downtown
    let err = balance.apply(DOWNTOWN, PointsChange::Redeem(5)).unwrap_err();
    assert!(matches!(
        err,
        LoyaltyError::InsufficientPoints {
            available: 2,
            requested: 5,
            ..
        }
    ));
    assert_eq!(balance.total(), 12);
}

#[test]
fn test_redemption_discounts_before_tax() {
    let policy = LoyaltyPolicy::default();
    let mut sale = cart(
        vec![
            line(ItemKind::Service, 1, 10_000, 1),
            line(ItemKind::Product, 7, 2_500, 2),
        ],
        10,
    );
    sale.discount = Discount::Percentage(Decimal::TEN);
    sale.points_to_redeem = 15;

    let totals = sale.totals(&policy).unwrap();
    // 150.00 - 10% = 135.00, minus 15 points = 120.00, plus 10% tax
    assert_eq!(totals.subtotal, Money::from_minor(15_000));
    assert_eq!(totals.discount, Money::from_minor(1_500));
    assert_eq!(totals.loyalty_discount, Money::from_minor(1_500));
    assert_eq!(totals.net, Money::from_minor(12_000));
    assert_eq!(totals.tax, Money::from_minor(1_200));
    assert_eq!(totals.total, Money::from_minor(13_200));
    // Points are earned on what was actually paid before tax
    assert_eq!(totals.points_earned, 1);
}

#[test]
fn test_redemption_cannot_exceed_sale() {
    let mut sale = cart(vec![line(ItemKind::Product, 7, 2_500, 1)], 0);
    sale.points_to_redeem = 26;
    assert!(matches!(
        sale.totals(&LoyaltyPolicy::default()),
        Err(CartError::RedemptionExceedsTotal { requested: 26, max: 25 })
    ));
}

#[test]
fn test_void_reverses_sale_points() {
    let policy = LoyaltyPolicy::default();
    let mut balance = LoyaltyBalance::new();
    balance.apply(DOWNTOWN, PointsChange::Credit(20)).unwrap();

    // Sale redeems 20 and earns 3
    let mut sale = cart(vec![line(ItemKind::Service, 1, 32_000, 1)], 0);
    sale.points_to_redeem = 20;
    let totals = sale.totals(&policy).unwrap();
    assert_eq!(totals.points_earned, 3);
    balance.apply(DOWNTOWN, PointsChange::Redeem(totals.points_redeemed)).unwrap();
    balance.apply(DOWNTOWN, PointsChange::Credit(totals.points_earned)).unwrap();
    assert_eq!(balance.points_at(DOWNTOWN), 3);

    // Void: take back what was earned, give back what was redeemed
    let taken = balance
        .apply(DOWNTOWN, PointsChange::Reverse(totals.points_earned))
        .unwrap();
    assert_eq!(taken, -3);
    balance.apply(DOWNTOWN, PointsChange::Credit(totals.points_redeemed)).unwrap();
    assert_eq!(balance.points_at(DOWNTOWN), 20);
}

#[test]
fn test_void_after_points_spent_takes_back_what_is_left() {
    let mut balance = LoyaltyBalance::new();
    balance.apply(RIVERSIDE, PointsChange::Credit(10)).unwrap();
    balance.apply(RIVERSIDE, PointsChange::Redeem(8)).unwrap();

    let taken = balance.apply(RIVERSIDE, PointsChange::Reverse(10)).unwrap();
    assert_eq!(taken, -2);
    assert_eq!(balance.points_at(RIVERSIDE), 0);
    assert_eq!(balance.total(), 0);
}

#[test]
fn test_same_line_rung_twice_merges() {
    let mut sale = cart(
        vec![
            line(ItemKind::Product, 7, 2_500, 1),
            line(ItemKind::Product, 7, 2_500, 2),
        ],
        0,
    );
    assert_eq!(sale.items.len(), 1);
    assert_eq!(sale.unit_count(), 3);
    assert!(sale.remove_item(ItemKind::Product, 7));
    assert!(matches!(
        sale.totals(&LoyaltyPolicy::default()),
        Err(CartError::EmptyCart)
    ));
}
