//! Point-of-sale checkout and voids.
//!
//! Line items are resolved from the catalogue, so names and prices sent by
//! the browser are never trusted. A completed sale is written in one
//! database transaction: the sale row, stock decrements, the points
//! redemption and the points earned either all commit or none do.

use std::collections::HashMap;

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use salonhub_core::loyalty::{LedgerReason, LoyaltyError, LoyaltyPolicy, PointsChange};
use salonhub_core::pos::{Cart, CartError, ItemKind, LineItem};
use salonhub_core::{
    BranchId, ProductId, Role, ServiceId, TransactionId, TransactionStatus, UserId,
};

use crate::db::{
    BranchRepository, LedgerError, LoyaltyRepository, ProductRepository, RepositoryError,
    SalonServiceRepository, TransactionRepository, UserRepository,
};
use crate::models::{
    LoyaltyPosting, NewTransaction, Product, SalonService, SaleItem, SaleQuote, SaleRequest,
    Transaction, non_blank,
};

/// Errors raised while pricing, recording or voiding a sale.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// The cart could not be priced.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// The loyalty ledger rejected a change.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A line refers to an item that does not exist.
    #[error("unknown {kind:?} {id}")]
    UnknownItem { kind: ItemKind, id: i32 },

    /// The item exists but cannot be sold at this branch.
    #[error("{0} is not available at this branch")]
    Unavailable(String),

    /// Not enough stock for a product line.
    #[error("only {available} of {product} in stock, {requested} requested")]
    InsufficientStock {
        product: String,
        available: i32,
        requested: i32,
    },

    /// The branch is closed for business.
    #[error("branch is not active")]
    BranchInactive,

    /// Points were requested on a walk-in sale.
    #[error("a client is required to redeem points")]
    ClientRequired,

    /// The named client is not a client account.
    #[error("{0} is not a client account")]
    NotAClient(UserId),

    /// The sale was voided before.
    #[error("transaction is already voided")]
    AlreadyVoided,

    /// A referenced record does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Malformed request.
    #[error("{0}")]
    Invalid(String),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// A cart priced against the catalogue.
struct PricedSale {
    cart: Cart,
    available_points: Option<i64>,
}

/// Checkout service.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    policy: LoyaltyPolicy,
}

impl<'a> CheckoutService<'a> {
    /// Create a checkout service using `policy` for points.
    #[must_use]
    pub const fn new(pool: &'a PgPool, policy: LoyaltyPolicy) -> Self {
        Self { pool, policy }
    }

    /// Price a sale without recording it.
    ///
    /// # Errors
    ///
    /// Returns the same validation errors as [`checkout`](Self::checkout).
    #[instrument(skip(self, request), fields(branch_id = %request.branch_id))]
    pub async fn quote(&self, request: &SaleRequest) -> Result<SaleQuote, CheckoutError> {
        let priced = self.price(request).await?;
        let totals = priced.cart.totals(&self.policy)?;
        Ok(SaleQuote {
            items: priced.cart.items,
            totals,
            available_points: priced.available_points,
        })
    }

    /// Record a sale rung up by `staff_id`.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InsufficientStock` if a product sold out,
    /// `CheckoutError::Ledger` if the client lacks the points to redeem, and
    /// the pricing errors of [`quote`](Self::quote). Nothing is written when
    /// an error is returned.
    #[instrument(skip(self, request), fields(branch_id = %request.branch_id))]
    pub async fn checkout(
        &self,
        request: &SaleRequest,
        staff_id: UserId,
    ) -> Result<Transaction, CheckoutError> {
        let priced = self.price(request).await?;
        let totals = priced.cart.totals(&self.policy)?;

        let new_sale = NewTransaction {
            branch_id: request.branch_id,
            client_id: request.client_id,
            staff_id,
            items: priced.cart.items,
            discount: priced.cart.discount,
            tax_rate: priced.cart.tax_rate,
            totals,
            payment_method: request.payment_method,
            notes: non_blank(request.notes.as_deref()),
        };

        let mut tx = self.pool.begin().await?;
        let sale = TransactionRepository::insert_in(&mut *tx, &new_sale).await?;

        for line in sale.items.iter().filter(|l| l.kind == ItemKind::Product) {
            let requested = quantity_i32(line)?;
            if let Err(shortage) =
                ProductRepository::decrement_stock_in(&mut *tx, ProductId::new(line.item_id), requested)
                    .await?
            {
                return Err(CheckoutError::InsufficientStock {
                    product: line.name.clone(),
                    available: shortage.available,
                    requested: shortage.requested,
                });
            }
        }

        if let Some(client_id) = sale.client_id {
            let posting = |change, reason| LoyaltyPosting {
                client_id,
                branch_id: sale.branch_id,
                change,
                reason,
                actor_id: Some(staff_id),
                transaction_id: Some(sale.id),
                note: None,
            };

            if sale.totals.points_redeemed > 0 {
                LoyaltyRepository::apply_in(
                    &mut *tx,
                    &posting(
                        PointsChange::Redeem(sale.totals.points_redeemed),
                        LedgerReason::Redemption,
                    ),
                )
                .await?;
            }
            if sale.totals.points_earned > 0 {
                LoyaltyRepository::apply_in(
                    &mut *tx,
                    &posting(
                        PointsChange::Credit(sale.totals.points_earned),
                        LedgerReason::Purchase,
                    ),
                )
                .await?;
            }
        }

        tx.commit().await?;

        tracing::info!(
            transaction_id = %sale.id,
            total = %sale.totals.total,
            points_earned = sale.totals.points_earned,
            points_redeemed = sale.totals.points_redeemed,
            "Sale recorded"
        );
        Ok(sale)
    }

    /// Void a completed sale, returning stock and reversing its points.
    ///
    /// Points earned are clawed back as far as the branch balance allows;
    /// points redeemed are refunded in full.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::NotFound` for an unknown sale and
    /// `CheckoutError::AlreadyVoided` if it was voided before.
    #[instrument(skip(self, reason))]
    pub async fn void(
        &self,
        id: TransactionId,
        voided_by: UserId,
        reason: &str,
    ) -> Result<Transaction, CheckoutError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CheckoutError::Invalid("a void reason is required".to_string()));
        }

        let mut tx = self.pool.begin().await?;
        let sale = TransactionRepository::get_for_update_in(&mut *tx, id)
            .await?
            .ok_or(CheckoutError::NotFound("transaction"))?;

        if sale.status == TransactionStatus::Voided {
            return Err(CheckoutError::AlreadyVoided);
        }

        for line in sale.items.iter().filter(|l| l.kind == ItemKind::Product) {
            ProductRepository::restock_in(&mut *tx, ProductId::new(line.item_id), quantity_i32(line)?)
                .await?;
        }

        if let Some(client_id) = sale.client_id {
            let posting = |change| LoyaltyPosting {
                client_id,
                branch_id: sale.branch_id,
                change,
                reason: LedgerReason::VoidReversal,
                actor_id: Some(voided_by),
                transaction_id: Some(sale.id),
                note: Some(reason.to_string()),
            };

            if sale.totals.points_earned > 0 {
                LoyaltyRepository::apply_in(
                    &mut *tx,
                    &posting(PointsChange::Reverse(sale.totals.points_earned)),
                )
                .await?;
            }
            if sale.totals.points_redeemed > 0 {
                LoyaltyRepository::apply_in(
                    &mut *tx,
                    &posting(PointsChange::Credit(sale.totals.points_redeemed)),
                )
                .await?;
            }
        }

        let voided = TransactionRepository::mark_voided_in(&mut *tx, id, voided_by, reason)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => CheckoutError::AlreadyVoided,
                other => CheckoutError::Repository(other),
            })?;

        tx.commit().await?;

        tracing::info!(transaction_id = %id, %voided_by, "Sale voided");
        Ok(voided)
    }

    /// Resolve the request against the catalogue and build the cart.
    async fn price(&self, request: &SaleRequest) -> Result<PricedSale, CheckoutError> {
        let branch = BranchRepository::new(self.pool)
            .get(request.branch_id)
            .await?
            .ok_or(CheckoutError::NotFound("branch"))?;
        if !branch.is_active {
            return Err(CheckoutError::BranchInactive);
        }

        let available_points = match request.client_id {
            Some(client_id) => {
                let client = UserRepository::new(self.pool)
                    .get(client_id)
                    .await?
                    .ok_or(CheckoutError::NotFound("client"))?;
                if client.role != Role::Client {
                    return Err(CheckoutError::NotAClient(client_id));
                }
                let balance = LoyaltyRepository::new(self.pool).balance(client_id).await?;
                Some(balance.points_at(branch.id))
            }
            None if request.points_to_redeem > 0 => return Err(CheckoutError::ClientRequired),
            None => None,
        };

        let service_ids: Vec<ServiceId> = ids_of(&request.items, ItemKind::Service)
            .map(ServiceId::new)
            .collect();
        let product_ids: Vec<ProductId> = ids_of(&request.items, ItemKind::Product)
            .map(ProductId::new)
            .collect();

        let services = SalonServiceRepository::new(self.pool)
            .get_many(&service_ids)
            .await?;
        let products = ProductRepository::new(self.pool)
            .get_many(&product_ids)
            .await?;

        let mut cart = build_cart(branch.id, &request.items, &services, &products)?;
        cart.tax_rate = branch.tax_rate;
        cart.discount = request.discount;
        cart.points_to_redeem = request.points_to_redeem;

        if let Some(available) = available_points
            && request.points_to_redeem > available
        {
            return Err(LedgerError::Loyalty(LoyaltyError::InsufficientPoints {
                branch: branch.id,
                available,
                requested: request.points_to_redeem,
            })
            .into());
        }

        Ok(PricedSale {
            cart,
            available_points,
        })
    }
}

fn ids_of(items: &[SaleItem], kind: ItemKind) -> impl Iterator<Item = i32> + '_ {
    items
        .iter()
        .filter(move |item| item.kind == kind)
        .map(|item| item.item_id)
}

fn quantity_i32(line: &LineItem) -> Result<i32, CheckoutError> {
    i32::try_from(line.quantity)
        .map_err(|_| CheckoutError::Invalid(format!("quantity of {} is too large", line.name)))
}

/// Build cart lines from catalogue records. Tax, discount and points are
/// set by the caller.
fn build_cart(
    branch_id: BranchId,
    items: &[SaleItem],
    services: &[SalonService],
    products: &[Product],
) -> Result<Cart, CheckoutError> {
    let services: HashMap<i32, &SalonService> =
        services.iter().map(|s| (s.id.as_i32(), s)).collect();
    let products: HashMap<i32, &Product> = products.iter().map(|p| (p.id.as_i32(), p)).collect();

    let mut cart = Cart::default();
    for item in items {
        let unknown = || CheckoutError::UnknownItem {
            kind: item.kind,
            id: item.item_id,
        };
        let line = match item.kind {
            ItemKind::Service => {
                let service = services.get(&item.item_id).ok_or_else(unknown)?;
                if !service.offered_at(branch_id) {
                    return Err(CheckoutError::Unavailable(service.name.clone()));
                }
                LineItem {
                    kind: ItemKind::Service,
                    item_id: item.item_id,
                    name: service.name.clone(),
                    unit_price: service.price,
                    quantity: item.quantity,
                }
            }
            ItemKind::Product => {
                let product = products.get(&item.item_id).ok_or_else(unknown)?;
                if product.branch_id != branch_id || !product.is_active {
                    return Err(CheckoutError::Unavailable(product.name.clone()));
                }
                LineItem {
                    kind: ItemKind::Product,
                    item_id: item.item_id,
                    name: product.name.clone(),
                    unit_price: product.price,
                    quantity: item.quantity,
                }
            }
        };
        cart.add_item(line);
    }

    // Merged lines are checked against stock as a whole
    for line in cart.items.iter().filter(|l| l.kind == ItemKind::Product) {
        if let Some(product) = products.get(&line.item_id) {
            let requested = quantity_i32(line)?;
            if requested > product.stock {
                return Err(CheckoutError::InsufficientStock {
                    product: product.name.clone(),
                    available: product.stock,
                    requested,
                });
            }
        }
    }

    Ok(cart)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use salonhub_core::Money;

    const MAKATI: BranchId = BranchId::new(1);
    const QC: BranchId = BranchId::new(2);

    fn haircut() -> SalonService {
        SalonService {
            id: ServiceId::new(10),
            name: "Haircut".to_string(),
            description: String::new(),
            category: "Hair".to_string(),
            price: Money::from_minor(50_000),
            duration_minutes: 45,
            branch_ids: vec![MAKATI],
            image_url: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn shampoo(stock: i32) -> Product {
        Product {
            id: ProductId::new(20),
            branch_id: MAKATI,
            supplier_id: None,
            name: "Shampoo".to_string(),
            sku: Some("SH-1".to_string()),
            category: "Hair care".to_string(),
            description: String::new(),
            price: Money::from_minor(35_000),
            cost: None,
            stock,
            reorder_level: 2,
            image_url: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(kind: ItemKind, item_id: i32, quantity: u32) -> SaleItem {
        SaleItem {
            kind,
            item_id,
            quantity,
        }
    }

    #[test]
    fn test_prices_come_from_catalogue() {
        let items = [item(ItemKind::Service, 10, 1), item(ItemKind::Product, 20, 2)];
        let mut cart = build_cart(MAKATI, &items, &[haircut()], &[shampoo(5)]).unwrap();
        cart.tax_rate = Decimal::new(12, 2);

        let totals = cart.totals(&LoyaltyPolicy::default()).unwrap();
        assert_eq!(totals.subtotal, Money::from_minor(120_000));
        assert_eq!(totals.points_earned, 12);
        assert_eq!(cart.items[0].name, "Haircut");
    }

    #[test]
    fn test_service_not_offered_at_branch() {
        let items = [item(ItemKind::Service, 10, 1)];
        let err = build_cart(QC, &items, &[haircut()], &[]).unwrap_err();
        assert!(matches!(err, CheckoutError::Unavailable(name) if name == "Haircut"));
    }

    #[test]
    fn test_product_from_other_branch_rejected() {
        let items = [item(ItemKind::Product, 20, 1)];
        let err = build_cart(QC, &items, &[], &[shampoo(5)]).unwrap_err();
        assert!(matches!(err, CheckoutError::Unavailable(_)));
    }

    #[test]
    fn test_unknown_item() {
        let items = [item(ItemKind::Product, 99, 1)];
        let err = build_cart(MAKATI, &items, &[], &[]).unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::UnknownItem {
                kind: ItemKind::Product,
                id: 99
            }
        ));
    }

    #[test]
    fn test_merged_lines_checked_against_stock() {
        let items = [item(ItemKind::Product, 20, 2), item(ItemKind::Product, 20, 2)];
        let err = build_cart(MAKATI, &items, &[], &[shampoo(3)]).unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InsufficientStock {
                available: 3,
                requested: 4,
                ..
            }
        ));
    }
}
