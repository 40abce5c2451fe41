//! Retail products stocked per branch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salonhub_core::{BranchId, Money, ProductId, SupplierId};

use super::require_text;

/// A retail product held at one branch (domain type).
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub branch_id: BranchId,
    pub supplier_id: Option<SupplierId>,
    pub name: String,
    pub sku: Option<String>,
    pub category: String,
    pub description: String,
    pub price: Money,
    pub cost: Option<Money>,
    pub stock: i32,
    /// Stock at or below this level is flagged for reordering.
    pub reorder_level: i32,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether the product needs reordering.
    #[must_use]
    pub const fn is_low_stock(&self) -> bool {
        self.stock <= self.reorder_level
    }
}

/// Payload for creating or replacing a product.
///
/// `stock` is only used on create; later changes go through stock
/// adjustments.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub branch_id: BranchId,
    #[serde(default)]
    pub supplier_id: Option<SupplierId>,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    #[serde(default)]
    pub cost: Option<Money>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub reorder_level: i32,
    #[serde(default)]
    pub image_url: Option<String>,
}

fn default_category() -> String {
    "general".to_string()
}

impl ProductInput {
    /// Check name, prices and stock levels.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        require_text(&self.name, "name")?;
        if self.price.is_negative() || self.cost.is_some_and(|c| c.is_negative()) {
            return Err("prices cannot be negative".to_string());
        }
        if self.stock < 0 || self.reorder_level < 0 {
            return Err("stock levels cannot be negative".to_string());
        }
        Ok(())
    }
}

/// A manual stock correction.
#[derive(Debug, Clone, Deserialize)]
pub struct StockAdjustment {
    /// Signed change, e.g. `+12` for a delivery, `-1` for breakage.
    pub delta: i32,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Query-string filter for product lists.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductFilter {
    pub branch_id: Option<BranchId>,
    pub supplier_id: Option<SupplierId>,
    pub category: Option<String>,
    /// Only products at or below their reorder level.
    pub low_stock: Option<bool>,
    pub search: Option<String>,
    pub active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_negative_stock() {
        let input = ProductInput {
            branch_id: BranchId::new(1),
            supplier_id: None,
            name: "Argan oil".to_string(),
            sku: Some("ARG-100".to_string()),
            category: default_category(),
            description: String::new(),
            price: Money::from_minor(65_000),
            cost: None,
            stock: -1,
            reorder_level: 5,
            image_url: None,
        };
        assert_eq!(
            input.validate(),
            Err("stock levels cannot be negative".to_string())
        );
    }
}
