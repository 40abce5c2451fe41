//! Point-of-sale transactions.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use salonhub_core::pos::{CartTotals, Discount, ItemKind, LineItem};
use salonhub_core::{BranchId, PaymentMethod, TransactionId, TransactionStatus, UserId};

/// A recorded sale (domain type).
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub branch_id: BranchId,
    pub client_id: Option<UserId>,
    /// Staff member who rang up the sale.
    pub staff_id: UserId,
    pub items: Vec<LineItem>,
    pub discount: Discount,
    pub tax_rate: Decimal,
    pub totals: CartTotals,
    pub payment_method: PaymentMethod,
    pub status: TransactionStatus,
    pub notes: Option<String>,
    pub voided_at: Option<DateTime<Utc>>,
    pub voided_by: Option<UserId>,
    pub void_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Values for inserting a priced sale.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub branch_id: BranchId,
    pub client_id: Option<UserId>,
    pub staff_id: UserId,
    pub items: Vec<LineItem>,
    pub discount: Discount,
    pub tax_rate: Decimal,
    pub totals: CartTotals,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

/// Query-string filter for transaction lists.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransactionFilter {
    pub branch_id: Option<BranchId>,
    pub client_id: Option<UserId>,
    pub staff_id: Option<UserId>,
    pub status: Option<TransactionStatus>,
    /// First day included (UTC).
    pub from: Option<NaiveDate>,
    /// Last day included (UTC).
    pub to: Option<NaiveDate>,
}

/// One requested line. Names and prices come from the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SaleItem {
    pub kind: ItemKind,
    pub item_id: i32,
    pub quantity: u32,
}

/// A sale as submitted from the point of sale.
#[derive(Debug, Clone, Deserialize)]
pub struct SaleRequest {
    pub branch_id: BranchId,
    #[serde(default)]
    pub client_id: Option<UserId>,
    pub items: Vec<SaleItem>,
    #[serde(default)]
    pub discount: Discount,
    #[serde(default)]
    pub points_to_redeem: i64,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Priced preview of a sale.
#[derive(Debug, Clone, Serialize)]
pub struct SaleQuote {
    pub items: Vec<LineItem>,
    pub totals: CartTotals,
    /// Points the client holds at the sale's branch.
    pub available_points: Option<i64>,
}

/// Void request.
#[derive(Debug, Clone, Deserialize)]
pub struct VoidRequest {
    pub reason: String,
}
