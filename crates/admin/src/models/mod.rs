//! Domain models for the dashboard server.
//!
//! Read models returned by the repositories, input payloads accepted by the
//! JSON API, and list filters deserialized from query strings.

pub mod appointment;
pub mod branch;
pub mod dashboard;
pub mod loyalty;
pub mod product;
pub mod salon_service;
pub mod session;
pub mod supplier;
pub mod transaction;
pub mod user;

pub use appointment::{
    Appointment, AppointmentFilter, AppointmentRecord, NewAppointment, Reschedule, StatusChange,
};
pub use branch::{Branch, BranchInput};
pub use dashboard::{ClientSummary, DashboardSummary, OperationsSummary, StylistSummary};
pub use loyalty::{
    BranchPoints, LoyaltyEntry, LoyaltyOutcome, LoyaltyPosting, LoyaltySummary, PointsAdjustment,
};
pub use product::{Product, ProductFilter, ProductInput, StockAdjustment};
pub use salon_service::{SalonService, ServiceFilter, ServiceInput};
pub use session::{CurrentUser, keys as session_keys};
pub use supplier::{Supplier, SupplierInput};
pub use transaction::{
    NewTransaction, SaleItem, SaleQuote, SaleRequest, Transaction, TransactionFilter, VoidRequest,
};
pub use user::{ClientRegistration, NewUser, User, UserFilter, UserSort, UserUpdate};

/// Trimmed copy of `value`, or `None` if it is blank.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

/// Fail with `"{field} is required"` when `value` is blank.
pub(crate) fn require_text(value: &str, field: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} is required"));
    }
    Ok(())
}
