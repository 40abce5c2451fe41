//! Dashboard summaries, one shape per audience.

use serde::Serialize;

use salonhub_core::{BranchId, Money};

/// Figures for administrators and managers. `branch_id` is `None` when the
/// summary covers every branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationsSummary {
    pub branch_id: Option<BranchId>,
    /// Clients with a booking or sale at the branch, or every active
    /// client platform-wide.
    pub active_clients: i64,
    pub active_staff: i64,
    pub appointments_today: i64,
    pub low_stock_products: i64,
    pub revenue_today: Money,
    pub revenue_month: Money,
}

/// Figures for a stylist's own day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StylistSummary {
    pub appointments_today: i64,
    pub upcoming_appointments: i64,
    pub completed_this_month: i64,
}

/// Figures shown to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientSummary {
    pub loyalty_points: i64,
    pub upcoming_appointments: i64,
    pub completed_visits: i64,
}

/// Role-dependent dashboard payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DashboardSummary {
    Operations(OperationsSummary),
    Stylist(StylistSummary),
    Client(ClientSummary),
}
