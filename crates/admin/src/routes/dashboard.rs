//! Role dashboards.
//!
//! Every role lands on `/` after signing in. The page shows the menu for
//! the role and the same summary that `/api/dashboard` returns as JSON.

use askama::Template;
use axum::{Json, Router, extract::State, response::Html, routing::get};
use tracing::instrument;

use salonhub_core::{Capability, Role};

use crate::db::DashboardRepository;
use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::{CurrentUser, DashboardSummary};
use crate::routes::{render, today};
use crate::state::AppState;

/// Sidebar entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuItem {
    pub label: &'static str,
    pub href: &'static str,
}

/// Summary figure shown as a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub label: &'static str,
    pub value: String,
}

/// Dashboard page template.
#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    user: CurrentUser,
    role_label: &'static str,
    menu: Vec<MenuItem>,
    stats: Vec<Stat>,
}

/// Build the dashboard router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/api/dashboard", get(summary))
}

const fn item(label: &'static str, href: &'static str) -> MenuItem {
    MenuItem { label, href }
}

/// Menu entries available to `role`.
#[must_use]
pub fn menu_for(role: Role) -> Vec<MenuItem> {
    let mut menu = vec![item("Dashboard", "/")];

    if role == Role::Client {
        menu.extend([
            item("My appointments", "/api/appointments"),
            item("My purchases", "/api/transactions"),
            item("Branches", "/api/public/branches"),
        ]);
        return menu;
    }

    let gated = [
        (Capability::ManageBranches, item("Branches", "/api/branches")),
        (Capability::ManageOwnBranch, item("My branch", "/api/branches")),
        (Capability::ManageUsers, item("Staff & clients", "/api/users")),
        (Capability::ManageServices, item("Services", "/api/services")),
        (Capability::ManageProducts, item("Products", "/api/products")),
        (Capability::ManageSuppliers, item("Suppliers", "/api/suppliers")),
        (Capability::ManageAppointments, item("Appointments", "/api/appointments")),
        (Capability::ProcessTransactions, item("Point of sale", "/api/transactions")),
        (Capability::ManageHomepage, item("Homepage", "/api/content/homepage")),
        (Capability::ManageBranchContent, item("Branch page", "/api/branches")),
    ];

    for (capability, entry) in gated {
        // Full branch management supersedes the own-branch entry
        if capability == Capability::ManageOwnBranch && role.can(Capability::ManageBranches) {
            continue;
        }
        if role.can(capability) {
            menu.push(entry);
        }
    }

    if role == Role::Stylist {
        menu.push(item("My schedule", "/api/appointments"));
    }
    menu.push(item("Clients", "/api/clients"));
    menu
}

/// Load the summary the signed-in user is allowed to see.
async fn load_summary(state: &AppState, user: &CurrentUser) -> Result<DashboardSummary, AppError> {
    let repo = DashboardRepository::new(state.pool());
    let today = today();

    let summary = match user.role {
        Role::Client => DashboardSummary::Client(repo.client(user.id, today).await?),
        Role::Stylist => DashboardSummary::Stylist(repo.stylist(user.id, today).await?),
        _ => {
            user.require(Capability::ViewReports)?;
            let branch = user.scope_branch(None)?;
            DashboardSummary::Operations(repo.operations(branch, today).await?)
        }
    };
    Ok(summary)
}

/// Summary cards for the page.
#[must_use]
pub fn stats_for(summary: &DashboardSummary) -> Vec<Stat> {
    let stat = |label, value: String| Stat { label, value };
    match summary {
        DashboardSummary::Operations(s) => vec![
            stat("Revenue today", s.revenue_today.to_string()),
            stat("Revenue this month", s.revenue_month.to_string()),
            stat("Appointments today", s.appointments_today.to_string()),
            stat("Active clients", s.active_clients.to_string()),
            stat("Active staff", s.active_staff.to_string()),
            stat("Low-stock products", s.low_stock_products.to_string()),
        ],
        DashboardSummary::Stylist(s) => vec![
            stat("Appointments today", s.appointments_today.to_string()),
            stat("Upcoming", s.upcoming_appointments.to_string()),
            stat("Completed this month", s.completed_this_month.to_string()),
        ],
        DashboardSummary::Client(s) => vec![
            stat("Loyalty points", s.loyalty_points.to_string()),
            stat("Upcoming appointments", s.upcoming_appointments.to_string()),
            stat("Completed visits", s.completed_visits.to_string()),
        ],
    }
}

/// Render the role dashboard.
///
/// GET /
#[instrument(skip_all, fields(user_id = %user.id))]
async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let summary = load_summary(&state, &user).await?;
    render(&DashboardTemplate {
        role_label: user.role.label(),
        menu: menu_for(user.role),
        stats: stats_for(&summary),
        user,
    })
}

/// Role-scoped summary.
///
/// GET /api/dashboard
#[instrument(skip_all, fields(user_id = %user.id))]
async fn summary(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<DashboardSummary>, AppError> {
    Ok(Json(load_summary(&state, &user).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::ClientSummary;

    fn labels(role: Role) -> Vec<&'static str> {
        menu_for(role).iter().map(|m| m.label).collect()
    }

    #[test]
    fn test_system_admin_sees_everything() {
        let menu = labels(Role::SystemAdmin);
        assert!(menu.contains(&"Homepage"));
        assert!(menu.contains(&"Branches"));
        assert!(!menu.contains(&"My branch"));
    }

    #[test]
    fn test_operational_manager_cannot_edit_homepage() {
        assert!(!labels(Role::OperationalManager).contains(&"Homepage"));
    }

    #[test]
    fn test_branch_admin_menu() {
        let menu = labels(Role::BranchAdmin);
        assert!(menu.contains(&"My branch"));
        assert!(menu.contains(&"Branch page"));
        assert!(!menu.contains(&"Suppliers"));
    }

    #[test]
    fn test_stylist_menu() {
        assert_eq!(
            labels(Role::Stylist),
            vec!["Dashboard", "Point of sale", "My schedule", "Clients"]
        );
    }

    #[test]
    fn test_client_menu() {
        let menu = labels(Role::Client);
        assert!(menu.contains(&"My appointments"));
        assert!(!menu.contains(&"Clients"));
    }

    #[test]
    fn test_client_stats() {
        let stats = stats_for(&DashboardSummary::Client(ClientSummary {
            loyalty_points: 120,
            upcoming_appointments: 1,
            completed_visits: 7,
        }));
        assert_eq!(stats[0].value, "120");
        assert_eq!(stats.len(), 3);
    }
}
