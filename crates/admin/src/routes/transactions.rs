//! Point-of-sale transactions.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use tracing::instrument;

use salonhub_core::pagination::{Page, PageRequest};
use salonhub_core::{Capability, Role, TransactionId};

use crate::db::TransactionRepository;
use crate::error::AppError;
use crate::middleware::{RequireAuth, RequireStaff};
use crate::models::{
    CurrentUser, SaleQuote, SaleRequest, Transaction, TransactionFilter, VoidRequest,
};
use crate::services::CheckoutService;
use crate::state::AppState;

/// Build the transactions router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/transactions", get(list).post(create))
        .route("/api/transactions/quote", post(quote))
        .route("/api/transactions/{id}", get(show))
        .route("/api/transactions/{id}/void", post(void))
}

/// Narrow a list filter to what the caller may see.
///
/// Clients see their own purchases and stylists the sales they rang up.
///
/// # Errors
///
/// Returns `AppError::Forbidden` if a branch-scoped user asks for another
/// branch.
pub fn scope_filter(user: &CurrentUser, filter: &mut TransactionFilter) -> Result<(), AppError> {
    match user.role {
        Role::Client => filter.client_id = Some(user.id),
        Role::Stylist => {
            filter.staff_id = Some(user.id);
            filter.branch_id = user.branch_id;
        }
        _ => {
            user.require(Capability::ViewReports)?;
            filter.branch_id = user.scope_branch(filter.branch_id)?;
        }
    }
    Ok(())
}

fn ensure_can_view(user: &CurrentUser, sale: &Transaction) -> Result<(), AppError> {
    let allowed = match user.role {
        Role::Client => sale.client_id == Some(user.id),
        Role::Stylist => user.is(sale.staff_id),
        _ => user.role.can(Capability::ViewReports) && user.ensure_branch(sale.branch_id).is_ok(),
    };
    if allowed {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("transaction {}", sale.id)))
    }
}

fn ensure_can_sell(user: &CurrentUser, request: &SaleRequest) -> Result<(), AppError> {
    user.require(Capability::ProcessTransactions)?;
    user.ensure_branch(request.branch_id)
}

/// GET /api/transactions
async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(mut filter): Query<TransactionFilter>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Transaction>>, AppError> {
    scope_filter(&user, &mut filter)?;
    let sales = TransactionRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(sales))
}

/// Price a cart at catalogue prices without recording anything.
///
/// POST /api/transactions/quote
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn quote(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Json(body): Json<SaleRequest>,
) -> Result<Json<SaleQuote>, AppError> {
    ensure_can_sell(&user, &body)?;
    let quote = CheckoutService::new(state.pool(), state.loyalty_policy())
        .quote(&body)
        .await?;
    Ok(Json(quote))
}

/// Record a sale, take stock and post loyalty points.
///
/// POST /api/transactions
#[instrument(skip(state, user, body), fields(user_id = %user.id, branch_id = %body.branch_id))]
async fn create(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Json(body): Json<SaleRequest>,
) -> Result<(StatusCode, Json<Transaction>), AppError> {
    ensure_can_sell(&user, &body)?;
    let sale = CheckoutService::new(state.pool(), state.loyalty_policy())
        .checkout(&body, user.id)
        .await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

/// GET /api/transactions/{id}
async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<TransactionId>,
) -> Result<Json<Transaction>, AppError> {
    let sale = TransactionRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("transaction {id}")))?;
    ensure_can_view(&user, &sale)?;
    Ok(Json(sale))
}

/// Void a completed sale.
///
/// POST /api/transactions/{id}/void
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn void(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<TransactionId>,
    Json(body): Json<VoidRequest>,
) -> Result<Json<Transaction>, AppError> {
    user.require(Capability::VoidTransactions)?;
    let sale = TransactionRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("transaction {id}")))?;
    user.ensure_branch(sale.branch_id)?;

    let voided = CheckoutService::new(state.pool(), state.loyalty_policy())
        .void(id, user.id, &body.reason)
        .await?;
    Ok(Json(voided))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use salonhub_core::{BranchId, Email, UserId};

    fn current(id: i32, role: Role, branch: Option<i32>) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            email: Email::parse("me@example.com").unwrap(),
            name: "Me".to_string(),
            role,
            branch_id: branch.map(BranchId::new),
        }
    }

    #[test]
    fn test_client_sees_own_purchases() {
        let mut filter = TransactionFilter {
            client_id: Some(UserId::new(99)),
            ..Default::default()
        };
        scope_filter(&current(5, Role::Client, None), &mut filter).unwrap();
        assert_eq!(filter.client_id, Some(UserId::new(5)));
    }

    #[test]
    fn test_stylist_sees_own_sales() {
        let mut filter = TransactionFilter::default();
        scope_filter(&current(7, Role::Stylist, Some(2)), &mut filter).unwrap();
        assert_eq!(filter.staff_id, Some(UserId::new(7)));
        assert_eq!(filter.branch_id, Some(BranchId::new(2)));
    }

    #[test]
    fn test_branch_admin_pinned_to_branch() {
        let admin = current(1, Role::BranchAdmin, Some(3));
        let mut filter = TransactionFilter::default();
        scope_filter(&admin, &mut filter).unwrap();
        assert_eq!(filter.branch_id, Some(BranchId::new(3)));

        let mut other = TransactionFilter {
            branch_id: Some(BranchId::new(4)),
            ..Default::default()
        };
        assert!(scope_filter(&admin, &mut other).is_err());
    }

    #[test]
    fn test_operational_manager_sees_all_branches() {
        let mut filter = TransactionFilter::default();
        scope_filter(&current(1, Role::OperationalManager, None), &mut filter).unwrap();
        assert_eq!(filter.branch_id, None);
    }
}
