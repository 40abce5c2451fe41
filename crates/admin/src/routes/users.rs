//! Staff and client accounts, and client loyalty points.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use salonhub_core::loyalty::{LedgerReason, PointsChange};
use salonhub_core::pagination::{Page, PageRequest, SortDirection};
use salonhub_core::{Capability, Role, UserId};

use crate::db::{BranchRepository, LoyaltyRepository, UserRepository};
use crate::error::AppError;
use crate::middleware::{RequireAuth, RequireStaff};
use crate::models::{
    CurrentUser, LoyaltyEntry, LoyaltyOutcome, LoyaltyPosting, LoyaltySummary, NewUser,
    PointsAdjustment, User, UserFilter, UserSort, UserUpdate, non_blank,
};
use crate::routes::ActiveToggle;
use crate::services::AuthService;
use crate::state::AppState;

/// Build the users router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list).post(create))
        .route("/api/users/{id}", get(show).put(update))
        .route("/api/users/{id}/active", post(set_active))
        .route("/api/clients", get(list_clients))
        .route("/api/clients/{id}/loyalty", get(loyalty))
        .route("/api/clients/{id}/loyalty/add", post(add_points))
        .route("/api/clients/{id}/loyalty/redeem", post(redeem_points))
}

/// Query parameters for the client search.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientQuery {
    pub search: Option<String>,
    pub active: Option<bool>,
    pub sort: UserSort,
    pub direction: SortDirection,
}

/// A client's balances with a page of their ledger.
#[derive(Debug, Serialize)]
pub struct LoyaltyView {
    pub summary: LoyaltySummary,
    pub history: Page<LoyaltyEntry>,
}

async fn load_user(state: &AppState, id: UserId) -> Result<User, AppError> {
    UserRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {id}")))
}

/// Viewing an account needs user management rights within scope, or
/// being that account.
fn ensure_can_view(viewer: &CurrentUser, target: &User) -> Result<(), AppError> {
    if viewer.is(target.id) {
        return Ok(());
    }
    viewer.require(Capability::ManageUsers)?;
    if target.role.is_branch_scoped()
        && let Some(branch) = target.branch_id
    {
        viewer.ensure_branch(branch)?;
    }
    Ok(())
}

/// List accounts.
///
/// GET /api/users
#[instrument(skip(state, user, filter), fields(user_id = %user.id))]
async fn list(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Query(mut filter): Query<UserFilter>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<User>>, AppError> {
    user.require(Capability::ManageUsers)?;
    filter.branch_id = user.scope_branch(filter.branch_id)?;
    let users = UserRepository::new(state.pool()).list(&filter, page).await?;
    Ok(Json(users))
}

/// Create an account with any role the caller may manage.
///
/// POST /api/users
#[instrument(skip(state, user, body), fields(user_id = %user.id, role = %body.role))]
async fn create(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Json(body): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), AppError> {
    user.ensure_can_manage(body.role, body.branch_id)?;
    let created = AuthService::new(state.pool()).create_user(&body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/users/{id}
async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<User>, AppError> {
    let target = load_user(&state, id).await?;
    ensure_can_view(&user, &target)?;
    Ok(Json(target))
}

/// Replace an account's profile, role and branch.
///
/// PUT /api/users/{id}
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn update(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(mut body): Json<UserUpdate>,
) -> Result<Json<User>, AppError> {
    let target = load_user(&state, id).await?;
    user.ensure_can_manage(target.role, target.branch_id)?;
    user.ensure_can_manage(body.role, body.branch_id)?;
    body.validate().map_err(AppError::Unprocessable)?;
    body.phone = non_blank(body.phone.as_deref());

    let updated = UserRepository::new(state.pool()).update(id, &body).await?;
    tracing::info!(target_id = %id, role = %updated.role, "Account updated");
    Ok(Json(updated))
}

/// Activate or deactivate an account.
///
/// POST /api/users/{id}/active
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn set_active(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(body): Json<ActiveToggle>,
) -> Result<Json<User>, AppError> {
    if user.is(id) && !body.active {
        return Err(AppError::Conflict(
            "you cannot deactivate your own account".to_string(),
        ));
    }
    let target = load_user(&state, id).await?;
    user.ensure_can_manage(target.role, target.branch_id)?;

    let repo = UserRepository::new(state.pool());
    repo.set_active(id, body.active).await?;
    tracing::info!(target_id = %id, active = body.active, "Account status changed");
    Ok(Json(load_user(&state, id).await?))
}

/// Search clients. Clients visit any branch, so staff see all of them.
///
/// GET /api/clients
async fn list_clients(
    RequireStaff(_user): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<ClientQuery>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<User>>, AppError> {
    let filter = UserFilter {
        role: Some(Role::Client),
        branch_id: None,
        search: query.search,
        active: query.active,
        sort: query.sort,
        direction: query.direction,
    };
    let clients = UserRepository::new(state.pool()).list(&filter, page).await?;
    Ok(Json(clients))
}

async fn load_client(state: &AppState, id: UserId) -> Result<User, AppError> {
    let client = load_user(state, id).await?;
    if client.role != Role::Client {
        return Err(AppError::NotFound(format!("client {id}")));
    }
    Ok(client)
}

/// Per-branch balances and ledger of a client.
///
/// GET /api/clients/{id}/loyalty
async fn loyalty(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Query(page): Query<PageRequest>,
) -> Result<Json<LoyaltyView>, AppError> {
    if !user.role.is_staff() && !user.is(id) {
        return Err(AppError::Forbidden(
            "clients may only view their own points".to_string(),
        ));
    }
    load_client(&state, id).await?;

    let repo = LoyaltyRepository::new(state.pool());
    let balance = repo.balance(id).await?;
    let history = repo.history(id, page).await?;
    Ok(Json(LoyaltyView {
        summary: LoyaltySummary::new(id, &balance),
        history,
    }))
}

async fn post_adjustment(
    state: &AppState,
    user: &CurrentUser,
    client_id: UserId,
    body: PointsAdjustment,
    change: PointsChange,
    reason: LedgerReason,
) -> Result<Json<LoyaltyOutcome>, AppError> {
    user.require(Capability::AdjustLoyalty)?;
    user.ensure_branch(body.branch_id)?;
    load_client(state, client_id).await?;
    BranchRepository::new(state.pool())
        .get(body.branch_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("branch {}", body.branch_id)))?;

    let outcome = LoyaltyRepository::new(state.pool())
        .apply(&LoyaltyPosting {
            client_id,
            branch_id: body.branch_id,
            change,
            reason,
            actor_id: Some(user.id),
            transaction_id: None,
            note: non_blank(body.note.as_deref()),
        })
        .await?;

    tracing::info!(
        %client_id,
        branch_id = %outcome.branch_id,
        delta = outcome.delta,
        total = outcome.total,
        "Loyalty points adjusted"
    );
    Ok(Json(outcome))
}

/// Credit points at a branch.
///
/// POST /api/clients/{id}/loyalty/add
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn add_points(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(body): Json<PointsAdjustment>,
) -> Result<Json<LoyaltyOutcome>, AppError> {
    let change = PointsChange::Credit(body.points);
    post_adjustment(&state, &user, id, body, change, LedgerReason::ManualAdjustment).await
}

/// Redeem points at a branch.
///
/// POST /api/clients/{id}/loyalty/redeem
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn redeem_points(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(body): Json<PointsAdjustment>,
) -> Result<Json<LoyaltyOutcome>, AppError> {
    let change = PointsChange::Redeem(body.points);
    post_adjustment(&state, &user, id, body, change, LedgerReason::Redemption).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use salonhub_core::{BranchId, Email};

    fn current(role: Role, branch: Option<i32>) -> CurrentUser {
        CurrentUser {
            id: UserId::new(1),
            email: Email::parse("me@example.com").unwrap(),
            name: "Me".to_string(),
            role,
            branch_id: branch.map(BranchId::new),
        }
    }

    fn account(id: i32, role: Role, branch: Option<i32>) -> User {
        User {
            id: UserId::new(id),
            email: Email::parse("them@example.com").unwrap(),
            name: "Them".to_string(),
            phone: None,
            role,
            branch_id: branch.map(BranchId::new),
            loyalty_points: 0,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_anyone_can_view_self() {
        let me = current(Role::Client, None);
        assert!(ensure_can_view(&me, &account(1, Role::Client, None)).is_ok());
        assert!(ensure_can_view(&me, &account(2, Role::Client, None)).is_err());
    }

    #[test]
    fn test_branch_manager_views_own_branch_staff() {
        let manager = current(Role::BranchManager, Some(1));
        assert!(ensure_can_view(&manager, &account(2, Role::Stylist, Some(1))).is_ok());
        assert!(ensure_can_view(&manager, &account(3, Role::Stylist, Some(2))).is_err());
        // Clients are shared across branches
        assert!(ensure_can_view(&manager, &account(4, Role::Client, Some(2))).is_ok());
    }
}
