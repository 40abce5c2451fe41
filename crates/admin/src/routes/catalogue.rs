//! Service menu.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use tracing::instrument;

use salonhub_core::pagination::{Page, PageRequest};
use salonhub_core::{BranchId, Capability, ServiceId};

use crate::db::SalonServiceRepository;
use crate::error::AppError;
use crate::middleware::{RequireAuth, RequireStaff};
use crate::models::{CurrentUser, SalonService, ServiceFilter, ServiceInput};
use crate::routes::ActiveToggle;
use crate::state::AppState;

/// Build the service menu router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/services", get(list).post(create))
        .route("/api/services/{id}", get(show).put(update))
        .route("/api/services/{id}/active", post(set_active))
}

/// Branch-scoped editors may only touch services offered solely at their
/// own branch.
fn ensure_branches(user: &CurrentUser, branch_ids: &[BranchId]) -> Result<(), AppError> {
    if !user.role.is_branch_scoped() {
        return Ok(());
    }
    if branch_ids.is_empty() {
        return Err(AppError::Forbidden(
            "services must be offered at your branch".to_string(),
        ));
    }
    branch_ids.iter().try_for_each(|b| user.ensure_branch(*b))
}

async fn load_service(state: &AppState, id: ServiceId) -> Result<SalonService, AppError> {
    SalonServiceRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("service {id}")))
}

/// List services. Clients only see active services.
///
/// GET /api/services
async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(mut filter): Query<ServiceFilter>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<SalonService>>, AppError> {
    if !user.role.is_staff() {
        filter.active = Some(true);
    }
    let services = SalonServiceRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(services))
}

/// POST /api/services
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn create(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Json(body): Json<ServiceInput>,
) -> Result<(StatusCode, Json<SalonService>), AppError> {
    user.require(Capability::ManageServices)?;
    ensure_branches(&user, &body.branch_ids)?;
    body.validate().map_err(AppError::Unprocessable)?;

    let service = SalonServiceRepository::new(state.pool()).create(&body).await?;
    tracing::info!(service_id = %service.id, name = %service.name, "Service created");
    Ok((StatusCode::CREATED, Json(service)))
}

/// GET /api/services/{id}
async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<ServiceId>,
) -> Result<Json<SalonService>, AppError> {
    let service = load_service(&state, id).await?;
    if !service.is_active && !user.role.is_staff() {
        return Err(AppError::NotFound(format!("service {id}")));
    }
    Ok(Json(service))
}

/// PUT /api/services/{id}
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn update(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<ServiceId>,
    Json(body): Json<ServiceInput>,
) -> Result<Json<SalonService>, AppError> {
    user.require(Capability::ManageServices)?;
    let existing = load_service(&state, id).await?;
    ensure_branches(&user, &existing.branch_ids)?;
    ensure_branches(&user, &body.branch_ids)?;
    body.validate().map_err(AppError::Unprocessable)?;

    let service = SalonServiceRepository::new(state.pool())
        .update(id, &body)
        .await?;
    tracing::info!(service_id = %id, "Service updated");
    Ok(Json(service))
}

/// POST /api/services/{id}/active
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn set_active(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<ServiceId>,
    Json(body): Json<ActiveToggle>,
) -> Result<Json<SalonService>, AppError> {
    user.require(Capability::ManageServices)?;
    let existing = load_service(&state, id).await?;
    ensure_branches(&user, &existing.branch_ids)?;

    SalonServiceRepository::new(state.pool())
        .set_active(id, body.active)
        .await?;
    tracing::info!(service_id = %id, active = body.active, "Service status changed");
    Ok(Json(load_service(&state, id).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use salonhub_core::{Email, Role, UserId};

    fn user(role: Role, branch: Option<i32>) -> CurrentUser {
        CurrentUser {
            id: UserId::new(1),
            email: Email::parse("a@example.com").unwrap(),
            name: "A".to_string(),
            role,
            branch_id: branch.map(BranchId::new),
        }
    }

    #[test]
    fn test_branch_admin_limited_to_own_branch_services() {
        let admin = user(Role::BranchAdmin, Some(1));
        assert!(ensure_branches(&admin, &[BranchId::new(1)]).is_ok());
        assert!(ensure_branches(&admin, &[BranchId::new(1), BranchId::new(2)]).is_err());
        assert!(ensure_branches(&admin, &[]).is_err());
    }

    #[test]
    fn test_platform_roles_edit_any_service() {
        let ops = user(Role::OperationalManager, None);
        assert!(ensure_branches(&ops, &[BranchId::new(1), BranchId::new(2)]).is_ok());
        assert!(ensure_branches(&ops, &[]).is_ok());
    }
}
