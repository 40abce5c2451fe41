//! Branch management.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

use salonhub_core::{BranchId, Capability};

use crate::db::BranchRepository;
use crate::error::AppError;
use crate::middleware::{RequireAuth, RequireStaff};
use crate::models::{Branch, BranchInput};
use crate::routes::ActiveToggle;
use crate::state::AppState;

/// Build the branches router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/branches", get(list).post(create))
        .route("/api/branches/{id}", get(show).put(update))
        .route("/api/branches/{id}/active", post(set_active))
}

/// Query parameters for the branch list.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct BranchQuery {
    pub active_only: bool,
}

async fn load_branch(state: &AppState, id: BranchId) -> Result<Branch, AppError> {
    BranchRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("branch {id}")))
}

/// List branches. Clients only see open branches.
///
/// GET /api/branches
async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(query): Query<BranchQuery>,
) -> Result<Json<Vec<Branch>>, AppError> {
    let active_only = query.active_only || !user.role.is_staff();
    let branches = BranchRepository::new(state.pool()).list(active_only).await?;
    Ok(Json(branches))
}

/// Open a new branch.
///
/// POST /api/branches
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn create(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Json(body): Json<BranchInput>,
) -> Result<(StatusCode, Json<Branch>), AppError> {
    user.require(Capability::ManageBranches)?;
    body.validate().map_err(AppError::Unprocessable)?;

    let branch = BranchRepository::new(state.pool()).create(&body).await?;
    tracing::info!(branch_id = %branch.id, name = %branch.name, "Branch created");
    Ok((StatusCode::CREATED, Json(branch)))
}

/// GET /api/branches/{id}
async fn show(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<BranchId>,
) -> Result<Json<Branch>, AppError> {
    Ok(Json(load_branch(&state, id).await?))
}

/// Replace a branch's details, hours and tax rate.
///
/// Branch admins may edit their own branch.
///
/// PUT /api/branches/{id}
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn update(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<BranchId>,
    Json(body): Json<BranchInput>,
) -> Result<Json<Branch>, AppError> {
    if !user.role.can(Capability::ManageBranches) {
        user.require(Capability::ManageOwnBranch)?;
        user.ensure_branch(id)?;
    }
    body.validate().map_err(AppError::Unprocessable)?;

    let branch = BranchRepository::new(state.pool()).update(id, &body).await?;
    tracing::info!(branch_id = %id, "Branch updated");
    Ok(Json(branch))
}

/// Open or close a branch.
///
/// POST /api/branches/{id}/active
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn set_active(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<BranchId>,
    Json(body): Json<ActiveToggle>,
) -> Result<Json<Branch>, AppError> {
    user.require(Capability::ManageBranches)?;
    BranchRepository::new(state.pool())
        .set_active(id, body.active)
        .await?;
    tracing::info!(branch_id = %id, active = body.active, "Branch status changed");
    Ok(Json(load_branch(&state, id).await?))
}
