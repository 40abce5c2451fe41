//! Unauthenticated content for the public site.
//!
//! Only open branches and active services are exposed, and branch
//! announcements outside their display window are filtered out.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use chrono::Utc;
use serde::Serialize;

use salonhub_core::content::{BranchContent, HomepageContent};
use salonhub_core::pagination::{MAX_PER_PAGE, PageRequest};
use salonhub_core::BranchId;

use crate::db::{BranchRepository, SalonServiceRepository};
use crate::error::AppError;
use crate::models::{Branch, SalonService, ServiceFilter};
use crate::state::AppState;

/// Build the public router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/public/homepage", get(homepage))
        .route("/api/public/branches", get(branches))
        .route("/api/public/branches/{id}", get(branch))
}

/// A branch's public page.
#[derive(Debug, Serialize)]
pub struct BranchPage {
    pub branch: Branch,
    pub content: BranchContent,
    pub services: Vec<SalonService>,
}

/// GET /api/public/homepage
async fn homepage(State(state): State<AppState>) -> Result<Json<HomepageContent>, AppError> {
    let content = state.content().homepage().await?;
    Ok(Json(HomepageContent::clone(&content)))
}

/// GET /api/public/branches
async fn branches(State(state): State<AppState>) -> Result<Json<Vec<Branch>>, AppError> {
    Ok(Json(BranchRepository::new(state.pool()).list(true).await?))
}

/// GET /api/public/branches/{id}
async fn branch(
    State(state): State<AppState>,
    Path(id): Path<BranchId>,
) -> Result<Json<BranchPage>, AppError> {
    let branch = BranchRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|b| b.is_active)
        .ok_or_else(|| AppError::NotFound(format!("branch {id}")))?;

    let content = state.content().branch_content(id).await?;
    let filter = ServiceFilter {
        branch_id: Some(id),
        active: Some(true),
        ..ServiceFilter::default()
    };
    let services = SalonServiceRepository::new(state.pool())
        .list(&filter, PageRequest::new(1, MAX_PER_PAGE))
        .await?;

    Ok(Json(BranchPage {
        branch,
        content: content.visible_at(Utc::now()),
        services: services.items,
    }))
}
