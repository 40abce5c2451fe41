//! HTTP route handlers for the dashboard server.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health, /health/ready          - Liveness and readiness
//!
//! # Pages
//! GET  /auth/login                      - Login page
//! POST /auth/login                      - Login form
//! POST /auth/logout                     - Logout
//! GET  /                                - Role dashboard
//!
//! # JSON API (session auth)
//! /api/auth/*                           - login, register, logout, me, password
//! /api/dashboard                        - Role-scoped summary
//! /api/users, /api/clients              - Accounts and loyalty
//! /api/branches, /api/services          - Branches and service menu
//! /api/products, /api/suppliers         - Retail inventory
//! /api/appointments                     - Bookings
//! /api/transactions                     - Point of sale
//! /api/content                          - Homepage and branch pages, images
//! /api/public/*                         - Unauthenticated site content
//! ```

pub mod appointments;
pub mod auth;
pub mod branches;
pub mod catalogue;
pub mod content;
pub mod dashboard;
pub mod inventory;
pub mod public;
pub mod transactions;
pub mod users;

use askama::Template;
use axum::{Router, extract::State, http::StatusCode, response::Html, routing::get};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

/// Body of the `/active` toggle endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ActiveToggle {
    pub active: bool,
}

/// Create all routes for the dashboard server.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(auth::router())
        .merge(dashboard::router())
        .merge(users::router())
        .merge(branches::router())
        .merge(catalogue::router())
        .merge(inventory::router())
        .merge(appointments::router())
        .merge(transactions::router())
        .merge(content::router())
        .merge(public::router())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Today's date in the salon's local time.
pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Render an askama page.
pub(crate) fn render<T: Template>(template: &T) -> Result<Html<String>, AppError> {
    template
        .render()
        .map(Html)
        .map_err(|e| AppError::Internal(format!("template error: {e}")))
}
