//! Authentication route handlers.
//!
//! The login page posts a form and redirects to the dashboard. The JSON
//! endpoints under `/api/auth` serve the same session to API clients and
//! handle client self-registration.

use askama::Template;
use axum::{
    Form, Json, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{OptionalAuth, RequireAuth, clear_current_user, set_current_user};
use crate::models::{ClientRegistration, CurrentUser, User};
use crate::routes::render;
use crate::services::{AuthError, AuthService};
use crate::state::AppState;

/// Login page template.
#[derive(Template)]
#[template(path = "auth/login.html")]
struct LoginPageTemplate {
    email: String,
    error: Option<String>,
}

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", get(login_page).post(login_form))
        .route("/auth/logout", post(logout))
        .route("/api/auth/login", post(api_login))
        .route("/api/auth/register", post(api_register))
        .route("/api/auth/logout", post(api_logout))
        .route("/api/auth/me", get(me))
        .route("/api/auth/password", post(change_password))
}

/// Email and password credentials.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of a password change.
#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

/// Check credentials. A malformed email reads as wrong credentials.
async fn authenticate(state: &AppState, credentials: &LoginRequest) -> Result<User, AuthError> {
    AuthService::new(state.pool())
        .login(&credentials.email, &credentials.password)
        .await
        .map_err(|e| match e {
            AuthError::InvalidEmail(_) => AuthError::InvalidCredentials,
            other => other,
        })
}

async fn start_session(session: &Session, user: &User) -> Result<CurrentUser, AppError> {
    let current = CurrentUser::from(user);
    set_current_user(session, &current).await?;
    set_sentry_user(current.id, Some(current.email.as_str()));
    tracing::info!(user_id = %current.id, role = %current.role, "Signed in");
    Ok(current)
}

/// Render the login page, or go straight to the dashboard when signed in.
///
/// GET /auth/login
async fn login_page(OptionalAuth(user): OptionalAuth) -> Result<Response, AppError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    let page: Html<String> = render(&LoginPageTemplate {
        email: String::new(),
        error: None,
    })?;
    Ok(page.into_response())
}

/// Handle the login form.
///
/// POST /auth/login
#[instrument(skip(state, session, form), fields(email = %form.email))]
async fn login_form(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginRequest>,
) -> Result<Response, AppError> {
    match authenticate(&state, &form).await {
        Ok(user) => {
            start_session(&session, &user).await?;
            Ok(Redirect::to("/").into_response())
        }
        Err(e @ (AuthError::InvalidCredentials | AuthError::AccountDisabled)) => {
            tracing::warn!(error = %e, "Login failed");
            let page = render(&LoginPageTemplate {
                email: form.email,
                error: Some(match e {
                    AuthError::AccountDisabled => "This account has been disabled.".to_string(),
                    _ => "Invalid email or password.".to_string(),
                }),
            })?;
            Ok((StatusCode::UNAUTHORIZED, page).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// Logout and clear session.
///
/// POST /auth/logout
async fn logout(session: Session) -> impl IntoResponse {
    if let Err(e) = clear_current_user(&session).await {
        tracing::warn!(error = %e, "Failed to clear session on logout");
    }
    clear_sentry_user();
    Redirect::to("/auth/login")
}

/// Sign in and return the session user.
///
/// POST /api/auth/login
#[instrument(skip(state, session, body), fields(email = %body.email))]
async fn api_login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<CurrentUser>, AppError> {
    let user = authenticate(&state, &body).await?;
    Ok(Json(start_session(&session, &user).await?))
}

/// Create a client account and sign it in.
///
/// POST /api/auth/register
#[instrument(skip(state, session, body), fields(email = %body.email))]
async fn api_register(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<ClientRegistration>,
) -> Result<(StatusCode, Json<CurrentUser>), AppError> {
    let user = AuthService::new(state.pool()).register_client(body).await?;
    let current = start_session(&session, &user).await?;
    Ok((StatusCode::CREATED, Json(current)))
}

/// POST /api/auth/logout
async fn api_logout(session: Session) -> Result<StatusCode, AppError> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me
async fn me(RequireAuth(user): RequireAuth) -> Json<CurrentUser> {
    Json(user)
}

/// Change the signed-in user's password.
///
/// POST /api/auth/password
#[instrument(skip_all, fields(user_id = %user.id))]
async fn change_password(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<PasswordChange>,
) -> Result<StatusCode, AppError> {
    let auth = AuthService::new(state.pool());
    auth.login(user.email.as_str(), &body.current_password)
        .await
        .map_err(|e| match e {
            AuthError::InvalidCredentials => {
                AppError::Forbidden("current password is incorrect".to_string())
            }
            other => other.into(),
        })?;
    auth.set_password(user.id, &body.new_password).await?;
    tracing::info!("Password changed");
    Ok(StatusCode::NO_CONTENT)
}
