//! Authentication extractors and permission checks.
//!
//! The signed-in user is stored in the session as a [`CurrentUser`].
//! Every request checks the stored identity against the account row, so
//! deactivation ends live sessions and role or branch changes apply at
//! once. Extractors reject anonymous requests; the `CurrentUser` methods
//! below check role capabilities and branch scoping inside handlers.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use salonhub_core::{BranchId, Capability, Role, UserId, can_manage_user};

use crate::db::UserRepository;
use crate::error::AppError;
use crate::models::{CurrentUser, User, session_keys};
use crate::state::AppState;

/// Extractor that requires a signed-in user.
///
/// If nobody is signed in, returns 401 Unauthorized for `/api/` requests
/// and a redirect to the login page for everything else.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor that requires a signed-in staff member (any role but client).
pub struct RequireStaff(pub CurrentUser);

/// Extractor that optionally gets the signed-in user.
pub struct OptionalAuth(pub Option<CurrentUser>);

/// Error returned when authentication is required.
#[derive(Debug)]
pub enum AuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin,
    /// Unauthorized response (for API requests).
    Unauthorized,
    /// Signed in, but clients may not use this resource.
    Forbidden,
    /// The account could not be checked.
    Internal,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/auth/login").into_response(),
            Self::Unauthorized => AppError::Unauthorized("sign in required".to_string())
                .into_response(),
            Self::Forbidden => AppError::Forbidden("staff only".to_string()).into_response(),
            Self::Internal => {
                AppError::Internal("could not load the signed-in account".to_string())
                    .into_response()
            }
        }
    }
}

/// Outcome of checking a session identity against the account row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCheck {
    /// The session still matches the account.
    Valid,
    /// The account changed; continue as the refreshed identity.
    Refresh(CurrentUser),
    /// The account is gone or deactivated.
    Revoked,
}

/// Compare the identity stored at sign-in with the account as it is now.
#[must_use]
pub fn check_session(stored: &CurrentUser, account: Option<&User>) -> SessionCheck {
    match account {
        Some(user) if user.is_active => {
            let current = CurrentUser::from(user);
            if current == *stored {
                SessionCheck::Valid
            } else {
                SessionCheck::Refresh(current)
            }
        }
        _ => SessionCheck::Revoked,
    }
}

/// The signed-in user, re-checked against the database.
async fn session_user(parts: &Parts, state: &AppState) -> Result<Option<CurrentUser>, AuthRejection> {
    let Some(session) = parts.extensions.get::<Session>() else {
        return Ok(None);
    };
    let Some(stored) = session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
    else {
        return Ok(None);
    };

    let account = UserRepository::new(state.pool())
        .get(stored.id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %stored.id, "Failed to load session account");
            AuthRejection::Internal
        })?;

    match check_session(&stored, account.as_ref()) {
        SessionCheck::Valid => Ok(Some(stored)),
        SessionCheck::Refresh(current) => {
            if let Err(e) = session.insert(session_keys::CURRENT_USER, &current).await {
                tracing::warn!(error = %e, "Failed to refresh session user");
            }
            tracing::info!(user_id = %current.id, role = %current.role, "Session refreshed");
            Ok(Some(current))
        }
        SessionCheck::Revoked => {
            if let Err(e) = session.flush().await {
                tracing::warn!(error = %e, "Failed to end revoked session");
            }
            tracing::info!(user_id = %stored.id, "Session ended for inactive account");
            Ok(None)
        }
    }
}

fn anonymous_rejection(parts: &Parts) -> AuthRejection {
    if parts.uri.path().starts_with("/api/") {
        AuthRejection::Unauthorized
    } else {
        AuthRejection::RedirectToLogin
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let user = session_user(parts, &state)
            .await?
            .ok_or_else(|| anonymous_rejection(parts))?;
        Ok(Self(user))
    }
}

impl<S> FromRequestParts<S> for RequireStaff
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let user = session_user(parts, &state)
            .await?
            .ok_or_else(|| anonymous_rejection(parts))?;

        if !user.role.is_staff() {
            return Err(AuthRejection::Forbidden);
        }

        Ok(Self(user))
    }
}

impl<S> FromRequestParts<S> for OptionalAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        Ok(Self(session_user(parts, &state).await?))
    }
}

impl CurrentUser {
    /// Fail with 403 unless the role holds `capability`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` if the role lacks the capability.
    pub fn require(&self, capability: Capability) -> Result<(), AppError> {
        if self.role.can(capability) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "{} cannot perform this action",
                self.role.label()
            )))
        }
    }

    /// Fail with 403 if a branch-scoped user touches another branch.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` for a branch outside the user's scope.
    pub fn ensure_branch(&self, branch: BranchId) -> Result<(), AppError> {
        if !self.role.is_branch_scoped() || self.branch_id == Some(branch) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "this record belongs to another branch".to_string(),
            ))
        }
    }

    /// Branch filter to apply to a list request.
    ///
    /// Branch-scoped roles always see their own branch; other roles get
    /// whatever they asked for.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` if a branch-scoped user asks for
    /// another branch.
    pub fn scope_branch(&self, requested: Option<BranchId>) -> Result<Option<BranchId>, AppError> {
        if !self.role.is_branch_scoped() {
            return Ok(requested);
        }
        match requested {
            Some(branch) => {
                self.ensure_branch(branch)?;
                Ok(Some(branch))
            }
            None => Ok(self.branch_id),
        }
    }

    /// Fail with 403 unless this user may manage an account with `role` at
    /// `branch`. Branch scoping does not apply to client accounts.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` if the role ranks too low or the
    /// account belongs to another branch.
    pub fn ensure_can_manage(&self, role: Role, branch: Option<BranchId>) -> Result<(), AppError> {
        self.require(Capability::ManageUsers)?;
        if !can_manage_user(self.role, role) {
            return Err(AppError::Forbidden(format!(
                "{} cannot manage {} accounts",
                self.role.label(),
                role.label()
            )));
        }
        // Clients are shared by every branch
        if self.role.is_branch_scoped() && role != Role::Client {
            match branch {
                Some(branch) => self.ensure_branch(branch)?,
                None => {
                    return Err(AppError::Forbidden(
                        "this account belongs to another branch".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Whether `id` is this user.
    #[must_use]
    pub fn is(&self, id: UserId) -> bool {
        self.id == id
    }
}

/// Store the signed-in user in the session.
///
/// The session id is cycled first so a pre-login id cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Sign out by discarding the whole session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use salonhub_core::Email;

    fn user(role: Role, branch: Option<i32>) -> CurrentUser {
        CurrentUser {
            id: UserId::new(1),
            email: Email::parse("staff@example.com").unwrap(),
            name: "Staff".to_string(),
            role,
            branch_id: branch.map(BranchId::new),
        }
    }

    fn account(role: Role, branch: Option<i32>, active: bool) -> User {
        User {
            id: UserId::new(1),
            email: Email::parse("staff@example.com").unwrap(),
            name: "Staff".to_string(),
            phone: None,
            role,
            branch_id: branch.map(BranchId::new),
            loyalty_points: 0,
            is_active: active,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_unchanged_account_keeps_session() {
        let stored = user(Role::BranchAdmin, Some(1));
        let row = account(Role::BranchAdmin, Some(1), true);
        assert_eq!(check_session(&stored, Some(&row)), SessionCheck::Valid);
    }

    #[test]
    fn test_deactivated_or_deleted_account_is_signed_out() {
        let stored = user(Role::BranchAdmin, Some(1));
        let row = account(Role::BranchAdmin, Some(1), false);
        assert_eq!(check_session(&stored, Some(&row)), SessionCheck::Revoked);
        assert_eq!(check_session(&stored, None), SessionCheck::Revoked);
    }

    #[test]
    fn test_demoted_account_uses_new_role() {
        let stored = user(Role::BranchAdmin, Some(1));
        let row = account(Role::Stylist, Some(2), true);
        let SessionCheck::Refresh(current) = check_session(&stored, Some(&row)) else {
            panic!("expected a refreshed identity");
        };
        assert_eq!(current.role, Role::Stylist);
        assert_eq!(current.branch_id, Some(BranchId::new(2)));
        assert!(current.require(Capability::VoidTransactions).is_err());
    }

    #[test]
    fn test_require_capability() {
        assert!(user(Role::Stylist, Some(1)).require(Capability::ProcessTransactions).is_ok());
        assert!(user(Role::Stylist, Some(1)).require(Capability::VoidTransactions).is_err());
        assert!(user(Role::SystemAdmin, None).require(Capability::ManageHomepage).is_ok());
    }

    #[test]
    fn test_branch_scoping() {
        let manager = user(Role::BranchManager, Some(1));
        assert!(manager.ensure_branch(BranchId::new(1)).is_ok());
        assert!(manager.ensure_branch(BranchId::new(2)).is_err());
        assert_eq!(manager.scope_branch(None).unwrap(), Some(BranchId::new(1)));
        assert!(manager.scope_branch(Some(BranchId::new(2))).is_err());

        let ops = user(Role::OperationalManager, None);
        assert!(ops.ensure_branch(BranchId::new(2)).is_ok());
        assert_eq!(ops.scope_branch(None).unwrap(), None);
        assert_eq!(
            ops.scope_branch(Some(BranchId::new(2))).unwrap(),
            Some(BranchId::new(2))
        );
    }

    #[test]
    fn test_manage_accounts() {
        let branch_admin = user(Role::BranchAdmin, Some(1));
        assert!(branch_admin.ensure_can_manage(Role::Stylist, Some(BranchId::new(1))).is_ok());
        assert!(branch_admin.ensure_can_manage(Role::Stylist, Some(BranchId::new(2))).is_err());
        assert!(branch_admin.ensure_can_manage(Role::BranchAdmin, Some(BranchId::new(1))).is_err());
        assert!(branch_admin.ensure_can_manage(Role::Client, None).is_ok());

        let stylist = user(Role::Stylist, Some(1));
        assert!(stylist.ensure_can_manage(Role::Client, Some(BranchId::new(1))).is_err());
    }
}
