//! Account bootstrap commands.
//!
//! The first system admin has to be created here; everyone else can be
//! created from the dashboard afterwards.

use salonhub_admin::models::NewUser;
use salonhub_admin::services::AuthService;
use salonhub_core::{BranchId, Role};
use thiserror::Error;

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum UserCommandError {
    /// Invalid role.
    #[error(
        "Invalid role: {0}. Valid roles: system_admin, operational_manager, branch_admin, branch_manager, stylist, client"
    )]
    InvalidRole(String),
}

/// Create an account with a password.
///
/// # Errors
///
/// Returns an error for an unknown role, an invalid email or password, a
/// missing branch for a branch-scoped role, or an email already in use.
pub async fn create(
    email: &str,
    name: &str,
    role: &str,
    branch: Option<i32>,
    password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let role: Role = role
        .parse()
        .map_err(|_| UserCommandError::InvalidRole(role.to_owned()))?;

    let pool = super::connect().await?;
    let user = AuthService::new(&pool)
        .create_user(&NewUser {
            email: email.to_owned(),
            name: name.to_owned(),
            phone: None,
            role,
            branch_id: branch.map(BranchId::new),
            password: Some(password.to_owned()),
        })
        .await?;

    tracing::info!("Account created successfully!");
    tracing::info!("  ID: {}", user.id);
    tracing::info!("  Email: {}", user.email);
    tracing::info!("  Name: {}", user.name);
    tracing::info!("  Role: {}", user.role);
    if let Some(branch) = user.branch_id {
        tracing::info!("  Branch: {}", branch);
    }
    Ok(())
}
