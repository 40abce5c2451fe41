//! Session-stored identity of the signed-in user.

use serde::{Deserialize, Serialize};

use salonhub_core::{BranchId, Email, Role, UserId};

/// Minimal data stored in the session to identify the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub role: Role,
    /// Home branch. Always set for branch-scoped roles.
    pub branch_id: Option<BranchId>,
}

impl From<&super::User> for CurrentUser {
    fn from(user: &super::User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            branch_id: user.branch_id,
        }
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current signed-in user.
    pub const CURRENT_USER: &str = "current_user";
}
