//! Staff and client accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salonhub_core::pagination::SortDirection;
use salonhub_core::{BranchId, Email, Role, UserId};

use super::require_text;

/// A staff member or client (domain type).
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub phone: Option<String>,
    pub role: Role,
    /// Home branch. Required for branch-scoped roles, optional for clients.
    pub branch_id: Option<BranchId>,
    /// Sum of the per-branch loyalty balances.
    pub loyalty_points: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating an account.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub branch_id: Option<BranchId>,
    /// Initial password. Accounts without one cannot sign in until it is set.
    #[serde(default)]
    pub password: Option<String>,
}

impl NewUser {
    /// Check the name and branch assignment.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        require_text(&self.name, "name")?;
        check_branch_assignment(self.role, self.branch_id)
    }
}

/// Self-service sign-up payload. Always creates a client account.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientRegistration {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// Preferred branch.
    #[serde(default)]
    pub branch_id: Option<BranchId>,
    pub password: String,
}

impl From<ClientRegistration> for NewUser {
    fn from(reg: ClientRegistration) -> Self {
        Self {
            email: reg.email,
            name: reg.name,
            phone: reg.phone,
            role: Role::Client,
            branch_id: reg.branch_id,
            password: Some(reg.password),
        }
    }
}

/// Editable account fields (full replacement).
#[derive(Debug, Clone, Deserialize)]
pub struct UserUpdate {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub branch_id: Option<BranchId>,
}

impl UserUpdate {
    /// Check the name and branch assignment.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        require_text(&self.name, "name")?;
        check_branch_assignment(self.role, self.branch_id)
    }
}

/// Branch-scoped roles need a branch; platform-wide roles must not have one.
fn check_branch_assignment(role: Role, branch_id: Option<BranchId>) -> Result<(), String> {
    match (role.is_branch_scoped(), branch_id) {
        (true, None) => Err(format!("{} accounts must belong to a branch", role.label())),
        (false, Some(_)) if role.is_staff() => {
            Err(format!("{} accounts cannot belong to a branch", role.label()))
        }
        _ => Ok(()),
    }
}

/// Sortable user columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserSort {
    #[default]
    Name,
    CreatedAt,
    LoyaltyPoints,
}

impl UserSort {
    /// Column name for `ORDER BY`.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::CreatedAt => "created_at",
            Self::LoyaltyPoints => "loyalty_points",
        }
    }
}

/// Query-string filter for user lists.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub branch_id: Option<BranchId>,
    /// Matches name, email or phone.
    pub search: Option<String>,
    pub active: Option<bool>,
    pub sort: UserSort,
    pub direction: SortDirection,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(role: Role, branch_id: Option<BranchId>) -> NewUser {
        NewUser {
            email: "maria@salon.test".to_string(),
            name: "Maria".to_string(),
            phone: None,
            role,
            branch_id,
            password: None,
        }
    }

    #[test]
    fn test_branch_scoped_roles_need_branch() {
        assert!(new_user(Role::Stylist, None).validate().is_err());
        assert!(new_user(Role::Stylist, Some(BranchId::new(1))).validate().is_ok());
        assert!(new_user(Role::BranchAdmin, None).validate().is_err());
    }

    #[test]
    fn test_platform_roles_have_no_branch() {
        assert!(
            new_user(Role::OperationalManager, Some(BranchId::new(1)))
                .validate()
                .is_err()
        );
        assert!(new_user(Role::SystemAdmin, None).validate().is_ok());
    }

    #[test]
    fn test_clients_may_have_home_branch() {
        assert!(new_user(Role::Client, None).validate().is_ok());
        assert!(new_user(Role::Client, Some(BranchId::new(2))).validate().is_ok());
    }

    #[test]
    fn test_blank_name_rejected() {
        let mut user = new_user(Role::Client, None);
        user.name = "  ".to_string();
        assert_eq!(user.validate(), Err("name is required".to_string()));
    }
}
