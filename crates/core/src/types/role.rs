//! User roles and the permission table.
//!
//! Every account in SalonHub has exactly one [`Role`]. Roles decide which
//! dashboard a user lands on, which [`Capability`]s they hold, and which
//! other accounts they may create or edit ([`can_manage_user`]).
//!
//! Branch-scoped roles (branch admin, branch manager, stylist) are tied to a
//! single branch; the admin server enforces that they only see and modify
//! records belonging to it.

use serde::{Deserialize, Serialize};

/// Account role, from most to least privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "salon.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Owns the platform: every branch, every account, all content.
    SystemAdmin,
    /// Runs day-to-day operations across all branches.
    OperationalManager,
    /// Administers a single branch, including its staff and content.
    BranchAdmin,
    /// Manages front-desk operations of a single branch.
    BranchManager,
    /// Serves clients at a single branch.
    Stylist,
    /// A salon customer.
    Client,
}

/// An action guarded by the permission table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Create branches and change any branch's details.
    ManageBranches,
    /// Edit hours and configuration of one's own branch.
    ManageOwnBranch,
    /// Create and edit staff and client accounts.
    ManageUsers,
    /// Maintain the service menu.
    ManageServices,
    /// Maintain products and stock.
    ManageProducts,
    /// Maintain the supplier list.
    ManageSuppliers,
    /// Book, reschedule and update appointments for anyone.
    ManageAppointments,
    /// Ring up sales at the point of sale.
    ProcessTransactions,
    /// Void completed sales.
    VoidTransactions,
    /// Manually credit or debit loyalty points.
    AdjustLoyalty,
    /// Edit the public homepage.
    ManageHomepage,
    /// Edit a branch's public page.
    ManageBranchContent,
    /// See revenue and activity reports.
    ViewReports,
}

impl Role {
    /// All roles, most privileged first.
    pub const ALL: [Self; 6] = [
        Self::SystemAdmin,
        Self::OperationalManager,
        Self::BranchAdmin,
        Self::BranchManager,
        Self::Stylist,
        Self::Client,
    ];

    /// Privilege rank; lower is more privileged.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::SystemAdmin => 0,
            Self::OperationalManager => 1,
            Self::BranchAdmin => 2,
            Self::BranchManager => 3,
            Self::Stylist => 4,
            Self::Client => 5,
        }
    }

    /// Returns `true` for every role except [`Role::Client`].
    #[must_use]
    pub const fn is_staff(self) -> bool {
        !matches!(self, Self::Client)
    }

    /// Returns `true` for roles that must belong to exactly one branch.
    #[must_use]
    pub const fn is_branch_scoped(self) -> bool {
        matches!(self, Self::BranchAdmin | Self::BranchManager | Self::Stylist)
    }

    /// Human-readable label used on dashboards.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::SystemAdmin => "System Admin",
            Self::OperationalManager => "Operational Manager",
            Self::BranchAdmin => "Branch Admin",
            Self::BranchManager => "Branch Manager",
            Self::Stylist => "Stylist",
            Self::Client => "Client",
        }
    }

    /// Whether this role holds `capability`.
    #[must_use]
    pub const fn can(self, capability: Capability) -> bool {
        use Capability as C;

        match self {
            Self::SystemAdmin => true,
            Self::OperationalManager => !matches!(capability, C::ManageHomepage),
            Self::BranchAdmin => matches!(
                capability,
                C::ManageOwnBranch
                    | C::ManageUsers
                    | C::ManageServices
                    | C::ManageProducts
                    | C::ManageAppointments
                    | C::ProcessTransactions
                    | C::VoidTransactions
                    | C::AdjustLoyalty
                    | C::ManageBranchContent
                    | C::ViewReports
            ),
            Self::BranchManager => matches!(
                capability,
                C::ManageUsers
                    | C::ManageProducts
                    | C::ManageAppointments
                    | C::ProcessTransactions
                    | C::ViewReports
            ),
            Self::Stylist => matches!(capability, C::ProcessTransactions),
            Self::Client => false,
        }
    }
}

/// Whether an `actor` may create, edit or deactivate an account with the
/// `target` role.
///
/// System admins manage every role. Everyone else manages only roles
/// strictly below their own, and stylists and clients manage nobody.
/// Branch scoping is checked separately by the caller.
#[must_use]
pub const fn can_manage_user(actor: Role, target: Role) -> bool {
    match actor {
        Role::SystemAdmin => true,
        Role::OperationalManager | Role::BranchAdmin | Role::BranchManager => {
            target.rank() > actor.rank()
        }
        Role::Stylist | Role::Client => false,
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SystemAdmin => "system_admin",
            Self::OperationalManager => "operational_manager",
            Self::BranchAdmin => "branch_admin",
            Self::BranchManager => "branch_manager",
            Self::Stylist => "stylist",
            Self::Client => "client",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system_admin" => Ok(Self::SystemAdmin),
            "operational_manager" => Ok(Self::OperationalManager),
            "branch_admin" => Ok(Self::BranchAdmin),
            "branch_manager" => Ok(Self::BranchManager),
            "stylist" => Ok(Self::Stylist),
            "client" => Ok(Self::Client),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_from_str_agree() {
        for role in Role::ALL {
            let parsed: Role = role.to_string().parse().unwrap();
            assert_eq!(parsed, role);
        }
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_system_admin_manages_everyone() {
        for target in Role::ALL {
            assert!(can_manage_user(Role::SystemAdmin, target));
        }
    }

    #[test]
    fn test_managers_only_manage_lower_roles() {
        assert!(can_manage_user(Role::OperationalManager, Role::BranchAdmin));
        assert!(!can_manage_user(Role::OperationalManager, Role::OperationalManager));
        assert!(!can_manage_user(Role::OperationalManager, Role::SystemAdmin));

        assert!(can_manage_user(Role::BranchAdmin, Role::BranchManager));
        assert!(can_manage_user(Role::BranchAdmin, Role::Client));
        assert!(!can_manage_user(Role::BranchAdmin, Role::BranchAdmin));

        assert!(can_manage_user(Role::BranchManager, Role::Stylist));
        assert!(!can_manage_user(Role::BranchManager, Role::BranchAdmin));
    }

    #[test]
    fn test_stylists_and_clients_manage_nobody() {
        for target in Role::ALL {
            assert!(!can_manage_user(Role::Stylist, target));
            assert!(!can_manage_user(Role::Client, target));
        }
    }

    #[test]
    fn test_capabilities() {
        assert!(Role::SystemAdmin.can(Capability::ManageHomepage));
        assert!(!Role::OperationalManager.can(Capability::ManageHomepage));
        assert!(Role::OperationalManager.can(Capability::ManageBranches));
        assert!(!Role::BranchAdmin.can(Capability::ManageBranches));
        assert!(Role::BranchAdmin.can(Capability::ManageOwnBranch));
        assert!(!Role::BranchManager.can(Capability::VoidTransactions));
        assert!(Role::Stylist.can(Capability::ProcessTransactions));
        assert!(!Role::Stylist.can(Capability::ManageAppointments));
        assert!(!Role::Client.can(Capability::ProcessTransactions));
    }

    #[test]
    fn test_branch_scoping() {
        assert!(Role::Stylist.is_branch_scoped());
        assert!(!Role::OperationalManager.is_branch_scoped());
        assert!(!Role::Client.is_branch_scoped());
        assert!(!Role::Client.is_staff());
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&Role::BranchManager).unwrap();
        assert_eq!(json, "\"branch_manager\"");
    }
}
