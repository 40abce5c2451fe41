//! Database access for the salon `PostgreSQL` schema.
//!
//! # Tables (schema `salon`)
//!
//! - `app_user` - staff and clients, with the denormalized loyalty total
//! - `branch` - salon locations, operating hours, tax rate
//! - `service` - service menu, offered at a set of branches
//! - `supplier`, `product` - retail inventory per branch
//! - `appointment` - bookings (branch-local times)
//! - `pos_transaction` - completed and voided sales
//! - `loyalty_balance`, `loyalty_entry` - per-branch points and their ledger
//! - `site_content` - CMS documents (JSONB)
//! - `session` - tower-sessions store
//!
//! # Migrations
//!
//! Migrations are stored in `crates/admin/migrations/` and run via:
//! ```bash
//! salon-cli migrate
//! ```

pub mod appointments;
pub mod branches;
pub mod content;
pub mod dashboard;
pub mod loyalty;
pub mod products;
pub mod salon_services;
pub mod suppliers;
pub mod transactions;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use appointments::AppointmentRepository;
pub use branches::BranchRepository;
pub use content::ContentRepository;
pub use dashboard::DashboardRepository;
pub use loyalty::{LedgerError, LoyaltyRepository};
pub use products::ProductRepository;
pub use salon_services::SalonServiceRepository;
pub use suppliers::SupplierRepository;
pub use transactions::TransactionRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map unique and foreign-key violations to `Conflict` with `message`.
    pub(crate) fn from_constraint(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && (db_err.is_unique_violation() || db_err.is_foreign_key_violation())
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// `%term%` pattern for `ILIKE` searches, with wildcards in `term` escaped.
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" anna "), "%anna%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
