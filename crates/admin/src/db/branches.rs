//! Branch repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use salonhub_core::BranchId;
use salonhub_core::hours::OperatingHours;

use super::RepositoryError;
use crate::models::{Branch, BranchInput};

const BRANCH_COLUMNS: &str =
    "id, name, address, phone, email, operating_hours, tax_rate, is_active, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct BranchRow {
    id: i32,
    name: String,
    address: String,
    phone: Option<String>,
    email: Option<String>,
    operating_hours: Json<OperatingHours>,
    tax_rate: Decimal,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BranchRow> for Branch {
    fn from(row: BranchRow) -> Self {
        Self {
            id: BranchId::new(row.id),
            name: row.name,
            address: row.address,
            phone: row.phone,
            email: row.email,
            operating_hours: row.operating_hours.0,
            tax_rate: row.tax_rate,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for branch database operations.
pub struct BranchRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BranchRepository<'a> {
    /// Create a new branch repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List branches ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, active_only: bool) -> Result<Vec<Branch>, RepositoryError> {
        let rows: Vec<BranchRow> = sqlx::query_as(&format!(
            r"
            SELECT {BRANCH_COLUMNS} FROM salon.branch
            WHERE ($1 = FALSE OR is_active)
            ORDER BY name ASC
            "
        ))
        .bind(active_only)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a branch by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: BranchId) -> Result<Option<Branch>, RepositoryError> {
        let row: Option<BranchRow> = sqlx::query_as(&format!(
            "SELECT {BRANCH_COLUMNS} FROM salon.branch WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create a branch.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create(&self, input: &BranchInput) -> Result<Branch, RepositoryError> {
        let row: BranchRow = sqlx::query_as(&format!(
            r"
            INSERT INTO salon.branch (name, address, phone, email, operating_hours, tax_rate)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {BRANCH_COLUMNS}
            "
        ))
        .bind(input.name.trim())
        .bind(input.address.trim())
        .bind(input.phone.as_deref())
        .bind(input.email.as_deref())
        .bind(Json(&input.operating_hours))
        .bind(input.tax_rate)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "a branch with that name exists"))?;

        Ok(row.into())
    }

    /// Replace a branch's details.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the branch does not exist.
    /// Returns `RepositoryError::Conflict` if the new name is taken.
    pub async fn update(&self, id: BranchId, input: &BranchInput) -> Result<Branch, RepositoryError> {
        let row: Option<BranchRow> = sqlx::query_as(&format!(
            r"
            UPDATE salon.branch
            SET name = $2, address = $3, phone = $4, email = $5,
                operating_hours = $6, tax_rate = $7
            WHERE id = $1
            RETURNING {BRANCH_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.name.trim())
        .bind(input.address.trim())
        .bind(input.phone.as_deref())
        .bind(input.email.as_deref())
        .bind(Json(&input.operating_hours))
        .bind(input.tax_rate)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "a branch with that name exists"))?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Open or close a branch.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the branch does not exist.
    pub async fn set_active(&self, id: BranchId, active: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE salon.branch SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
