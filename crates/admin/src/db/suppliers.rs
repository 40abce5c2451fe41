//! Supplier repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use salonhub_core::SupplierId;

use super::RepositoryError;
use crate::models::{Supplier, SupplierInput, non_blank};

const SUPPLIER_COLUMNS: &str =
    "id, name, contact_name, email, phone, address, notes, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct SupplierRow {
    id: i32,
    name: String,
    contact_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SupplierRow> for Supplier {
    fn from(row: SupplierRow) -> Self {
        Self {
            id: SupplierId::new(row.id),
            name: row.name,
            contact_name: row.contact_name,
            email: row.email,
            phone: row.phone,
            address: row.address,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for supplier database operations.
pub struct SupplierRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SupplierRepository<'a> {
    /// Create a new supplier repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all suppliers ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Supplier>, RepositoryError> {
        let rows: Vec<SupplierRow> = sqlx::query_as(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM salon.supplier ORDER BY name ASC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a supplier by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: SupplierId) -> Result<Option<Supplier>, RepositoryError> {
        let row: Option<SupplierRow> = sqlx::query_as(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM salon.supplier WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create a supplier.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    pub async fn create(&self, input: &SupplierInput) -> Result<Supplier, RepositoryError> {
        let row: SupplierRow = sqlx::query_as(&format!(
            r"
            INSERT INTO salon.supplier (name, contact_name, email, phone, address, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {SUPPLIER_COLUMNS}
            "
        ))
        .bind(input.name.trim())
        .bind(non_blank(input.contact_name.as_deref()))
        .bind(non_blank(input.email.as_deref()))
        .bind(non_blank(input.phone.as_deref()))
        .bind(non_blank(input.address.as_deref()))
        .bind(non_blank(input.notes.as_deref()))
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "a supplier with that name exists"))?;

        Ok(row.into())
    }

    /// Replace a supplier's details.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the supplier does not exist.
    /// Returns `RepositoryError::Conflict` if the new name is taken.
    pub async fn update(
        &self,
        id: SupplierId,
        input: &SupplierInput,
    ) -> Result<Supplier, RepositoryError> {
        let row: Option<SupplierRow> = sqlx::query_as(&format!(
            r"
            UPDATE salon.supplier
            SET name = $2, contact_name = $3, email = $4, phone = $5, address = $6, notes = $7
            WHERE id = $1
            RETURNING {SUPPLIER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.name.trim())
        .bind(non_blank(input.contact_name.as_deref()))
        .bind(non_blank(input.email.as_deref()))
        .bind(non_blank(input.phone.as_deref()))
        .bind(non_blank(input.address.as_deref()))
        .bind(non_blank(input.notes.as_deref()))
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "a supplier with that name exists"))?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Delete a supplier that no product references.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the supplier does not exist.
    /// Returns `RepositoryError::Conflict` if products still reference it.
    pub async fn delete(&self, id: SupplierId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM salon.supplier WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::from_constraint(e, "supplier still has products"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
