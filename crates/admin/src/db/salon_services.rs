//! Service menu repository.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use salonhub_core::pagination::{Page, PageRequest};
use salonhub_core::{BranchId, Money, ServiceId};

use super::{RepositoryError, like_pattern};
use crate::models::{SalonService, ServiceFilter, ServiceInput};

const SERVICE_COLUMNS: &str = "id, name, description, category, price, duration_minutes, \
                               branch_ids, image_url, is_active, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ServiceRow {
    id: i32,
    name: String,
    description: String,
    category: String,
    price: Money,
    duration_minutes: i32,
    branch_ids: Vec<i32>,
    image_url: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ServiceRow> for SalonService {
    fn from(row: ServiceRow) -> Self {
        Self {
            id: ServiceId::new(row.id),
            name: row.name,
            description: row.description,
            category: row.category,
            price: row.price,
            duration_minutes: row.duration_minutes,
            branch_ids: row.branch_ids.into_iter().map(BranchId::new).collect(),
            image_url: row.image_url,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn branch_array(ids: &[BranchId]) -> Vec<i32> {
    let mut ids: Vec<i32> = ids.iter().map(BranchId::as_i32).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Repository for service menu operations.
pub struct SalonServiceRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SalonServiceRepository<'a> {
    /// Create a new service repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List services matching `filter`, ordered by category then name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ServiceFilter,
        page: PageRequest,
    ) -> Result<Page<SalonService>, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM salon.service");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {SERVICE_COLUMNS} FROM salon.service"));
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY category ASC, name ASC, id ASC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<ServiceRow> = query.build_query_as().fetch_all(self.pool).await?;
        Ok(Page::new(
            rows.into_iter().map(Into::into).collect(),
            page,
            u64::try_from(total).unwrap_or(0),
        ))
    }

    /// Get a service by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ServiceId) -> Result<Option<SalonService>, RepositoryError> {
        let row: Option<ServiceRow> = sqlx::query_as(&format!(
            "SELECT {SERVICE_COLUMNS} FROM salon.service WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Get several services by ID. Unknown IDs are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ServiceId]) -> Result<Vec<SalonService>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = ids.iter().map(ServiceId::as_i32).collect();
        let rows: Vec<ServiceRow> = sqlx::query_as(&format!(
            "SELECT {SERVICE_COLUMNS} FROM salon.service WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Create a service.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, input: &ServiceInput) -> Result<SalonService, RepositoryError> {
        let row: ServiceRow = sqlx::query_as(&format!(
            r"
            INSERT INTO salon.service
                (name, description, category, price, duration_minutes, branch_ids, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {SERVICE_COLUMNS}
            "
        ))
        .bind(input.name.trim())
        .bind(input.description.trim())
        .bind(input.category.trim())
        .bind(input.price.round())
        .bind(input.duration_minutes)
        .bind(branch_array(&input.branch_ids))
        .bind(input.image_url.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Replace a service's details.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the service does not exist.
    pub async fn update(
        &self,
        id: ServiceId,
        input: &ServiceInput,
    ) -> Result<SalonService, RepositoryError> {
        let row: Option<ServiceRow> = sqlx::query_as(&format!(
            r"
            UPDATE salon.service
            SET name = $2, description = $3, category = $4, price = $5,
                duration_minutes = $6, branch_ids = $7, image_url = $8
            WHERE id = $1
            RETURNING {SERVICE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.name.trim())
        .bind(input.description.trim())
        .bind(input.category.trim())
        .bind(input.price.round())
        .bind(input.duration_minutes)
        .bind(branch_array(&input.branch_ids))
        .bind(input.image_url.as_deref())
        .fetch_optional(self.pool)
        .await?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Enable or retire a service.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the service does not exist.
    pub async fn set_active(&self, id: ServiceId, active: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE salon.service SET is_active = $2 WHERE id = $1")
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

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &ServiceFilter) {
    query.push(" WHERE TRUE");
    if let Some(branch_id) = filter.branch_id {
        query.push(" AND ").push_bind(branch_id).push(" = ANY(branch_ids)");
    }
    if let Some(category) = filter.category.as_deref().filter(|c| !c.trim().is_empty()) {
        query.push(" AND category = ").push_bind(category.trim().to_owned());
    }
    if let Some(active) = filter.active {
        query.push(" AND is_active = ").push_bind(active);
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(search);
        query
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_array_sorted_and_unique() {
        let ids = [BranchId::new(3), BranchId::new(1), BranchId::new(3)];
        assert_eq!(branch_array(&ids), vec![1, 3]);
    }
}
