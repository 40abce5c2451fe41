//! Product and stock repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use salonhub_core::pagination::{Page, PageRequest};
use salonhub_core::{BranchId, Money, ProductId, SupplierId};

use super::{RepositoryError, like_pattern};
use crate::models::{Product, ProductFilter, ProductInput};

const PRODUCT_COLUMNS: &str = "id, branch_id, supplier_id, name, sku, category, description, \
                               price, cost, stock, reorder_level, image_url, is_active, \
                               created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    branch_id: i32,
    supplier_id: Option<i32>,
    name: String,
    sku: Option<String>,
    category: String,
    description: String,
    price: Money,
    cost: Option<Money>,
    stock: i32,
    reorder_level: i32,
    image_url: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            branch_id: BranchId::new(row.branch_id),
            supplier_id: row.supplier_id.map(SupplierId::new),
            name: row.name,
            sku: row.sku,
            category: row.category,
            description: row.description,
            price: row.price,
            cost: row.cost,
            stock: row.stock,
            reorder_level: row.reorder_level,
            image_url: row.image_url,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Stock was too low to fulfil a sale line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockShortage {
    pub product_id: ProductId,
    pub available: i32,
    pub requested: i32,
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching `filter`, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM salon.product");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS} FROM salon.product"));
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY name ASC, id ASC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<ProductRow> = query.build_query_as().fetch_all(self.pool).await?;
        Ok(Page::new(
            rows.into_iter().map(Into::into).collect(),
            page,
            u64::try_from(total).unwrap_or(0),
        ))
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM salon.product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Get several products by ID. Unknown IDs are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM salon.product WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the SKU is already used at the
    /// branch, or the branch or supplier does not exist.
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let row: ProductRow = sqlx::query_as(&format!(
            r"
            INSERT INTO salon.product
                (branch_id, supplier_id, name, sku, category, description,
                 price, cost, stock, reorder_level, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(input.branch_id)
        .bind(input.supplier_id)
        .bind(input.name.trim())
        .bind(input.sku.as_deref().map(str::trim))
        .bind(input.category.trim())
        .bind(input.description.trim())
        .bind(input.price.round())
        .bind(input.cost.map(Money::round))
        .bind(input.stock)
        .bind(input.reorder_level)
        .bind(input.image_url.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            RepositoryError::from_constraint(e, "duplicate SKU or unknown branch/supplier")
        })?;

        Ok(row.into())
    }

    /// Replace a product's details. Stock is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn update(&self, id: ProductId, input: &ProductInput) -> Result<Product, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            r"
            UPDATE salon.product
            SET branch_id = $2, supplier_id = $3, name = $4, sku = $5, category = $6,
                description = $7, price = $8, cost = $9, reorder_level = $10, image_url = $11
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.branch_id)
        .bind(input.supplier_id)
        .bind(input.name.trim())
        .bind(input.sku.as_deref().map(str::trim))
        .bind(input.category.trim())
        .bind(input.description.trim())
        .bind(input.price.round())
        .bind(input.cost.map(Money::round))
        .bind(input.reorder_level)
        .bind(input.image_url.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| {
            RepositoryError::from_constraint(e, "duplicate SKU or unknown branch/supplier")
        })?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Apply a signed stock correction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist and
    /// `RepositoryError::Conflict` if stock would go below zero.
    pub async fn adjust_stock(&self, id: ProductId, delta: i32) -> Result<Product, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            r"
            UPDATE salon.product SET stock = stock + $2
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(delta)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_check_violation()
            {
                return RepositoryError::Conflict("stock cannot go below zero".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Enable or retire a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn set_active(&self, id: ProductId, active: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE salon.product SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Take `quantity` units out of stock inside the caller's transaction.
    ///
    /// The row is only updated when enough stock exists, so concurrent sales
    /// cannot oversell.
    ///
    /// # Errors
    ///
    /// Returns `Ok(Err(StockShortage))` when stock is insufficient and
    /// `RepositoryError::NotFound` if the product does not exist.
    pub async fn decrement_stock_in(
        conn: &mut PgConnection,
        id: ProductId,
        quantity: i32,
    ) -> Result<Result<i32, StockShortage>, RepositoryError> {
        let remaining: Option<i32> = sqlx::query_scalar(
            r"
            UPDATE salon.product SET stock = stock - $2
            WHERE id = $1 AND stock >= $2
            RETURNING stock
            ",
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(remaining) = remaining {
            return Ok(Ok(remaining));
        }

        let available: Option<i32> =
            sqlx::query_scalar("SELECT stock FROM salon.product WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;

        match available {
            Some(available) => Ok(Err(StockShortage {
                product_id: id,
                available,
                requested: quantity,
            })),
            None => Err(RepositoryError::NotFound),
        }
    }

    /// Put `quantity` units back into stock inside the caller's transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn restock_in(
        conn: &mut PgConnection,
        id: ProductId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE salon.product SET stock = stock + $2 WHERE id = $1")
            .bind(id)
            .bind(quantity)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    query.push(" WHERE TRUE");
    if let Some(branch_id) = filter.branch_id {
        query.push(" AND branch_id = ").push_bind(branch_id);
    }
    if let Some(supplier_id) = filter.supplier_id {
        query.push(" AND supplier_id = ").push_bind(supplier_id);
    }
    if let Some(category) = filter.category.as_deref().filter(|c| !c.trim().is_empty()) {
        query.push(" AND category = ").push_bind(category.trim().to_owned());
    }
    if filter.low_stock == Some(true) {
        query.push(" AND stock <= reorder_level");
    }
    if let Some(active) = filter.active {
        query.push(" AND is_active = ").push_bind(active);
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(search);
        query
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR sku ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}
