//! User repository for staff and client accounts.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use salonhub_core::pagination::{Page, PageRequest};
use salonhub_core::{BranchId, Email, Role, UserId};

use super::{RepositoryError, like_pattern};
use crate::models::{User, UserFilter, UserUpdate};

const USER_COLUMNS: &str = "id, email, name, phone, role, branch_id, loyalty_points, \
                            is_active, created_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: String,
    name: String,
    phone: Option<String>,
    role: Role,
    branch_id: Option<i32>,
    loyalty_points: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            email,
            name: row.name,
            phone: row.phone,
            role: row.role,
            branch_id: row.branch_id.map(BranchId::new),
            loyalty_points: row.loyalty_points,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List users matching `filter`, one page at a time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a row is invalid.
    pub async fn list(
        &self,
        filter: &UserFilter,
        page: PageRequest,
    ) -> Result<Page<User>, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM salon.app_user");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut query =
            QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM salon.app_user"));
        push_filters(&mut query, filter);
        query
            .push(format!(
                " ORDER BY {} {}, id ASC",
                filter.sort.column(),
                filter.direction.as_sql()
            ))
            .push(" LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<UserRow> = query.build_query_as().fetch_all(self.pool).await?;
        let users = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<User>, _>>()?;

        Ok(Page::new(users, page, u64::try_from(total).unwrap_or(0)))
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM salon.app_user WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a user by email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM salon.app_user WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get the stored password hash for a user, if one is set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let hash: Option<Option<String>> =
            sqlx::query_scalar("SELECT password_hash FROM salon.app_user WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        Ok(hash.flatten())
    }

    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        email: &Email,
        name: &str,
        phone: Option<&str>,
        role: Role,
        branch_id: Option<BranchId>,
        password_hash: Option<&str>,
    ) -> Result<User, RepositoryError> {
        let row: UserRow = sqlx::query_as(&format!(
            r"
            INSERT INTO salon.app_user (email, name, phone, role, branch_id, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(email.as_str())
        .bind(name.trim())
        .bind(phone)
        .bind(role)
        .bind(branch_id)
        .bind(password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "email already exists"))?;

        row.try_into()
    }

    /// Replace the editable fields of a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn update(&self, id: UserId, update: &UserUpdate) -> Result<User, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r"
            UPDATE salon.app_user
            SET name = $2, phone = $3, role = $4, branch_id = $5
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(update.name.trim())
        .bind(update.phone.as_deref())
        .bind(update.role)
        .bind(update.branch_id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "branch does not exist"))?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Activate or deactivate a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_active(&self, id: UserId, active: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE salon.app_user SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Replace a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_password(&self, id: UserId, password_hash: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE salon.app_user SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    query.push(" WHERE TRUE");
    if let Some(role) = filter.role {
        query.push(" AND role = ").push_bind(role);
    }
    if let Some(branch_id) = filter.branch_id {
        query.push(" AND branch_id = ").push_bind(branch_id);
    }
    if let Some(active) = filter.active {
        query.push(" AND is_active = ").push_bind(active);
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(search);
        query
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR phone ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}
