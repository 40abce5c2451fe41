//! Appointment repository.
//!
//! Reads join the client, stylist and service so list views can render names
//! without extra round trips.

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use salonhub_core::pagination::{Page, PageRequest};
use salonhub_core::{AppointmentId, AppointmentStatus, BranchId, Money, ServiceId, UserId};

use super::RepositoryError;
use crate::models::appointment::AppointmentRecord;
use crate::models::{Appointment, AppointmentFilter};

const APPOINTMENT_SELECT: &str = r"
    SELECT a.id, a.branch_id, a.client_id, c.name AS client_name,
           a.stylist_id, s.name AS stylist_name, a.service_id, sv.name AS service_name,
           a.starts_at, a.ends_at, a.status, a.price, a.notes, a.created_by,
           a.created_at, a.updated_at
    FROM salon.appointment a
    JOIN salon.app_user c ON c.id = a.client_id
    JOIN salon.app_user s ON s.id = a.stylist_id
    JOIN salon.service sv ON sv.id = a.service_id";

/// Conflict message when a stylist's slot is taken.
pub const STYLIST_BOOKED: &str = "the stylist is already booked at that time";

/// Statuses that hold a stylist's time slot.
const ACTIVE_STATUSES: [AppointmentStatus; 3] = [
    AppointmentStatus::Scheduled,
    AppointmentStatus::Confirmed,
    AppointmentStatus::InProgress,
];

#[derive(Debug, sqlx::FromRow)]
struct AppointmentRow {
    id: i32,
    branch_id: i32,
    client_id: i32,
    client_name: String,
    stylist_id: i32,
    stylist_name: String,
    service_id: i32,
    service_name: String,
    starts_at: NaiveDateTime,
    ends_at: NaiveDateTime,
    status: AppointmentStatus,
    price: Money,
    notes: Option<String>,
    created_by: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AppointmentRow> for Appointment {
    fn from(row: AppointmentRow) -> Self {
        Self {
            id: AppointmentId::new(row.id),
            branch_id: BranchId::new(row.branch_id),
            client_id: UserId::new(row.client_id),
            client_name: row.client_name,
            stylist_id: UserId::new(row.stylist_id),
            stylist_name: row.stylist_name,
            service_id: ServiceId::new(row.service_id),
            service_name: row.service_name,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            status: row.status,
            price: row.price,
            notes: row.notes,
            created_by: row.created_by.map(UserId::new),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for appointment database operations.
pub struct AppointmentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AppointmentRepository<'a> {
    /// Create a new appointment repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List appointments matching `filter`, earliest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &AppointmentFilter,
        page: PageRequest,
    ) -> Result<Page<Appointment>, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM salon.appointment a");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(APPOINTMENT_SELECT);
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY a.starts_at ASC, a.id ASC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<AppointmentRow> = query.build_query_as().fetch_all(self.pool).await?;
        Ok(Page::new(
            rows.into_iter().map(Into::into).collect(),
            page,
            u64::try_from(total).unwrap_or(0),
        ))
    }

    /// Get an appointment by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: AppointmentId) -> Result<Option<Appointment>, RepositoryError> {
        let row: Option<AppointmentRow> =
            sqlx::query_as(&format!("{APPOINTMENT_SELECT} WHERE a.id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        Ok(row.map(Into::into))
    }

    /// Insert a checked booking if the stylist is free.
    ///
    /// The stylist row is locked for the check and the insert, so two
    /// bookings for the same slot cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the stylist is already booked
    /// or a referenced row does not exist.
    pub async fn create(&self, record: &AppointmentRecord) -> Result<Appointment, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_stylist(&mut *tx, record.stylist_id).await?;
        ensure_free_in(&mut *tx, record.stylist_id, record.starts_at, record.ends_at, None).await?;

        let id: AppointmentId = sqlx::query_scalar(
            r"
            INSERT INTO salon.appointment
                (branch_id, client_id, stylist_id, service_id, starts_at, ends_at,
                 price, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            ",
        )
        .bind(record.branch_id)
        .bind(record.client_id)
        .bind(record.stylist_id)
        .bind(record.service_id)
        .bind(record.starts_at)
        .bind(record.ends_at)
        .bind(record.price)
        .bind(record.notes.as_deref())
        .bind(record.created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "unknown branch, client, stylist or service"))?;

        tx.commit().await?;
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Set an appointment's status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the appointment does not exist.
    pub async fn update_status(
        &self,
        id: AppointmentId,
        status: AppointmentStatus,
    ) -> Result<Appointment, RepositoryError> {
        let result = sqlx::query("UPDATE salon.appointment SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Move an appointment to a new slot, optionally with another stylist.
    ///
    /// Locks the stylist like [`create`](Self::create).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the appointment does not exist
    /// and `RepositoryError::Conflict` if the stylist is already booked.
    pub async fn reschedule(
        &self,
        id: AppointmentId,
        stylist_id: UserId,
        starts_at: NaiveDateTime,
        ends_at: NaiveDateTime,
    ) -> Result<Appointment, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_stylist(&mut *tx, stylist_id).await?;
        ensure_free_in(&mut *tx, stylist_id, starts_at, ends_at, Some(id)).await?;

        let result = sqlx::query(
            r"
            UPDATE salon.appointment
            SET stylist_id = $2, starts_at = $3, ends_at = $4
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(stylist_id)
        .bind(starts_at)
        .bind(ends_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "unknown stylist"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        tx.commit().await?;
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Whether the stylist already has an active booking overlapping
    /// `[starts_at, ends_at)`, ignoring `excluding` if given.
    ///
    /// An advisory read; [`create`](Self::create) and
    /// [`reschedule`](Self::reschedule) repeat the check under a lock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_conflict(
        &self,
        stylist_id: UserId,
        starts_at: NaiveDateTime,
        ends_at: NaiveDateTime,
        excluding: Option<AppointmentId>,
    ) -> Result<bool, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        has_conflict_in(&mut *conn, stylist_id, starts_at, ends_at, excluding).await
    }
}

/// Lock the stylist's account row until the transaction ends.
async fn lock_stylist(conn: &mut PgConnection, stylist_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query_scalar::<_, i32>("SELECT id FROM salon.app_user WHERE id = $1 FOR UPDATE")
        .bind(stylist_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| RepositoryError::Conflict("unknown stylist".to_owned()))
}

async fn has_conflict_in(
    conn: &mut PgConnection,
    stylist_id: UserId,
    starts_at: NaiveDateTime,
    ends_at: NaiveDateTime,
    excluding: Option<AppointmentId>,
) -> Result<bool, RepositoryError> {
    let conflict: bool = sqlx::query_scalar(&format!(
        r"
        SELECT EXISTS (
            SELECT 1 FROM salon.appointment
            WHERE stylist_id = $1
              AND starts_at < $3
              AND ends_at > $2
              AND status IN ({})
              AND ($4::INTEGER IS NULL OR id <> $4)
        )
        ",
        active_status_list()
    ))
    .bind(stylist_id)
    .bind(starts_at)
    .bind(ends_at)
    .bind(excluding)
    .fetch_one(&mut *conn)
    .await?;

    Ok(conflict)
}

async fn ensure_free_in(
    conn: &mut PgConnection,
    stylist_id: UserId,
    starts_at: NaiveDateTime,
    ends_at: NaiveDateTime,
    excluding: Option<AppointmentId>,
) -> Result<(), RepositoryError> {
    if has_conflict_in(conn, stylist_id, starts_at, ends_at, excluding).await? {
        return Err(RepositoryError::Conflict(STYLIST_BOOKED.to_owned()));
    }
    Ok(())
}

/// `'scheduled', 'confirmed', 'in_progress'` for an `IN (...)` clause.
fn active_status_list() -> String {
    ACTIVE_STATUSES
        .iter()
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &AppointmentFilter) {
    query.push(" WHERE TRUE");
    if let Some(branch_id) = filter.branch_id {
        query.push(" AND a.branch_id = ").push_bind(branch_id);
    }
    if let Some(stylist_id) = filter.stylist_id {
        query.push(" AND a.stylist_id = ").push_bind(stylist_id);
    }
    if let Some(client_id) = filter.client_id {
        query.push(" AND a.client_id = ").push_bind(client_id);
    }
    if let Some(status) = filter.status {
        query.push(" AND a.status = ").push_bind(status);
    }
    if let Some(from) = filter.from {
        query.push(" AND a.starts_at >= ").push_bind(from.and_time(chrono::NaiveTime::MIN));
    }
    if let Some(to) = filter.to.and_then(|d| d.succ_opt()) {
        query.push(" AND a.starts_at < ").push_bind(to.and_time(chrono::NaiveTime::MIN));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_statuses_match_domain() {
        for status in ACTIVE_STATUSES {
            assert!(status.is_active());
        }
        assert!(!AppointmentStatus::Completed.is_active());
    }

    #[test]
    fn test_active_status_list() {
        assert_eq!(
            active_status_list(),
            "'scheduled', 'confirmed', 'in_progress'"
        );
    }
}
