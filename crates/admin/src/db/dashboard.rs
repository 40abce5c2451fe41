//! Summary counts for the role dashboards.
//!
//! Day boundaries are UTC for sales and branch-local wall-clock for
//! appointments, matching how each table stores time.

use chrono::{Datelike, NaiveDate, NaiveTime};
use sqlx::PgPool;

use salonhub_core::{BranchId, Money, UserId};

use super::RepositoryError;
use crate::models::{ClientSummary, OperationsSummary, StylistSummary};

/// Repository for dashboard aggregates.
pub struct DashboardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepository<'a> {
    /// Create a new dashboard repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Operations summary for one branch, or all branches when `branch_id`
    /// is `None`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn operations(
        &self,
        branch_id: Option<BranchId>,
        today: NaiveDate,
    ) -> Result<OperationsSummary, RepositoryError> {
        let (day_start, day_end) = day_bounds(today);
        let month_start = month_start(today);

        // Clients have no home branch; at a branch they count once they
        // have booked or bought there.
        let (active_clients, active_staff): (i64, i64) = sqlx::query_as(
            r"
            SELECT
                (SELECT COUNT(*) FROM salon.app_user u
                 WHERE u.is_active AND u.role = 'client'
                   AND ($1::INTEGER IS NULL
                        OR EXISTS (SELECT 1 FROM salon.appointment a
                                   WHERE a.client_id = u.id AND a.branch_id = $1)
                        OR EXISTS (SELECT 1 FROM salon.pos_transaction t
                                   WHERE t.client_id = u.id AND t.branch_id = $1))),
                (SELECT COUNT(*) FROM salon.app_user
                 WHERE is_active AND role <> 'client'
                   AND ($1::INTEGER IS NULL OR branch_id = $1))
            ",
        )
        .bind(branch_id)
        .fetch_one(self.pool)
        .await?;

        let appointments_today: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM salon.appointment
            WHERE starts_at >= $1 AND starts_at < $2
              AND status NOT IN ('cancelled', 'no_show')
              AND ($3::INTEGER IS NULL OR branch_id = $3)
            ",
        )
        .bind(day_start)
        .bind(day_end)
        .bind(branch_id)
        .fetch_one(self.pool)
        .await?;

        let low_stock_products: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM salon.product
            WHERE is_active AND stock <= reorder_level
              AND ($1::INTEGER IS NULL OR branch_id = $1)
            ",
        )
        .bind(branch_id)
        .fetch_one(self.pool)
        .await?;

        let (revenue_today, revenue_month): (Money, Money) = sqlx::query_as(
            r"
            SELECT
                COALESCE(SUM(total) FILTER (WHERE created_at >= $1), 0),
                COALESCE(SUM(total), 0)
            FROM salon.pos_transaction
            WHERE status = 'completed'
              AND created_at >= $2 AND created_at < $3
              AND ($4::INTEGER IS NULL OR branch_id = $4)
            ",
        )
        .bind(day_start.and_utc())
        .bind(month_start.and_utc())
        .bind(day_end.and_utc())
        .bind(branch_id)
        .fetch_one(self.pool)
        .await?;

        Ok(OperationsSummary {
            branch_id,
            active_clients,
            active_staff,
            appointments_today,
            low_stock_products,
            revenue_today,
            revenue_month,
        })
    }

    /// Summary of a stylist's bookings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn stylist(
        &self,
        stylist_id: UserId,
        today: NaiveDate,
    ) -> Result<StylistSummary, RepositoryError> {
        let (day_start, day_end) = day_bounds(today);
        let month_start = month_start(today);

        let (appointments_today, upcoming_appointments, completed_this_month): (i64, i64, i64) =
            sqlx::query_as(
                r"
                SELECT
                    COUNT(*) FILTER (WHERE starts_at >= $2 AND starts_at < $3
                                     AND status NOT IN ('cancelled', 'no_show')),
                    COUNT(*) FILTER (WHERE starts_at >= $3
                                     AND status IN ('scheduled', 'confirmed')),
                    COUNT(*) FILTER (WHERE starts_at >= $4 AND status = 'completed')
                FROM salon.appointment
                WHERE stylist_id = $1
                ",
            )
            .bind(stylist_id)
            .bind(day_start)
            .bind(day_end)
            .bind(month_start)
            .fetch_one(self.pool)
            .await?;

        Ok(StylistSummary {
            appointments_today,
            upcoming_appointments,
            completed_this_month,
        })
    }

    /// Summary for a client's own dashboard.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the client does not exist.
    pub async fn client(
        &self,
        client_id: UserId,
        today: NaiveDate,
    ) -> Result<ClientSummary, RepositoryError> {
        let (day_start, _) = day_bounds(today);

        let loyalty_points: Option<i64> =
            sqlx::query_scalar("SELECT loyalty_points FROM salon.app_user WHERE id = $1")
                .bind(client_id)
                .fetch_optional(self.pool)
                .await?;
        let loyalty_points = loyalty_points.ok_or(RepositoryError::NotFound)?;

        let (upcoming_appointments, completed_visits): (i64, i64) = sqlx::query_as(
            r"
            SELECT
                COUNT(*) FILTER (WHERE starts_at >= $2 AND status IN ('scheduled', 'confirmed')),
                COUNT(*) FILTER (WHERE status = 'completed')
            FROM salon.appointment
            WHERE client_id = $1
            ",
        )
        .bind(client_id)
        .bind(day_start)
        .fetch_one(self.pool)
        .await?;

        Ok(ClientSummary {
            loyalty_points,
            upcoming_appointments,
            completed_visits,
        })
    }
}

fn day_bounds(day: NaiveDate) -> (chrono::NaiveDateTime, chrono::NaiveDateTime) {
    let start = day.and_time(NaiveTime::MIN);
    let end = day.succ_opt().unwrap_or(day).and_time(NaiveTime::MIN);
    (start, end)
}

fn month_start(day: NaiveDate) -> chrono::NaiveDateTime {
    day.with_day(1).unwrap_or(day).and_time(NaiveTime::MIN)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_day_bounds_cross_month() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let (start, end) = day_bounds(day);
        assert_eq!(start.date(), day);
        assert_eq!(end.date(), NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
    }

    #[test]
    fn test_month_start() {
        let day = NaiveDate::from_ymd_opt(2025, 6, 18).unwrap();
        assert_eq!(
            month_start(day).date(),
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
        );
    }
}
