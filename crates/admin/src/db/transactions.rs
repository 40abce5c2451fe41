//! Point-of-sale transaction repository.
//!
//! Writes take a `&mut PgConnection` so the checkout service can insert the
//! sale, move stock and update loyalty in a single database transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use salonhub_core::pagination::{Page, PageRequest};
use salonhub_core::pos::{CartTotals, Discount, LineItem};
use salonhub_core::{BranchId, Money, PaymentMethod, TransactionId, TransactionStatus, UserId};

use super::RepositoryError;
use crate::models::{NewTransaction, Transaction, TransactionFilter};

const TRANSACTION_COLUMNS: &str = "id, branch_id, client_id, staff_id, items, discount, \
                                   tax_rate, subtotal, discount_amount, points_redeemed, \
                                   loyalty_discount, net, tax, total, points_earned, \
                                   payment_method, status, notes, voided_at, voided_by, \
                                   void_reason, created_at";

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: i32,
    branch_id: i32,
    client_id: Option<i32>,
    staff_id: i32,
    items: Json<Vec<LineItem>>,
    discount: Json<Discount>,
    tax_rate: Decimal,
    subtotal: Money,
    discount_amount: Money,
    points_redeemed: i64,
    loyalty_discount: Money,
    net: Money,
    tax: Money,
    total: Money,
    points_earned: i64,
    payment_method: PaymentMethod,
    status: TransactionStatus,
    notes: Option<String>,
    voided_at: Option<DateTime<Utc>>,
    voided_by: Option<i32>,
    void_reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
        Self {
            id: TransactionId::new(row.id),
            branch_id: BranchId::new(row.branch_id),
            client_id: row.client_id.map(UserId::new),
            staff_id: UserId::new(row.staff_id),
            items: row.items.0,
            discount: row.discount.0,
            tax_rate: row.tax_rate,
            totals: CartTotals {
                subtotal: row.subtotal,
                discount: row.discount_amount,
                points_redeemed: row.points_redeemed,
                loyalty_discount: row.loyalty_discount,
                net: row.net,
                tax: row.tax,
                total: row.total,
                points_earned: row.points_earned,
            },
            payment_method: row.payment_method,
            status: row.status,
            notes: row.notes,
            voided_at: row.voided_at,
            voided_by: row.voided_by.map(UserId::new),
            void_reason: row.void_reason,
            created_at: row.created_at,
        }
    }
}

/// Repository for point-of-sale transactions.
pub struct TransactionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TransactionRepository<'a> {
    /// Create a new transaction repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List transactions matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> Result<Page<Transaction>, RepositoryError> {
        let mut count =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM salon.pos_transaction");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {TRANSACTION_COLUMNS} FROM salon.pos_transaction"
        ));
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<TransactionRow> = query.build_query_as().fetch_all(self.pool).await?;
        Ok(Page::new(
            rows.into_iter().map(Into::into).collect(),
            page,
            u64::try_from(total).unwrap_or(0),
        ))
    }

    /// Get a transaction by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: TransactionId) -> Result<Option<Transaction>, RepositoryError> {
        let row: Option<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM salon.pos_transaction WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Sum of completed sales created in `[from, to)`, optionally for one
    /// branch.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn revenue(
        &self,
        branch_id: Option<BranchId>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Money, RepositoryError> {
        let revenue: Money = sqlx::query_scalar(
            r"
            SELECT COALESCE(SUM(total), 0)
            FROM salon.pos_transaction
            WHERE status = 'completed'
              AND created_at >= $1 AND created_at < $2
              AND ($3::INTEGER IS NULL OR branch_id = $3)
            ",
        )
        .bind(from)
        .bind(to)
        .bind(branch_id)
        .fetch_one(self.pool)
        .await?;

        Ok(revenue)
    }

    /// Insert a priced sale inside the caller's transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a referenced row does not exist.
    pub async fn insert_in(
        conn: &mut PgConnection,
        sale: &NewTransaction,
    ) -> Result<Transaction, RepositoryError> {
        let totals = &sale.totals;
        let row: TransactionRow = sqlx::query_as(&format!(
            r"
            INSERT INTO salon.pos_transaction
                (branch_id, client_id, staff_id, items, discount, tax_rate,
                 subtotal, discount_amount, points_redeemed, loyalty_discount,
                 net, tax, total, points_earned, payment_method, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {TRANSACTION_COLUMNS}
            "
        ))
        .bind(sale.branch_id)
        .bind(sale.client_id)
        .bind(sale.staff_id)
        .bind(Json(&sale.items))
        .bind(Json(&sale.discount))
        .bind(sale.tax_rate)
        .bind(totals.subtotal)
        .bind(totals.discount)
        .bind(totals.points_redeemed)
        .bind(totals.loyalty_discount)
        .bind(totals.net)
        .bind(totals.tax)
        .bind(totals.total)
        .bind(totals.points_earned)
        .bind(sale.payment_method)
        .bind(sale.notes.as_deref())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "unknown branch, client or staff"))?;

        Ok(row.into())
    }

    /// Load a transaction and lock its row until the caller commits.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_update_in(
        conn: &mut PgConnection,
        id: TransactionId,
    ) -> Result<Option<Transaction>, RepositoryError> {
        let row: Option<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM salon.pos_transaction WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Mark a completed transaction as voided.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if it is already voided and
    /// `RepositoryError::NotFound` if it does not exist.
    pub async fn mark_voided_in(
        conn: &mut PgConnection,
        id: TransactionId,
        voided_by: UserId,
        reason: &str,
    ) -> Result<Transaction, RepositoryError> {
        let row: Option<TransactionRow> = sqlx::query_as(&format!(
            r"
            UPDATE salon.pos_transaction
            SET status = 'voided', voided_at = NOW(), voided_by = $2, void_reason = $3
            WHERE id = $1 AND status = 'completed'
            RETURNING {TRANSACTION_COLUMNS}
            "
        ))
        .bind(id)
        .bind(voided_by)
        .bind(reason)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(row) = row {
            return Ok(row.into());
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM salon.pos_transaction WHERE id = $1)")
                .bind(id)
                .fetch_one(&mut *conn)
                .await?;

        if exists {
            Err(RepositoryError::Conflict("transaction is already voided".to_owned()))
        } else {
            Err(RepositoryError::NotFound)
        }
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &TransactionFilter) {
    query.push(" WHERE TRUE");
    if let Some(branch_id) = filter.branch_id {
        query.push(" AND branch_id = ").push_bind(branch_id);
    }
    if let Some(client_id) = filter.client_id {
        query.push(" AND client_id = ").push_bind(client_id);
    }
    if let Some(staff_id) = filter.staff_id {
        query.push(" AND staff_id = ").push_bind(staff_id);
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    if let Some(from) = filter.from {
        query
            .push(" AND created_at >= ")
            .push_bind(from.and_time(chrono::NaiveTime::MIN).and_utc());
    }
    if let Some(to) = filter.to.and_then(|d| d.succ_opt()) {
        query
            .push(" AND created_at < ")
            .push_bind(to.and_time(chrono::NaiveTime::MIN).and_utc());
    }
}
