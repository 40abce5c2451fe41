//! Loyalty balances and ledger.
//!
//! Every change goes through [`LoyaltyRepository::apply_in`], which locks
//! the client's `app_user` row for the rest of the surrounding transaction.
//! Two concurrent sales for the same client therefore serialize: the second
//! one reads the balances only after the first has committed, so neither
//! the per-branch rows nor the denormalized total can lose an update.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use thiserror::Error;

use salonhub_core::loyalty::{LedgerReason, LoyaltyBalance, LoyaltyError};
use salonhub_core::pagination::{Page, PageRequest};
use salonhub_core::{BranchId, LoyaltyEntryId, Role, TransactionId, UserId};

use super::RepositoryError;
use crate::models::{LoyaltyEntry, LoyaltyOutcome, LoyaltyPosting};

/// Errors from posting a points change.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Loyalty(#[from] LoyaltyError),
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    id: i32,
    user_id: i32,
    branch_id: i32,
    delta: i64,
    balance_after: i64,
    reason: LedgerReason,
    transaction_id: Option<i32>,
    actor_id: Option<i32>,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<EntryRow> for LoyaltyEntry {
    fn from(row: EntryRow) -> Self {
        Self {
            id: LoyaltyEntryId::new(row.id),
            user_id: UserId::new(row.user_id),
            branch_id: BranchId::new(row.branch_id),
            delta: row.delta,
            balance_after: row.balance_after,
            reason: row.reason,
            transaction_id: row.transaction_id.map(TransactionId::new),
            actor_id: row.actor_id.map(UserId::new),
            note: row.note,
            created_at: row.created_at,
        }
    }
}

/// Repository for loyalty balances and the points ledger.
pub struct LoyaltyRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> LoyaltyRepository<'a> {
    /// Create a new loyalty repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Per-branch balance of a client.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn balance(&self, client_id: UserId) -> Result<LoyaltyBalance, RepositoryError> {
        let rows: Vec<(BranchId, i64)> = sqlx::query_as(
            "SELECT branch_id, points FROM salon.loyalty_balance WHERE user_id = $1",
        )
        .bind(client_id)
        .fetch_all(self.pool)
        .await?;

        Ok(LoyaltyBalance::from_rows(rows))
    }

    /// Ledger entries of a client, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn history(
        &self,
        client_id: UserId,
        page: PageRequest,
    ) -> Result<Page<LoyaltyEntry>, RepositoryError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM salon.loyalty_entry WHERE user_id = $1")
                .bind(client_id)
                .fetch_one(self.pool)
                .await?;

        let rows: Vec<EntryRow> = sqlx::query_as(
            r"
            SELECT id, user_id, branch_id, delta, balance_after, reason,
                   transaction_id, actor_id, note, created_at
            FROM salon.loyalty_entry
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(client_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok(Page::new(
            rows.into_iter().map(Into::into).collect(),
            page,
            u64::try_from(total).unwrap_or(0),
        ))
    }

    /// Post a points change in its own database transaction.
    ///
    /// # Errors
    ///
    /// See [`apply_in`](Self::apply_in).
    pub async fn apply(&self, posting: &LoyaltyPosting) -> Result<LoyaltyOutcome, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let outcome = Self::apply_in(&mut *tx, posting).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Post a points change inside the caller's transaction.
    ///
    /// Locks the client row, applies the change to the branch balances,
    /// writes the branch row, rewrites `app_user.loyalty_points` as the sum
    /// of all branches and appends a ledger entry. A reversal that finds no
    /// points left writes nothing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the client does not exist,
    /// `RepositoryError::Conflict` if the account is not a client, and
    /// `LoyaltyError` if the balance rules reject the change.
    pub async fn apply_in(
        conn: &mut PgConnection,
        posting: &LoyaltyPosting,
    ) -> Result<LoyaltyOutcome, LedgerError> {
        let role: Option<Role> =
            sqlx::query_scalar("SELECT role FROM salon.app_user WHERE id = $1 FOR UPDATE")
                .bind(posting.client_id)
                .fetch_optional(&mut *conn)
                .await?;

        match role {
            None => return Err(RepositoryError::NotFound.into()),
            Some(Role::Client) => {}
            Some(_) => {
                return Err(RepositoryError::Conflict(
                    "loyalty points are only held by client accounts".to_owned(),
                )
                .into());
            }
        }

        let rows: Vec<(BranchId, i64)> = sqlx::query_as(
            "SELECT branch_id, points FROM salon.loyalty_balance WHERE user_id = $1",
        )
        .bind(posting.client_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut balance = LoyaltyBalance::from_rows(rows);
        let delta = balance.apply(posting.branch_id, posting.change)?;
        let branch_balance = balance.points_at(posting.branch_id);
        let outcome = LoyaltyOutcome {
            branch_id: posting.branch_id,
            delta,
            branch_balance,
            total: balance.total(),
        };

        if delta == 0 {
            return Ok(outcome);
        }

        sqlx::query(
            r"
            INSERT INTO salon.loyalty_balance (user_id, branch_id, points)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, branch_id)
            DO UPDATE SET points = EXCLUDED.points, updated_at = NOW()
            ",
        )
        .bind(posting.client_id)
        .bind(posting.branch_id)
        .bind(branch_balance)
        .execute(&mut *conn)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "branch does not exist"))?;

        sqlx::query("UPDATE salon.app_user SET loyalty_points = $2 WHERE id = $1")
            .bind(posting.client_id)
            .bind(outcome.total)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            r"
            INSERT INTO salon.loyalty_entry
                (user_id, branch_id, delta, balance_after, reason, transaction_id, actor_id, note)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(posting.client_id)
        .bind(posting.branch_id)
        .bind(delta)
        .bind(branch_balance)
        .bind(posting.reason)
        .bind(posting.transaction_id)
        .bind(posting.actor_id)
        .bind(posting.note.as_deref())
        .execute(&mut *conn)
        .await?;

        tracing::debug!(
            client_id = %posting.client_id,
            branch_id = %posting.branch_id,
            delta,
            total = outcome.total,
            "Loyalty points posted"
        );

        Ok(outcome)
    }
}
