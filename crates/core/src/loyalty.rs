//! Branch-scoped loyalty points.
//!
//! A client earns points at the branch where they spend and can only redeem
//! points at the branch that issued them. The client's headline balance is
//! the sum over all branches; [`LoyaltyBalance::total`] is the single place
//! that number is computed, so the denormalized total stored next to the
//! client can always be rewritten from the per-branch balances.
//!
//! This module is pure arithmetic. Serializing concurrent updates is the
//! job of the caller (the admin server locks the client row for the whole
//! read-modify-write).

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::{BranchId, Money};

/// Errors raised by loyalty operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LoyaltyError {
    /// Point amounts must be strictly positive.
    #[error("points must be greater than zero (got {0})")]
    NonPositive(i64),

    /// Not enough points at the branch.
    #[error("branch {branch} has {available} points, cannot redeem {requested}")]
    InsufficientPoints {
        branch: BranchId,
        available: i64,
        requested: i64,
    },

    /// The balance would exceed the representable range.
    #[error("loyalty balance overflow")]
    Overflow,
}

/// Why a ledger entry was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "salon.loyalty_reason", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    /// Points earned on a sale.
    Purchase,
    /// Points spent on a sale or redeemed at the desk.
    Redemption,
    /// Staff correction.
    ManualAdjustment,
    /// Points clawed back or refunded when a sale is voided.
    VoidReversal,
}

/// A requested change to a client's balance at one branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "points", rename_all = "snake_case")]
pub enum PointsChange {
    Credit(i64),
    Redeem(i64),
    /// Remove up to the given number of points, never failing.
    Reverse(i64),
}

/// Points held by one client, per branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoyaltyBalance {
    by_branch: BTreeMap<BranchId, i64>,
}

impl LoyaltyBalance {
    /// An empty balance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a balance from stored `(branch, points)` rows.
    #[must_use]
    pub fn from_rows(rows: impl IntoIterator<Item = (BranchId, i64)>) -> Self {
        let mut by_branch = BTreeMap::new();
        for (branch, points) in rows {
            *by_branch.entry(branch).or_insert(0) += points;
        }
        Self { by_branch }
    }

    /// Sum of all branch balances.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.by_branch.values().sum()
    }

    /// Points available at `branch`.
    #[must_use]
    pub fn points_at(&self, branch: BranchId) -> i64 {
        self.by_branch.get(&branch).copied().unwrap_or(0)
    }

    /// Iterate over `(branch, points)` pairs in branch order.
    pub fn iter(&self) -> impl Iterator<Item = (BranchId, i64)> + '_ {
        self.by_branch.iter().map(|(b, p)| (*b, *p))
    }

    /// Add points at `branch`. Returns the new branch balance.
    ///
    /// # Errors
    ///
    /// `NonPositive` if `points <= 0`, `Overflow` if the balance would wrap.
    pub fn credit(&mut self, branch: BranchId, points: i64) -> Result<i64, LoyaltyError> {
        ensure_positive(points)?;
        let entry = self.by_branch.entry(branch).or_insert(0);
        *entry = entry.checked_add(points).ok_or(LoyaltyError::Overflow)?;
        Ok(*entry)
    }

    /// Spend points at `branch`. Returns the new branch balance.
    ///
    /// A branch that reaches zero stays in the map with a zero balance.
    ///
    /// # Errors
    ///
    /// `NonPositive` if `points <= 0`, `InsufficientPoints` if the branch
    /// holds fewer than `points`.
    pub fn redeem(&mut self, branch: BranchId, points: i64) -> Result<i64, LoyaltyError> {
        ensure_positive(points)?;
        let available = self.points_at(branch);
        if available < points {
            return Err(LoyaltyError::InsufficientPoints {
                branch,
                available,
                requested: points,
            });
        }
        let remaining = available - points;
        self.by_branch.insert(branch, remaining);
        Ok(remaining)
    }

    /// Remove up to `points` from `branch`, returning how many were removed.
    ///
    /// Used when voiding a sale: the points it earned may already have been
    /// spent, in which case only what is left is taken back.
    pub fn reverse_credit(&mut self, branch: BranchId, points: i64) -> i64 {
        if points <= 0 {
            return 0;
        }
        let available = self.points_at(branch);
        let removed = available.min(points).max(0);
        if removed > 0 {
            self.by_branch.insert(branch, available - removed);
        }
        removed
    }

    /// Apply a [`PointsChange`], returning the signed delta actually applied.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`credit`](Self::credit) and
    /// [`redeem`](Self::redeem).
    pub fn apply(&mut self, branch: BranchId, change: PointsChange) -> Result<i64, LoyaltyError> {
        match change {
            PointsChange::Credit(points) => self.credit(branch, points).map(|_| points),
            PointsChange::Redeem(points) => self.redeem(branch, points).map(|_| -points),
            PointsChange::Reverse(points) => Ok(-self.reverse_credit(branch, points)),
        }
    }
}

fn ensure_positive(points: i64) -> Result<(), LoyaltyError> {
    if points <= 0 {
        return Err(LoyaltyError::NonPositive(points));
    }
    Ok(())
}

/// How points are earned and what they are worth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyPolicy {
    /// Amount a client must spend to earn one point.
    pub spend_per_point: Decimal,
    /// Discount one point is worth at redemption.
    pub point_value: Decimal,
}

impl Default for LoyaltyPolicy {
    fn default() -> Self {
        Self {
            spend_per_point: Decimal::ONE_HUNDRED,
            point_value: Decimal::ONE,
        }
    }
}

impl LoyaltyPolicy {
    /// Points earned for spending `amount`, rounded down.
    #[must_use]
    pub fn points_for(&self, amount: Money) -> i64 {
        if self.spend_per_point <= Decimal::ZERO || amount.is_negative() {
            return 0;
        }
        (amount.amount() / self.spend_per_point)
            .floor()
            .to_i64()
            .unwrap_or(0)
    }

    /// Discount granted for redeeming `points`.
    #[must_use]
    pub fn redemption_value(&self, points: i64) -> Money {
        if points <= 0 {
            return Money::zero();
        }
        Money::new(self.point_value * Decimal::from(points)).round()
    }

    /// Most points that can be redeemed against `amount`.
    #[must_use]
    pub fn max_redeemable(&self, amount: Money) -> i64 {
        if self.point_value <= Decimal::ZERO || amount.is_negative() {
            return 0;
        }
        (amount.amount() / self.point_value)
            .floor()
            .to_i64()
            .unwrap_or(0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MAKATI: BranchId = BranchId::new(1);
    const QC: BranchId = BranchId::new(2);

    #[test]
    fn test_total_is_sum_of_branches() {
        let mut balance = LoyaltyBalance::new();
        balance.credit(MAKATI, 120).unwrap();
        balance.credit(QC, 30).unwrap();
        balance.redeem(MAKATI, 20).unwrap();

        assert_eq!(balance.points_at(MAKATI), 100);
        assert_eq!(balance.points_at(QC), 30);
        assert_eq!(balance.total(), 130);
    }

    #[test]
    fn test_redeem_is_branch_scoped() {
        let mut balance = LoyaltyBalance::from_rows([(MAKATI, 50)]);
        let err = balance.redeem(QC, 10).unwrap_err();
        assert_eq!(
            err,
            LoyaltyError::InsufficientPoints {
                branch: QC,
                available: 0,
                requested: 10,
            }
        );
        // Failed redemption leaves the balance untouched
        assert_eq!(balance.total(), 50);
    }

    #[test]
    fn test_redeem_to_zero_keeps_branch() {
        let mut balance = LoyaltyBalance::from_rows([(MAKATI, 40)]);
        assert_eq!(balance.redeem(MAKATI, 40).unwrap(), 0);
        assert_eq!(balance.iter().collect::<Vec<_>>(), vec![(MAKATI, 0)]);
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let mut balance = LoyaltyBalance::new();
        assert_eq!(balance.credit(MAKATI, 0), Err(LoyaltyError::NonPositive(0)));
        assert_eq!(balance.redeem(MAKATI, -5), Err(LoyaltyError::NonPositive(-5)));
    }

    #[test]
    fn test_credit_overflow() {
        let mut balance = LoyaltyBalance::from_rows([(MAKATI, i64::MAX)]);
        assert_eq!(balance.credit(MAKATI, 1), Err(LoyaltyError::Overflow));
    }

    #[test]
    fn test_reverse_credit_takes_what_is_left() {
        let mut balance = LoyaltyBalance::from_rows([(MAKATI, 7)]);
        assert_eq!(balance.reverse_credit(MAKATI, 10), 7);
        assert_eq!(balance.points_at(MAKATI), 0);
        assert_eq!(balance.reverse_credit(QC, 10), 0);
    }

    #[test]
    fn test_apply_returns_signed_delta() {
        let mut balance = LoyaltyBalance::new();
        assert_eq!(balance.apply(QC, PointsChange::Credit(25)).unwrap(), 25);
        assert_eq!(balance.apply(QC, PointsChange::Redeem(5)).unwrap(), -5);
        assert_eq!(balance.apply(QC, PointsChange::Reverse(100)).unwrap(), -20);
        assert_eq!(balance.total(), 0);
    }

    #[test]
    fn test_from_rows_merges_duplicates() {
        let balance = LoyaltyBalance::from_rows([(QC, 5), (QC, 6)]);
        assert_eq!(balance.points_at(QC), 11);
    }

    #[test]
    fn test_policy_defaults() {
        let policy = LoyaltyPolicy::default();
        assert_eq!(policy.points_for(Money::from_minor(99_999)), 9);
        assert_eq!(policy.points_for(Money::from_minor(100_000)), 10);
        assert_eq!(policy.redemption_value(35), Money::from_minor(3_500));
        assert_eq!(policy.max_redeemable(Money::from_minor(4_550)), 45);
    }

    #[test]
    fn test_policy_guards_zero_rates() {
        let policy = LoyaltyPolicy {
            spend_per_point: Decimal::ZERO,
            point_value: Decimal::ZERO,
        };
        assert_eq!(policy.points_for(Money::from_minor(50_000)), 0);
        assert_eq!(policy.max_redeemable(Money::from_minor(50_000)), 0);
    }

    #[test]
    fn test_points_change_serde() {
        let change: PointsChange = serde_json::from_str(r#"{"kind":"redeem","points":15}"#).unwrap();
        assert_eq!(change, PointsChange::Redeem(15));
    }
}
