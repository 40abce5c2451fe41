//! Loyalty balances and ledger entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salonhub_core::loyalty::{LedgerReason, LoyaltyBalance, PointsChange};
use salonhub_core::{BranchId, LoyaltyEntryId, TransactionId, UserId};

/// Points held at one branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BranchPoints {
    pub branch_id: BranchId,
    pub points: i64,
}

/// A client's loyalty position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoyaltySummary {
    pub client_id: UserId,
    pub total: i64,
    pub branches: Vec<BranchPoints>,
}

impl LoyaltySummary {
    /// Summarize a balance. `total` is always the sum of `branches`.
    #[must_use]
    pub fn new(client_id: UserId, balance: &LoyaltyBalance) -> Self {
        Self {
            client_id,
            total: balance.total(),
            branches: balance
                .iter()
                .map(|(branch_id, points)| BranchPoints { branch_id, points })
                .collect(),
        }
    }
}

/// One ledger line.
#[derive(Debug, Clone, Serialize)]
pub struct LoyaltyEntry {
    pub id: LoyaltyEntryId,
    pub user_id: UserId,
    pub branch_id: BranchId,
    /// Signed change applied.
    pub delta: i64,
    /// Branch balance after the change.
    pub balance_after: i64,
    pub reason: LedgerReason,
    pub transaction_id: Option<TransactionId>,
    pub actor_id: Option<UserId>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A points change to post to a client's ledger.
#[derive(Debug, Clone)]
pub struct LoyaltyPosting {
    pub client_id: UserId,
    pub branch_id: BranchId,
    pub change: PointsChange,
    pub reason: LedgerReason,
    /// Staff member responsible, if any.
    pub actor_id: Option<UserId>,
    pub transaction_id: Option<TransactionId>,
    pub note: Option<String>,
}

/// Manual credit or redemption entered by staff.
#[derive(Debug, Clone, Deserialize)]
pub struct PointsAdjustment {
    pub branch_id: BranchId,
    pub points: i64,
    #[serde(default)]
    pub note: Option<String>,
}

/// Result of applying a points change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoyaltyOutcome {
    pub branch_id: BranchId,
    /// Signed change actually applied.
    pub delta: i64,
    pub branch_balance: i64,
    pub total: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_total_matches_branches() {
        let balance =
            LoyaltyBalance::from_rows([(BranchId::new(2), 40), (BranchId::new(1), 15)]);
        let summary = LoyaltySummary::new(UserId::new(9), &balance);
        assert_eq!(summary.total, 55);
        assert_eq!(summary.branches.iter().map(|b| b.points).sum::<i64>(), 55);
        // Branch order is stable
        assert_eq!(summary.branches[0].branch_id, BranchId::new(1));
    }
}
