//! Ledger invariant checkers.
//!
//! Used by tests after every operation sequence and by the
//! `check_invariants` audit operation.

use serde::{Deserialize, Serialize};
use shared_types::{AccountId, Credits};

use super::aggregates::AccountTotals;
use super::distribution::RoundPlan;
use super::entities::{Account, UNQUEUED};
use super::queue::QueueEntry;

/// Rank contiguity.
///
/// Sorted by rank, the first queued account sits at 1 and each next account
/// starts right after the previous one's last slot.
pub fn invariant_rank_contiguity(entries: &[QueueEntry]) -> bool {
    let mut queued: Vec<&QueueEntry> = entries
        .iter()
        .filter(|e| e.rank != 0 && e.slot_count > 0)
        .collect();
    queued.sort_by_key(|e| e.rank);

    let mut expected = 1;
    for entry in queued {
        if entry.rank != expected {
            return false;
        }
        expected += u64::from(entry.slot_count);
    }
    true
}

/// Slot progress bounds.
///
/// Queued accounts hold exactly `slot_count` slots each within
/// `[0, required]`; unqueued accounts hold none.
pub fn invariant_progress_bounds(account: &Account, required: Credits) -> bool {
    if account.queue_rank != UNQUEUED {
        !account.progress.is_empty() && account.progress.iter().all(|(_, p)| p <= required)
    } else {
        account.progress.is_empty()
    }
}

/// Distribution conservation: nothing created or lost by a round.
pub fn invariant_distribution_conservation(plan: &RoundPlan, pending: Credits, hold: Credits) -> bool {
    let paid: u128 = plan.awards.iter().map(|a| u128::from(a.actual)).sum();
    paid == u128::from(plan.distributed)
        && u128::from(plan.distributed) + u128::from(plan.new_hold)
            == u128::from(pending) + u128::from(hold)
}

/// Cached lifetime counters agree with the log.
pub fn invariant_counters_match_log(account: &Account, totals: &AccountTotals) -> bool {
    account.lifetime_received == totals.received && account.lifetime_returned == totals.returned
}

// =============================================================================
// REPORT
// =============================================================================

/// One broken invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "invariant", rename_all = "snake_case")]
pub enum InvariantViolation {
    RankContiguity,
    ProgressBounds { account: AccountId },
    CountersMismatch { account: AccountId },
}

/// Outcome of a full invariant sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantReport {
    pub accounts_checked: usize,
    pub queued_accounts: usize,
    pub violations: Vec<InvariantViolation>,
}

impl InvariantReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::distribution::{plan_round, Claim};
    use crate::domain::slot_progress::SlotProgress;

    fn entry(id: u64, rank: u64, slots: u32) -> QueueEntry {
        QueueEntry {
            account: AccountId(id),
            rank,
            slot_count: slots,
        }
    }

    #[test]
    fn test_contiguity() {
        assert!(invariant_rank_contiguity(&[]));
        assert!(invariant_rank_contiguity(&[entry(2, 3, 1), entry(1, 1, 2)]));
        assert!(!invariant_rank_contiguity(&[entry(1, 2, 1)]));
        assert!(!invariant_rank_contiguity(&[entry(1, 1, 2), entry(2, 4, 1)]));
        // overlap
        assert!(!invariant_rank_contiguity(&[entry(1, 1, 3), entry(2, 2, 1)]));
    }

    #[test]
    fn test_progress_bounds() {
        let mut account = Account {
            id: AccountId(1),
            balance: 0,
            queue_rank: 1,
            progress: SlotProgress::from_values(vec![0, 399]),
            lifetime_received: 0,
            lifetime_returned: 0,
            rewards: Default::default(),
        };
        assert!(invariant_progress_bounds(&account, 400));
        account.progress = SlotProgress::from_values(vec![401]);
        assert!(!invariant_progress_bounds(&account, 400));
        account.queue_rank = 0;
        assert!(!invariant_progress_bounds(&account, 400));
    }

    #[test]
    fn test_conservation_of_planned_round() {
        let claims = [
            Claim {
                account: AccountId(1),
                new_giveback: 333,
            },
            Claim {
                account: AccountId(2),
                new_giveback: 777,
            },
        ];
        let plan = plan_round(97, 13, 40, &claims).unwrap();
        assert!(invariant_distribution_conservation(&plan, 97, 13));
        assert!(!invariant_distribution_conservation(&plan, 98, 13));
    }
}
