//! Operation results and read models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shared_types::{AccountId, Category, Credits, TransactionId};

use super::distribution::Award;
use super::entities::{Account, GiveawayPool, Rank, RewardState};
use super::queue::Enrollment;
use super::slot_progress::RepairOutcome;

/// Post-operation view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub id: AccountId,
    pub balance: Credits,
    pub queue_rank: Rank,
    pub slot_count: u32,
    pub slot_progress: Vec<Credits>,
    pub lifetime_received: Credits,
    pub lifetime_returned: Credits,
}

impl From<&Account> for AccountSnapshot {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            balance: account.balance,
            queue_rank: account.queue_rank,
            slot_count: account.slot_count(),
            slot_progress: account.progress.values().to_vec(),
            lifetime_received: account.lifetime_received,
            lifetime_returned: account.lifetime_returned,
        }
    }
}

/// Account with its per-category reward bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    pub account: AccountSnapshot,
    pub owed: Credits,
    pub rewards: BTreeMap<Category, RewardState>,
}

// =============================================================================
// SUPPORT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportReceipt {
    /// Log rows written, in order
    pub transactions: Vec<TransactionId>,
    pub slot_completed: bool,
    pub minted_amount: Credits,
    pub sender: AccountSnapshot,
    pub recipient: AccountSnapshot,
    /// Sender's new queue placement
    pub placement: Enrollment,
    /// Accounts whose rank moved
    pub rank_changes: usize,
}

// =============================================================================
// GIVEAWAY
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationReceipt {
    pub transactions: Vec<TransactionId>,
    pub category: Category,
    pub total_distributed: Credits,
    /// Paid recipients only
    pub recipients: Vec<Award>,
    pub scaled: bool,
    pub new_hold_amount: Credits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnReward {
    pub category: Category,
    pub reward: Credits,
    pub pool_hold_after: Credits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiveBackReceipt {
    pub transactions: Vec<TransactionId>,
    pub amount_returned: Credits,
    pub remaining_owed: Credits,
    pub rewards_breakdown: Vec<ReturnReward>,
    pub new_balance: Credits,
}

/// Dry run of a donation round against the current pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiveawayPreview {
    pub pool: GiveawayPool,
    pub eligible_accounts: usize,
    pub total_proposed: Credits,
    pub would_distribute: Credits,
    pub would_hold: Credits,
}

// =============================================================================
// QUEUE READS
// =============================================================================

/// One open slot in the queue listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSlotView {
    pub account: AccountId,
    pub name: Option<String>,
    /// Position of this slot: `account_rank + slot_index − 1`
    pub rank: Rank,
    pub account_rank: Rank,
    pub slot_index: u32,
    pub progress: Credits,
    pub required: Credits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwedSummary {
    pub received: Credits,
    pub returned: Credits,
    pub owed: Credits,
}

// =============================================================================
// MAINTENANCE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairedAccount {
    pub account: AccountId,
    #[serde(flatten)]
    pub outcome: RepairOutcome,
}

/// Result of a slot progress repair pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    pub examined: usize,
    pub repaired: Vec<RepairedAccount>,
}

impl RepairReport {
    pub fn resets(&self) -> usize {
        self.repaired.iter().filter(|r| r.outcome.is_reset()).count()
    }
}

/// Cached counters of one account checked against the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub account: AccountId,
    pub cached_received: Credits,
    pub log_received: Credits,
    pub cached_returned: Credits,
    pub log_returned: Credits,
    /// Categories whose cached reward total differs from the log
    pub reward_mismatches: Vec<Category>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.cached_received == self.log_received
            && self.cached_returned == self.log_returned
            && self.reward_mismatches.is_empty()
    }
}
