//! Core ledger entities.
//!
//! Two views of an account exist:
//!
//! - [`AccountRecord`]: the stored row. Slot progress is an untyped JSON blob
//!   because older rows carry legacy encodings.
//! - [`Account`]: the working copy the domain mutates. Slot progress is typed
//!   and its length *is* the slot count.
//!
//! Conversion from record to account always runs the progress decoder.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{
    AccountId, Category, Credits, Percentage, Timestamp, TransactionId, TransactionKind,
};

use super::errors::{LedgerError, LedgerResult};
use super::slot_progress::{validate_slot_progress, RepairOutcome, SlotProgress};
use crate::config::LedgerConfig;

/// Queue position. `0` means not queued.
pub type Rank = u64;

/// Sentinel rank for accounts outside the queue.
pub const UNQUEUED: Rank = 0;

// =============================================================================
// REWARD STATE
// =============================================================================

/// Per-category giveaway bookkeeping for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RewardState {
    /// Lifetime return amount already consumed by past rewards
    pub last_rewarded_giveback: Credits,
    /// Sum of rewards paid from this category's pool
    pub total_rewards_received: Credits,
}

impl RewardState {
    /// Record a payout that consumed `giveback` credits of returns.
    pub fn record(&mut self, giveback: Credits, reward: Credits) -> LedgerResult<()> {
        self.last_rewarded_giveback = checked_add(self.last_rewarded_giveback, giveback)?;
        self.total_rewards_received = checked_add(self.total_rewards_received, reward)?;
        Ok(())
    }
}

// =============================================================================
// ACCOUNT
// =============================================================================

/// Stored account row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: AccountId,
    pub balance: Credits,
    pub queue_rank: Rank,
    pub slot_count: u32,
    pub slot_progress: Value,
    pub lifetime_received: Credits,
    pub lifetime_returned: Credits,
    #[serde(default)]
    pub rewards: BTreeMap<Category, RewardState>,
}

impl AccountRecord {
    /// Fresh row as issued by the identity collaborator.
    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            balance: 0,
            queue_rank: UNQUEUED,
            slot_count: 0,
            slot_progress: Value::Array(Vec::new()),
            lifetime_received: 0,
            lifetime_returned: 0,
            rewards: BTreeMap::new(),
        }
    }

    pub fn is_queued(&self) -> bool {
        occupies_queue(self.queue_rank, self.slot_count)
    }
}

/// An account is in the queue when it has a rank and at least one open slot.
pub(crate) fn occupies_queue(rank: Rank, slot_count: u32) -> bool {
    rank != UNQUEUED && slot_count > 0
}

/// Working copy of an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub balance: Credits,
    pub queue_rank: Rank,
    pub progress: SlotProgress,
    pub lifetime_received: Credits,
    pub lifetime_returned: Credits,
    pub rewards: BTreeMap<Category, RewardState>,
}

impl Account {
    /// Decode a stored row, repairing its slot progress if needed.
    pub fn decode(record: &AccountRecord, config: &LedgerConfig) -> (Self, RepairOutcome) {
        let (progress, outcome) = validate_slot_progress(
            &record.slot_progress,
            record.slot_count,
            config.required_per_slot,
            config.corruption_tolerance,
        );
        let account = Self {
            id: record.id,
            balance: record.balance,
            queue_rank: if record.slot_count == 0 {
                UNQUEUED
            } else {
                record.queue_rank
            },
            progress,
            lifetime_received: record.lifetime_received,
            lifetime_returned: record.lifetime_returned,
            rewards: record.rewards.clone(),
        };
        (account, outcome)
    }

    /// Encode back into the canonical stored row.
    pub fn to_record(&self) -> AccountRecord {
        AccountRecord {
            id: self.id,
            balance: self.balance,
            queue_rank: self.queue_rank,
            slot_count: self.slot_count(),
            slot_progress: self.progress.to_value(),
            lifetime_received: self.lifetime_received,
            lifetime_returned: self.lifetime_returned,
            rewards: self.rewards.clone(),
        }
    }

    pub fn slot_count(&self) -> u32 {
        self.progress.len()
    }

    pub fn is_queued(&self) -> bool {
        occupies_queue(self.queue_rank, self.slot_count())
    }

    /// Received through support and not yet returned.
    pub fn owed(&self) -> Credits {
        self.lifetime_received.saturating_sub(self.lifetime_returned)
    }

    pub fn reward_state(&self, category: Category) -> RewardState {
        self.rewards.get(&category).copied().unwrap_or_default()
    }

    pub fn reward_state_mut(&mut self, category: Category) -> &mut RewardState {
        self.rewards.entry(category).or_default()
    }

    /// Take credits out of the balance, refusing to go below zero.
    pub fn debit(&mut self, amount: Credits) -> LedgerResult<()> {
        if self.balance < amount {
            return Err(LedgerError::InsufficientBalance {
                account: self.id,
                required: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        Ok(())
    }

    pub fn credit(&mut self, amount: Credits) -> LedgerResult<()> {
        self.balance = checked_add(self.balance, amount)?;
        Ok(())
    }
}

pub(crate) fn checked_add(a: Credits, b: Credits) -> LedgerResult<Credits> {
    a.checked_add(b)
        .ok_or_else(|| LedgerError::Internal(format!("credit overflow adding {b} to {a}")))
}

// =============================================================================
// GIVEAWAY POOL
// =============================================================================

/// One giveaway pool per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiveawayPool {
    pub category: Category,
    /// Share of an account's new giveback paid as reward, `0..=100`
    pub percentage_per_user: Percentage,
    /// Donated this round, not yet distributed
    pub pending_amount: Credits,
    /// Left over from earlier rounds
    pub hold_amount: Credits,
    pub total_donated_lifetime: Credits,
    pub is_active: bool,
}

impl GiveawayPool {
    pub fn new(category: Category, percentage_per_user: Percentage) -> Self {
        Self {
            category,
            percentage_per_user,
            pending_amount: 0,
            hold_amount: 0,
            total_donated_lifetime: 0,
            is_active: true,
        }
    }

    /// Credits a distribution round may pay out.
    pub fn available(&self) -> LedgerResult<Credits> {
        checked_add(self.pending_amount, self.hold_amount)
    }
}

// =============================================================================
// TRANSACTION LOG
// =============================================================================

/// Content of one log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub kind: TransactionKind,
    /// `None` when credits come from a pool or from outside the ledger
    pub from: Option<AccountId>,
    /// `None` when credits go into a pool
    pub to: Option<AccountId>,
    pub amount: Credits,
    /// Slot number as addressed when the support was made
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_slot: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// Queue slots opened for the sender by this support
    #[serde(default)]
    pub slots_opened: u32,
    #[serde(default)]
    pub slot_completed: bool,
    pub timestamp: Timestamp,
}

impl LogEntry {
    pub fn new(kind: TransactionKind, amount: Credits, timestamp: Timestamp) -> Self {
        Self {
            kind,
            from: None,
            to: None,
            amount,
            target_slot: None,
            category: None,
            slots_opened: 0,
            slot_completed: false,
            timestamp,
        }
    }

    pub fn from_account(mut self, account: AccountId) -> Self {
        self.from = Some(account);
        self
    }

    pub fn to_account(mut self, account: AccountId) -> Self {
        self.to = Some(account);
        self
    }

    pub fn in_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn against_slot(mut self, slot: u32, slots_opened: u32, slot_completed: bool) -> Self {
        self.target_slot = Some(slot);
        self.slots_opened = slots_opened;
        self.slot_completed = slot_completed;
        self
    }
}

/// Committed, immutable log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    #[serde(flatten)]
    pub entry: LogEntry,
}
