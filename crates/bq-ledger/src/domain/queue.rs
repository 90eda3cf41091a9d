//! # Queue & Slot Arithmetic
//!
//! Pure functions over ranks and slots. The service decides which rows to
//! load and write; nothing here touches the store.
//!
//! ## Rank Layout
//!
//! Each queued account occupies `slot_count` consecutive positions starting
//! at its rank:
//!
//! ```text
//! rank:   1   2   3   4   5   6
//!         [ A   A ][ B ][ C   C   C ]
//! A.rank = 1, A.slots = 2
//! B.rank = 3, B.slots = 1
//! C.rank = 4, C.slots = 3
//! ```
//!
//! Completing one of A's slots leaves a gap at position 2 until
//! [`rebalance`] shifts B and C down.
//!
//! `rebalance` is a full O(queue) pass on every completion. The queue is
//! bounded by the number of accounts with open slots, and the pass runs under
//! row locks the operation already holds.

use serde::{Deserialize, Serialize};
use shared_types::{AccountId, Credits};

use super::entities::{checked_add, Account, AccountRecord, Rank, UNQUEUED};
use super::errors::{LedgerError, LedgerResult};
use super::slot_progress::SlotProgress;

/// Rank and size of one queued account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub account: AccountId,
    pub rank: Rank,
    pub slot_count: u32,
}

impl QueueEntry {
    /// Last position this account occupies.
    pub fn last_position(&self) -> Rank {
        self.rank + Rank::from(self.slot_count.max(1)) - 1
    }
}

impl From<&AccountRecord> for QueueEntry {
    fn from(record: &AccountRecord) -> Self {
        Self {
            account: record.id,
            rank: record.queue_rank,
            slot_count: record.slot_count,
        }
    }
}

impl From<&Account> for QueueEntry {
    fn from(account: &Account) -> Self {
        Self {
            account: account.id,
            rank: account.queue_rank,
            slot_count: account.slot_count(),
        }
    }
}

/// How an enrollment changed the supporter's place in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "placement", rename_all = "snake_case")]
pub enum Enrollment {
    /// Support too small to open a slot.
    Unchanged,
    /// Entered the queue behind everyone else.
    Joined { rank: Rank, slots: u32 },
    /// Already queued; slots appended.
    Extended { rank: Rank, added: u32, slot_count: u32 },
}

/// Result of completing a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCompletion {
    /// Credits created for the recipient
    pub minted: Credits,
    /// Progress beyond the requirement, absorbed rather than carried
    pub overshoot: Credits,
    /// Recipient's last slot closed; it left the queue
    pub left_queue: bool,
}

/// One rank rewritten by [`rebalance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankChange {
    pub account: AccountId,
    pub from: Rank,
    pub to: Rank,
}

/// Highest position occupied by any queued account, `0` for an empty queue.
pub fn max_occupied_rank(entries: &[QueueEntry]) -> Rank {
    entries
        .iter()
        .filter(|e| e.rank != UNQUEUED && e.slot_count > 0)
        .map(QueueEntry::last_position)
        .max()
        .unwrap_or(0)
}

/// Open `slots` zeroed slots for `account`.
///
/// An unqueued account joins at `max_occupied + 1`. A queued one keeps its
/// rank and grows, which overlaps the next account until the caller
/// rebalances.
pub fn enroll(account: &mut Account, slots: u32, max_occupied: Rank) -> Enrollment {
    if slots == 0 {
        return Enrollment::Unchanged;
    }
    if account.is_queued() {
        account.progress.extend_zeroed(slots);
        Enrollment::Extended {
            rank: account.queue_rank,
            added: slots,
            slot_count: account.slot_count(),
        }
    } else {
        account.queue_rank = max_occupied + 1;
        account.progress = SlotProgress::zeroed(slots);
        Enrollment::Joined {
            rank: account.queue_rank,
            slots,
        }
    }
}

/// Close `slot`, mint `required` into the balance and renumber what is left.
pub fn complete_slot(
    account: &mut Account,
    slot: u32,
    required: Credits,
) -> LedgerResult<SlotCompletion> {
    let progress = account.progress.remove(slot).ok_or_else(|| {
        LedgerError::validation(format!(
            "slot {slot} does not exist on account {} ({} slots)",
            account.id,
            account.slot_count()
        ))
    })?;

    account.balance = checked_add(account.balance, required)?;

    let left_queue = account.progress.is_empty();
    if left_queue {
        account.queue_rank = UNQUEUED;
        account.progress.clear();
    }

    Ok(SlotCompletion {
        minted: required,
        overshoot: progress.saturating_sub(required),
        left_queue,
    })
}

/// Recompute ranks so the queue is contiguous from 1.
///
/// Entries are walked in current rank order (ties by account id); unqueued
/// entries are ignored. Returns only the ranks that changed.
pub fn rebalance(entries: &mut [QueueEntry]) -> Vec<RankChange> {
    entries.sort_by_key(|e| (e.rank == UNQUEUED || e.slot_count == 0, e.rank, e.account));

    let mut changes = Vec::new();
    let mut next: Rank = 1;
    for entry in entries.iter_mut() {
        if entry.rank == UNQUEUED || entry.slot_count == 0 {
            continue;
        }
        if entry.rank != next {
            changes.push(RankChange {
                account: entry.account,
                from: entry.rank,
                to: next,
            });
            entry.rank = next;
        }
        next += Rank::from(entry.slot_count);
    }
    changes
}
