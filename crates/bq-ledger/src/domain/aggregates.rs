//! Derivations over the transaction log.
//!
//! The log is the source of truth. Everything here is a pure fold over
//! [`LogEntry`] rows, so the same code serves committed snapshots and
//! in-transaction views that include staged rows.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use shared_types::{AccountId, Category, Credits, Timestamp, TransactionKind};

use super::entities::LogEntry;

// =============================================================================
// PER-ACCOUNT TOTALS
// =============================================================================

/// Lifetime counters for one account, recomputed from the log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTotals {
    /// Support (peer and admin) delivered into the account's slots
    pub received: Credits,
    /// Credits the account gave back
    pub returned: Credits,
    /// Pool payouts by category (round transfers and return rewards)
    pub rewards: BTreeMap<Category, Credits>,
}

impl AccountTotals {
    pub fn owed(&self) -> Credits {
        self.received.saturating_sub(self.returned)
    }
}

pub fn account_totals<'a>(
    entries: impl IntoIterator<Item = &'a LogEntry>,
    account: AccountId,
) -> AccountTotals {
    let mut totals = AccountTotals::default();
    for entry in entries {
        match entry.kind {
            kind if kind.is_support() && entry.to == Some(account) => {
                totals.received = totals.received.saturating_add(entry.amount);
            }
            TransactionKind::Return if entry.from == Some(account) => {
                totals.returned = totals.returned.saturating_add(entry.amount);
            }
            TransactionKind::Transfer | TransactionKind::Reward if entry.to == Some(account) => {
                if let Some(category) = entry.category {
                    let paid = totals.rewards.entry(category).or_default();
                    *paid = paid.saturating_add(entry.amount);
                }
            }
            _ => {}
        }
    }
    totals
}

/// Accounts with at least one return row.
pub fn returners<'a>(entries: impl IntoIterator<Item = &'a LogEntry>) -> BTreeSet<AccountId> {
    entries
        .into_iter()
        .filter(|e| e.kind == TransactionKind::Return)
        .filter_map(|e| e.from)
        .collect()
}

/// Lifetime returns per returner.
pub fn returned_by_account<'a>(
    entries: impl IntoIterator<Item = &'a LogEntry>,
) -> BTreeMap<AccountId, Credits> {
    let mut returned = BTreeMap::new();
    for entry in entries {
        if entry.kind != TransactionKind::Return {
            continue;
        }
        if let Some(account) = entry.from {
            let total: &mut Credits = returned.entry(account).or_default();
            *total = total.saturating_add(entry.amount);
        }
    }
    returned
}

// =============================================================================
// LEADERBOARDS
// =============================================================================

/// Supporter tier by lifetime amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

impl Tier {
    pub fn for_total(total: Credits) -> Self {
        match total {
            t if t >= 5_000 => Tier::Diamond,
            t if t >= 3_000 => Tier::Platinum,
            t if t >= 1_500 => Tier::Gold,
            t if t >= 500 => Tier::Silver,
            _ => Tier::Bronze,
        }
    }
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub position: usize,
    pub account: AccountId,
    pub total: Credits,
    pub count: u64,
    /// Queue slots the account opened for itself (supporter board only)
    pub slots_opened: u64,
    pub tier: Tier,
}

#[derive(Default)]
struct Tally {
    total: Credits,
    count: u64,
    slots_opened: u64,
}

fn rank_tallies(tallies: BTreeMap<AccountId, Tally>, limit: usize) -> Vec<LeaderboardEntry> {
    let mut rows: Vec<(AccountId, Tally)> = tallies.into_iter().collect();
    // total descending, account id ascending on ties
    rows.sort_by(|(a_id, a), (b_id, b)| b.total.cmp(&a.total).then(a_id.cmp(b_id)));
    rows.into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (account, tally))| LeaderboardEntry {
            position: i + 1,
            account,
            total: tally.total,
            count: tally.count,
            slots_opened: tally.slots_opened,
            tier: Tier::for_total(tally.total),
        })
        .collect()
}

/// Peer supporters ranked by lifetime support given.
pub fn supporter_leaderboard<'a>(
    entries: impl IntoIterator<Item = &'a LogEntry>,
    limit: usize,
) -> Vec<LeaderboardEntry> {
    let mut tallies: BTreeMap<AccountId, Tally> = BTreeMap::new();
    for entry in entries {
        if entry.kind != TransactionKind::Support {
            continue;
        }
        let Some(from) = entry.from else { continue };
        let tally = tallies.entry(from).or_default();
        tally.total = tally.total.saturating_add(entry.amount);
        tally.count += 1;
        tally.slots_opened += u64::from(entry.slots_opened);
    }
    rank_tallies(tallies, limit)
}

/// Donors ranked by lifetime donations across all pools.
pub fn donor_leaderboard<'a>(
    entries: impl IntoIterator<Item = &'a LogEntry>,
    limit: usize,
) -> Vec<LeaderboardEntry> {
    let mut tallies: BTreeMap<AccountId, Tally> = BTreeMap::new();
    for entry in entries {
        if entry.kind != TransactionKind::Donation {
            continue;
        }
        let Some(from) = entry.from else { continue };
        let tally = tallies.entry(from).or_default();
        tally.total = tally.total.saturating_add(entry.amount);
        tally.count += 1;
    }
    rank_tallies(tallies, limit)
}

// =============================================================================
// SUPPORTERS OF AN ACCOUNT
// =============================================================================

/// Everything one supporter gave to one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupporterSummary {
    pub supporter: AccountId,
    pub total: Credits,
    pub count: u64,
    /// Slot numbers as addressed at the time of each support
    pub slots: Vec<u32>,
    pub first_supported_at: Timestamp,
    pub last_supported_at: Timestamp,
}

/// Supporters of `account` in order of first support.
pub fn supporters_of<'a>(
    entries: impl IntoIterator<Item = &'a LogEntry>,
    account: AccountId,
) -> Vec<SupporterSummary> {
    let mut summaries: Vec<SupporterSummary> = Vec::new();
    for entry in entries {
        if !entry.kind.is_support() || entry.to != Some(account) {
            continue;
        }
        let Some(supporter) = entry.from else { continue };
        let position = match summaries.iter().position(|s| s.supporter == supporter) {
            Some(i) => i,
            None => {
                summaries.push(SupporterSummary {
                    supporter,
                    total: 0,
                    count: 0,
                    slots: Vec::new(),
                    first_supported_at: entry.timestamp,
                    last_supported_at: entry.timestamp,
                });
                summaries.len() - 1
            }
        };
        let summary = &mut summaries[position];
        summary.total = summary.total.saturating_add(entry.amount);
        summary.count += 1;
        summary.last_supported_at = summary.last_supported_at.max(entry.timestamp);
        if let Some(slot) = entry.target_slot {
            summary.slots.push(slot);
        }
    }
    summaries
}
