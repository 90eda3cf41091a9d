//! Read models and maintenance.
//!
//! Reads take no row locks and may observe a snapshot that is already stale.
//! Slot progress is decoded on the fly; repairs made here are never written.

use std::collections::BTreeSet;

use bq_telemetry::metric_inc;
use shared_types::{AccountId, Category};
use tracing::{info, warn};

use super::LedgerService;
use crate::domain::{
    aggregates::{self, AccountTotals},
    invariants::{
        invariant_counters_match_log, invariant_progress_bounds, invariant_rank_contiguity,
    },
    precedence, Account, AccountRecord, AccountSnapshot, AccountView, AuditReport,
    InvariantReport, InvariantViolation, LeaderboardEntry, LedgerError, LedgerResult, LogEntry,
    OwedSummary, QueueEntry, QueueSlotView, RepairOutcome, RepairReport, RepairedAccount,
    SupporterSummary, UNQUEUED,
};
use crate::ports::{AccountDirectory, LedgerStore, LockKey, TimeSource};

pub(super) fn account_view(account: &Account) -> AccountView {
    AccountView {
        account: AccountSnapshot::from(account),
        owed: account.owed(),
        rewards: account.rewards.clone(),
    }
}

impl<S, C, D> LedgerService<S, C, D>
where
    S: LedgerStore,
    C: TimeSource,
    D: AccountDirectory,
{
    fn snapshot_account(&self, id: AccountId) -> LedgerResult<Account> {
        let record = self
            .store
            .account(id)?
            .ok_or(LedgerError::AccountNotFound { account: id })?;
        Ok(Account::decode(&record, &self.config).0)
    }

    fn log_snapshot(&self) -> LedgerResult<Vec<LogEntry>> {
        Ok(self
            .store
            .transactions()?
            .into_iter()
            .map(|tx| tx.entry)
            .collect())
    }

    fn slot_views(&self, account: &Account) -> Vec<QueueSlotView> {
        let name = self.directory.profile(account.id).map(|profile| profile.name);
        account
            .progress
            .iter()
            .map(|(slot, progress)| QueueSlotView {
                account: account.id,
                name: name.clone(),
                rank: account.queue_rank + u64::from(slot) - 1,
                account_rank: account.queue_rank,
                slot_index: slot,
                progress,
                required: self.config.required_per_slot,
            })
            .collect()
    }

    // =========================================================================
    // QUEUE
    // =========================================================================

    /// Open slots in position order, optionally restricted to what `viewer`
    /// may support.
    pub(super) fn read_queue(
        &self,
        viewer: Option<AccountId>,
        location: Option<&str>,
    ) -> LedgerResult<Vec<QueueSlotView>> {
        let viewer_rank = match viewer {
            Some(id) => {
                let record = self
                    .store
                    .account(id)?
                    .ok_or(LedgerError::AccountNotFound { account: id })?;
                Some(if record.is_queued() { record.queue_rank } else { UNQUEUED })
            }
            None => None,
        };

        let mut views = Vec::new();
        for record in self.store.queued_accounts()? {
            if location.is_some() && !self.in_location(record.id, location) {
                continue;
            }
            if let (Some(viewer), Some(rank)) = (viewer, viewer_rank) {
                if record.id == viewer || !precedence::can_support(rank, record.queue_rank) {
                    continue;
                }
            }
            let (account, _) = Account::decode(&record, &self.config);
            views.extend(self.slot_views(&account));
        }
        Ok(views)
    }

    pub(super) fn read_account_slots(&self, id: AccountId) -> LedgerResult<Vec<QueueSlotView>> {
        let account = self.snapshot_account(id)?;
        Ok(self.slot_views(&account))
    }

    // =========================================================================
    // ACCOUNTS
    // =========================================================================

    pub(super) fn read_account_view(&self, id: AccountId) -> LedgerResult<AccountView> {
        Ok(account_view(&self.snapshot_account(id)?))
    }

    pub(super) fn read_amount_owed(&self, id: AccountId) -> LedgerResult<OwedSummary> {
        self.snapshot_account(id)?;
        let totals = aggregates::account_totals(&self.log_snapshot()?, id);
        Ok(OwedSummary {
            received: totals.received,
            returned: totals.returned,
            owed: totals.owed(),
        })
    }

    pub(super) fn read_supporters_of(&self, id: AccountId) -> LedgerResult<Vec<SupporterSummary>> {
        self.snapshot_account(id)?;
        Ok(aggregates::supporters_of(&self.log_snapshot()?, id))
    }

    pub(super) fn read_leaderboard<F>(&self, board: F) -> LedgerResult<Vec<LeaderboardEntry>>
    where
        F: FnOnce(&[LogEntry]) -> Vec<LeaderboardEntry>,
    {
        Ok(board(&self.log_snapshot()?))
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    /// Rewrite non-canonical rows, one short transaction per account.
    pub(super) fn execute_repair(&self, target: Option<AccountId>) -> LedgerResult<RepairReport> {
        let ids: Vec<AccountId> = match target {
            Some(id) => {
                self.snapshot_account(id)?;
                vec![id]
            }
            None => self.store.accounts()?.iter().map(|record| record.id).collect(),
        };

        let mut report = RepairReport::default();
        for id in ids {
            let (outcome, _) = self.run_locked(
                "repair_slot_progress",
                || Ok(BTreeSet::from([LockKey::Account(id)])),
                |txn| {
                    let record = txn
                        .load_account(id)?
                        .ok_or(LedgerError::AccountNotFound { account: id })?;
                    let (account, outcome) = Account::decode(&record, &self.config);
                    let rewritten = account.to_record();
                    if rewritten == record {
                        return Ok(None);
                    }
                    txn.put_account(rewritten)?;
                    Ok(Some(match outcome {
                        RepairOutcome::Clean => RepairOutcome::Normalized,
                        other => other,
                    }))
                },
            )?;
            report.examined += 1;

            if let Some(outcome) = outcome {
                metric_inc!(bq_telemetry::SLOT_REPAIRS, &[outcome.label()]);
                if outcome.is_reset() {
                    warn!(account = %id, ?outcome, "corrupted slot progress reset");
                }
                report.repaired.push(RepairedAccount {
                    account: id,
                    outcome,
                });
            }
        }

        info!(
            examined = report.examined,
            repaired = report.repaired.len(),
            resets = report.resets(),
            "slot progress repair finished"
        );
        Ok(report)
    }

    pub(super) fn read_audit(&self, id: AccountId) -> LedgerResult<AuditReport> {
        let record = self
            .store
            .account(id)?
            .ok_or(LedgerError::AccountNotFound { account: id })?;
        let totals = aggregates::account_totals(&self.log_snapshot()?, id);

        let reward_mismatches = Category::ALL
            .into_iter()
            .filter(|category| {
                let cached = record
                    .rewards
                    .get(category)
                    .map_or(0, |state| state.total_rewards_received);
                cached != totals.rewards.get(category).copied().unwrap_or(0)
            })
            .collect();

        let report = AuditReport {
            account: id,
            cached_received: record.lifetime_received,
            log_received: totals.received,
            cached_returned: record.lifetime_returned,
            log_returned: totals.returned,
            reward_mismatches,
        };
        if !report.is_consistent() {
            warn!(account = %id, ?report, "cached counters disagree with the log");
        }
        Ok(report)
    }

    pub(super) fn read_invariants(&self) -> LedgerResult<InvariantReport> {
        let records: Vec<AccountRecord> = self.store.accounts()?;
        let log = self.log_snapshot()?;

        let queue: Vec<QueueEntry> = records
            .iter()
            .filter(|record| record.is_queued())
            .map(QueueEntry::from)
            .collect();

        let mut report = InvariantReport {
            accounts_checked: records.len(),
            queued_accounts: queue.len(),
            violations: Vec::new(),
        };
        if !invariant_rank_contiguity(&queue) {
            report.violations.push(InvariantViolation::RankContiguity);
        }

        for record in &records {
            let (account, outcome) = Account::decode(record, &self.config);
            if !outcome.is_clean()
                || !invariant_progress_bounds(&account, self.config.required_per_slot)
            {
                report
                    .violations
                    .push(InvariantViolation::ProgressBounds { account: record.id });
            }
            let totals: AccountTotals = aggregates::account_totals(&log, record.id);
            if !invariant_counters_match_log(&account, &totals) {
                report
                    .violations
                    .push(InvariantViolation::CountersMismatch { account: record.id });
            }
        }

        if report.is_clean() {
            info!(accounts = report.accounts_checked, queued = report.queued_accounts, "invariants hold");
        } else {
            bq_telemetry::log_event!(
                warn,
                "queue",
                "invariant violations found",
                violations = report.violations.len()
            );
        }
        Ok(report)
    }
}
