//! # Ledger Service
//!
//! Implements [`LedgerApi`] on top of the outbound ports.
//!
//! Every mutation follows the same pipeline:
//!
//! 1. Validate arguments (no locks held)
//! 2. Plan the lock set from a lock-free snapshot
//! 3. `begin` the store transaction (locks taken in ascending key order)
//! 4. Verify the planned set still covers every row the operation may touch;
//!    if not, drop the transaction and re-plan
//! 5. Apply domain functions, stage writes, append log rows
//! 6. Commit, or drop on any error (rollback)

mod giveaway;
mod queries;
mod support;


use std::collections::BTreeSet;
use std::time::Instant;

use bq_telemetry::{metric_add, metric_inc};
use shared_types::{AccountId, Category, Credits, Percentage, TransactionId, TransactionKind};
use tracing::{debug, info, warn};

use crate::adapters::{InMemoryDirectory, MemoryLedgerStore, SystemClock};
use crate::config::LedgerConfig;
use crate::domain::{
    aggregates, queue, Account, AccountRecord, AccountView, AuditReport, DonationReceipt, GiveBackReceipt,
    GiveawayPool, GiveawayPreview, InvariantReport, LeaderboardEntry, LedgerError, LedgerResult,
    LogEntry, OwedSummary, QueueEntry, QueueSlotView, RankChange, RepairOutcome, RepairReport,
    SupportReceipt, SupporterSummary,
};
use crate::ports::{AccountDirectory, LedgerApi, LedgerStore, LockKey, StoreTxn, TimeSource};

use support::SupportMode;

/// Service over in-memory adapters.
pub type InMemoryLedger = LedgerService<MemoryLedgerStore, SystemClock, InMemoryDirectory>;

/// Queue ledger service.
pub struct LedgerService<S, C, D> {
    store: S,
    clock: C,
    directory: D,
    config: LedgerConfig,
}

impl InMemoryLedger {
    /// Empty in-memory ledger on the wall clock.
    pub fn in_memory(config: LedgerConfig) -> LedgerResult<Self> {
        Self::new(
            MemoryLedgerStore::new(),
            SystemClock,
            InMemoryDirectory::new(),
            config,
        )
    }
}

impl<S, C, D> LedgerService<S, C, D>
where
    S: LedgerStore,
    C: TimeSource,
    D: AccountDirectory,
{
    pub fn new(store: S, clock: C, directory: D, config: LedgerConfig) -> LedgerResult<Self> {
        config.validate()?;
        info!(
            required_per_slot = config.required_per_slot,
            credits_per_sender_slot = config.credits_per_sender_slot,
            lock_timeout_ms = config.lock_timeout_ms,
            "ledger service ready"
        );
        Ok(Self {
            store,
            clock,
            directory,
            config,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // =========================================================================
    // TRANSACTION PLUMBING
    // =========================================================================

    /// Run `body` inside a store transaction holding the keys from `plan`.
    ///
    /// A [`LedgerError::LockSetStale`] from `body` rolls back and re-plans, up
    /// to `max_lock_attempts` times.
    fn run_locked<T, P, B>(
        &self,
        operation: &'static str,
        mut plan: P,
        mut body: B,
    ) -> LedgerResult<(T, Vec<TransactionId>)>
    where
        P: FnMut() -> LedgerResult<BTreeSet<LockKey>>,
        B: FnMut(&mut dyn StoreTxn) -> LedgerResult<T>,
    {
        let started = Instant::now();
        for attempt in 1..=self.config.max_lock_attempts {
            let keys = plan()?;
            let mut txn = self
                .store
                .begin(&keys, self.config.lock_timeout())
                .map_err(|err| match err {
                    LedgerError::Concurrency { waited_ms, .. } => LedgerError::Concurrency {
                        operation,
                        waited_ms,
                    },
                    other => other,
                })?;

            match body(&mut *txn) {
                Ok(value) => {
                    let ids = txn.commit()?;
                    return Ok((value, ids));
                }
                Err(LedgerError::LockSetStale { .. }) => {
                    debug!(operation, attempt, locks = keys.len(), "lock set stale, re-planning");
                }
                Err(err) => return Err(err),
            }
        }

        Err(LedgerError::Concurrency {
            operation,
            waited_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Decode a record for mutation, logging any repair of its slot progress.
    ///
    /// The repaired progress is persisted when the caller saves the account.
    fn decode(&self, record: &AccountRecord) -> Account {
        let (account, outcome) = Account::decode(record, &self.config);
        match &outcome {
            RepairOutcome::Clean => {}
            RepairOutcome::Normalized => {
                debug!(account = %record.id, "slot progress normalized");
                metric_inc!(bq_telemetry::SLOT_REPAIRS, &["normalized"]);
            }
            RepairOutcome::Reset { reason } => {
                let err = LedgerError::CorruptedState {
                    account: record.id,
                    reason: reason.clone(),
                };
                bq_telemetry::log_account_event!(
                    warn,
                    "queue",
                    "slot progress reset to zero",
                    record.id,
                    error = %err,
                    slots = record.slot_count
                );
                metric_inc!(bq_telemetry::SLOT_REPAIRS, &["reset"]);
            }
        }
        account
    }

    fn load(&self, txn: &dyn StoreTxn, id: AccountId) -> LedgerResult<Account> {
        let record = txn
            .load_account(id)?
            .ok_or(LedgerError::AccountNotFound { account: id })?;
        Ok(self.decode(&record))
    }

    fn save(&self, txn: &mut dyn StoreTxn, account: &Account) -> LedgerResult<()> {
        txn.put_account(account.to_record())
    }

    /// Restore rank contiguity over every queued account.
    fn rebalance_queue(&self, txn: &mut dyn StoreTxn) -> LedgerResult<Vec<RankChange>> {
        let records = txn.queued_accounts()?;
        let mut entries: Vec<QueueEntry> = records.iter().map(QueueEntry::from).collect();
        let changes = queue::rebalance(&mut entries);

        for change in &changes {
            if let Some(record) = records.iter().find(|r| r.id == change.account) {
                let mut record = record.clone();
                record.queue_rank = change.to;
                txn.put_account(record)?;
            }
        }

        if !changes.is_empty() {
            debug!(queued = entries.len(), moved = changes.len(), "queue rebalanced");
            metric_add!(bq_telemetry::REBALANCE_MOVES, changes.len() as u64);
        }
        Ok(changes)
    }

    /// Record a failed operation.
    fn observe<T>(&self, operation: &'static str, result: LedgerResult<T>) -> LedgerResult<T> {
        if let Err(err) = &result {
            let kind = err.kind();
            metric_inc!(bq_telemetry::LEDGER_ERRORS, &[operation, kind.as_str()]);
            if err.is_retryable() {
                warn!(operation, error = %err, "operation timed out");
            } else {
                debug!(operation, error = %err, kind = kind.as_str(), "operation rejected");
            }
        }
        result
    }
}

/// Fail with `LockSetStale` if any of `keys` is not held by `txn`.
fn ensure_covered(
    txn: &dyn StoreTxn,
    operation: &'static str,
    keys: impl IntoIterator<Item = LockKey>,
) -> LedgerResult<()> {
    let held = txn.held();
    match keys.into_iter().find(|key| !held.contains(key)) {
        Some(missing) => {
            debug!(operation, key = ?missing, "row outside planned lock set");
            Err(LedgerError::LockSetStale { operation })
        }
        None => Ok(()),
    }
}

fn require_positive(amount: Credits, what: &str) -> LedgerResult<()> {
    if amount == 0 {
        return Err(LedgerError::validation(format!("{what} must be positive")));
    }
    Ok(())
}

// =============================================================================
// INBOUND PORT
// =============================================================================

impl<S, C, D> LedgerApi for LedgerService<S, C, D>
where
    S: LedgerStore,
    C: TimeSource,
    D: AccountDirectory,
{
    fn support(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Credits,
        target_slot: u32,
    ) -> LedgerResult<SupportReceipt> {
        let _span = bq_telemetry::ledger_span!("support", %from, %to, amount, target_slot).entered();
        self.observe(
            "support",
            self.execute_support(SupportMode::Peer, from, to, amount, target_slot),
        )
    }

    fn admin_support(
        &self,
        admin: AccountId,
        to: AccountId,
        amount: Credits,
        target_slot: u32,
    ) -> LedgerResult<SupportReceipt> {
        let _span = bq_telemetry::ledger_span!("admin_support", %admin, %to, amount, target_slot).entered();
        self.observe(
            "admin_support",
            self.execute_support(SupportMode::Admin, admin, to, amount, target_slot),
        )
    }

    fn donate(
        &self,
        donor: AccountId,
        category: Category,
        amount: Credits,
        location: Option<&str>,
    ) -> LedgerResult<DonationReceipt> {
        let _span = bq_telemetry::ledger_span!("donate", %donor, %category, amount).entered();
        self.observe("donate", self.execute_donate(donor, category, amount, location))
    }

    fn give_back(&self, account: AccountId, amount: Credits) -> LedgerResult<GiveBackReceipt> {
        let _span = bq_telemetry::ledger_span!("give_back", %account, amount).entered();
        self.observe("give_back", self.execute_give_back(account, amount))
    }

    fn open_account(&self, id: AccountId) -> LedgerResult<bool> {
        let result = self
            .run_locked(
                "open_account",
                || Ok(BTreeSet::from([LockKey::Account(id)])),
                |txn| {
                    if txn.load_account(id)?.is_some() {
                        return Ok(false);
                    }
                    txn.put_account(AccountRecord::new(id))?;
                    Ok(true)
                },
            )
            .map(|(created, _)| created);
        if let Ok(true) = result {
            debug!(account = %id, "account opened");
        }
        self.observe("open_account", result)
    }

    fn credit_external(&self, id: AccountId, amount: Credits) -> LedgerResult<AccountView> {
        let result = require_positive(amount, "deposit amount").and_then(|()| {
            self.run_locked(
                "credit_external",
                || Ok(BTreeSet::from([LockKey::Account(id)])),
                |txn| {
                    let mut account = self.load(txn, id)?;
                    account.credit(amount)?;
                    self.save(txn, &account)?;
                    txn.append(
                        LogEntry::new(TransactionKind::Transfer, amount, self.clock.now())
                            .to_account(id),
                    )?;
                    Ok(queries::account_view(&account))
                },
            )
            .map(|(view, _)| view)
        });
        self.observe("credit_external", result)
    }

    fn configure_pool(
        &self,
        category: Category,
        percentage_per_user: Percentage,
        active: bool,
    ) -> LedgerResult<GiveawayPool> {
        let result = self.execute_configure_pool(category, percentage_per_user, active);
        self.observe("configure_pool", result)
    }

    fn queue_snapshot(&self, location: Option<&str>) -> LedgerResult<Vec<QueueSlotView>> {
        self.observe("queue_snapshot", self.read_queue(None, location))
    }

    fn supportable_slots(
        &self,
        viewer: AccountId,
        location: Option<&str>,
    ) -> LedgerResult<Vec<QueueSlotView>> {
        self.observe(
            "supportable_slots",
            self.read_queue(Some(viewer), location),
        )
    }

    fn account_slots(&self, id: AccountId) -> LedgerResult<Vec<QueueSlotView>> {
        self.observe("account_slots", self.read_account_slots(id))
    }

    fn account_view(&self, id: AccountId) -> LedgerResult<AccountView> {
        self.observe("account_view", self.read_account_view(id))
    }

    fn amount_owed(&self, id: AccountId) -> LedgerResult<OwedSummary> {
        self.observe("amount_owed", self.read_amount_owed(id))
    }

    fn supporters_of(&self, id: AccountId) -> LedgerResult<Vec<SupporterSummary>> {
        self.observe("supporters_of", self.read_supporters_of(id))
    }

    fn supporter_leaderboard(&self, limit: usize) -> LedgerResult<Vec<LeaderboardEntry>> {
        self.observe(
            "supporter_leaderboard",
            self.read_leaderboard(|log| aggregates::supporter_leaderboard(log, limit)),
        )
    }

    fn donor_leaderboard(&self, limit: usize) -> LedgerResult<Vec<LeaderboardEntry>> {
        self.observe(
            "donor_leaderboard",
            self.read_leaderboard(|log| aggregates::donor_leaderboard(log, limit)),
        )
    }

    fn pool_status(&self, category: Category) -> LedgerResult<GiveawayPool> {
        let result = self
            .store
            .pool(category)
            .and_then(|pool| pool.ok_or(LedgerError::NoActivePool { category }));
        self.observe("pool_status", result)
    }

    fn giveaway_preview(
        &self,
        category: Category,
        location: Option<&str>,
    ) -> LedgerResult<GiveawayPreview> {
        self.observe(
            "giveaway_preview",
            self.read_giveaway_preview(category, location),
        )
    }

    fn repair_slot_progress(&self, id: AccountId) -> LedgerResult<RepairReport> {
        let _span = bq_telemetry::ledger_span!("repair_slot_progress", account = %id).entered();
        self.observe(
            "repair_slot_progress",
            self.execute_repair(Some(id)),
        )
    }

    fn repair_all_slot_progress(&self) -> LedgerResult<RepairReport> {
        let _span = bq_telemetry::ledger_span!("repair_all_slot_progress").entered();
        self.observe("repair_all_slot_progress", self.execute_repair(None))
    }

    fn audit_account(&self, id: AccountId) -> LedgerResult<AuditReport> {
        self.observe("audit_account", self.read_audit(id))
    }

    fn check_invariants(&self) -> LedgerResult<InvariantReport> {
        self.observe("check_invariants", self.read_invariants())
    }
}
