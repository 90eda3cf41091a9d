//! # Test Fixtures
//!
//! Builders that open accounts through the public API, plus checks that must
//! hold for the whole ledger after any sequence of operations.

use bq_ledger::{
    AccountRecord, InMemoryDirectory, LedgerApi, LedgerConfig, LedgerService, LedgerStore,
    LogEntry, ManualClock, MemoryLedgerStore,
};
use serde_json::json;
use shared_types::{AccountId, AccountProfile, Credits, TransactionKind};

pub type TestLedger = LedgerService<MemoryLedgerStore, ManualClock, InMemoryDirectory>;

pub fn ledger() -> TestLedger {
    ledger_with(LedgerConfig::default())
}

pub fn ledger_with(config: LedgerConfig) -> TestLedger {
    LedgerService::new(
        MemoryLedgerStore::new(),
        ManualClock::starting_at(1_700_000_000_000),
        InMemoryDirectory::new(),
        config,
    )
    .expect("default config is valid")
}

pub fn id(n: u64) -> AccountId {
    AccountId(n)
}

/// Open an account and deposit `balance` through the external-credit hook.
pub fn funded(ledger: &TestLedger, n: u64, balance: Credits) {
    ledger.open_account(id(n)).unwrap();
    if balance > 0 {
        ledger.credit_external(id(n), balance).unwrap();
    }
}

/// Open an account already sitting in the queue at `rank`.
pub fn queued(ledger: &TestLedger, n: u64, rank: u64, progress: Vec<Credits>) {
    ledger.open_account(id(n)).unwrap();
    let mut record: AccountRecord = ledger.store().account(id(n)).unwrap().unwrap();
    record.queue_rank = rank;
    record.slot_count = progress.len() as u32;
    record.slot_progress = json!(progress);
    ledger.store().seed_account(record);
}

pub fn profile(ledger: &TestLedger, n: u64, name: &str, city: &str, area: &str) {
    ledger
        .directory()
        .upsert(AccountProfile::new(id(n), name).located(city, area));
}

pub fn log(ledger: &TestLedger) -> Vec<LogEntry> {
    ledger
        .store()
        .transactions()
        .unwrap()
        .into_iter()
        .map(|tx| tx.entry)
        .collect()
}

/// Credits held by accounts and pools.
pub fn credits_in_ledger(ledger: &TestLedger) -> Credits {
    let accounts: Credits = ledger
        .store()
        .accounts()
        .unwrap()
        .iter()
        .map(|r| r.balance)
        .sum();
    let pools: Credits = ledger
        .store()
        .pools()
        .unwrap()
        .iter()
        .map(|p| p.pending_amount + p.hold_amount)
        .sum();
    accounts + pools
}

/// Credits the log says should be in the ledger: external deposits and
/// minting, less everything spent on support or given back.
pub fn credits_by_log(ledger: &TestLedger) -> Credits {
    let required = ledger.config().required_per_slot;
    let mut added: Credits = 0;
    let mut removed: Credits = 0;
    for entry in log(ledger) {
        match entry.kind {
            TransactionKind::Transfer if entry.from.is_none() && entry.category.is_none() => {
                added += entry.amount
            }
            TransactionKind::Support | TransactionKind::AdminSupport => {
                removed += entry.amount;
                if entry.slot_completed {
                    added += required;
                }
            }
            TransactionKind::Return => removed += entry.amount,
            _ => {}
        }
    }
    added - removed
}

/// Panic unless the ledger is internally consistent.
pub fn assert_consistent(ledger: &TestLedger) {
    let report = ledger.check_invariants().unwrap();
    assert!(report.is_clean(), "invariant violations: {:?}", report.violations);

    assert_eq!(credits_in_ledger(ledger), credits_by_log(ledger), "credit accounting drifted");

    for record in ledger.store().accounts().unwrap() {
        let audit = ledger.audit_account(record.id).unwrap();
        assert!(audit.is_consistent(), "counter drift: {audit:?}");
    }
}
