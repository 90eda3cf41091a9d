//! # In-Memory Ledger Store
//!
//! Single-process implementation of [`LedgerStore`].
//!
//! - Committed state lives behind one `RwLock`; lock-free reads clone out of
//!   it.
//! - Row locks come from a [`LockTable`]; a transaction holds them from
//!   `begin` until commit or drop.
//! - Writes are staged in the transaction and applied under a single write
//!   guard at commit, so readers never see half of an operation.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use parking_lot::RwLock;
use shared_types::{AccountId, Category, TransactionId};
use tracing::{debug, warn};

use super::lock_table::LockTable;
use crate::domain::{
    AccountRecord, GiveawayPool, LedgerError, LedgerResult, LogEntry, Transaction,
};
use crate::ports::{LedgerStore, LockKey, StoreTxn};

#[derive(Debug, Default)]
struct Tables {
    accounts: BTreeMap<AccountId, AccountRecord>,
    pools: BTreeMap<Category, GiveawayPool>,
    log: Vec<Transaction>,
    next_tx_id: u64,
}

/// In-memory store for tests, the node runtime and scenario replay.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    tables: RwLock<Tables>,
    locks: LockTable,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a stored row, bypassing locks.
    ///
    /// Loads fixtures and legacy rows; never used by ledger operations.
    pub fn seed_account(&self, record: AccountRecord) {
        self.tables.write().accounts.insert(record.id, record);
    }

    /// Append a committed log row, bypassing locks.
    pub fn seed_log(&self, entry: LogEntry) -> TransactionId {
        let mut tables = self.tables.write();
        tables.next_tx_id += 1;
        let id = TransactionId(tables.next_tx_id);
        tables.log.push(Transaction { id, entry });
        id
    }

    pub fn lock_table(&self) -> &LockTable {
        &self.locks
    }
}

fn by_rank(mut records: Vec<AccountRecord>) -> Vec<AccountRecord> {
    records.sort_by_key(|r| (r.queue_rank, r.id));
    records
}

impl LedgerStore for MemoryLedgerStore {
    fn begin(
        &self,
        keys: &BTreeSet<LockKey>,
        timeout: Duration,
    ) -> LedgerResult<Box<dyn StoreTxn + '_>> {
        self.locks.acquire_all(keys, timeout).map_err(|expired| {
            let waited_ms = expired.waited.as_millis() as u64;
            warn!(key = ?expired.key, waited_ms, "row lock timeout");
            bq_telemetry::metric_inc!(bq_telemetry::LOCK_TIMEOUTS);
            LedgerError::Concurrency {
                operation: "begin",
                waited_ms,
            }
        })?;

        Ok(Box::new(MemoryTxn {
            store: self,
            held: keys.clone(),
            accounts: BTreeMap::new(),
            pools: BTreeMap::new(),
            log: Vec::new(),
        }))
    }

    fn account(&self, id: AccountId) -> LedgerResult<Option<AccountRecord>> {
        Ok(self.tables.read().accounts.get(&id).cloned())
    }

    fn accounts(&self) -> LedgerResult<Vec<AccountRecord>> {
        Ok(self.tables.read().accounts.values().cloned().collect())
    }

    fn queued_accounts(&self) -> LedgerResult<Vec<AccountRecord>> {
        let queued = self
            .tables
            .read()
            .accounts
            .values()
            .filter(|r| r.is_queued())
            .cloned()
            .collect();
        Ok(by_rank(queued))
    }

    fn pool(&self, category: Category) -> LedgerResult<Option<GiveawayPool>> {
        Ok(self.tables.read().pools.get(&category).cloned())
    }

    fn pools(&self) -> LedgerResult<Vec<GiveawayPool>> {
        Ok(self.tables.read().pools.values().cloned().collect())
    }

    fn transactions(&self) -> LedgerResult<Vec<Transaction>> {
        Ok(self.tables.read().log.clone())
    }
}

// =============================================================================
// TRANSACTION
// =============================================================================

struct MemoryTxn<'a> {
    store: &'a MemoryLedgerStore,
    held: BTreeSet<LockKey>,
    accounts: BTreeMap<AccountId, AccountRecord>,
    pools: BTreeMap<Category, GiveawayPool>,
    log: Vec<LogEntry>,
}

impl MemoryTxn<'_> {
    fn require(&self, key: LockKey) -> LedgerResult<()> {
        if self.held.contains(&key) {
            Ok(())
        } else {
            Err(LedgerError::Storage(format!("write to {key:?} without holding its lock")))
        }
    }
}

impl StoreTxn for MemoryTxn<'_> {
    fn held(&self) -> &BTreeSet<LockKey> {
        &self.held
    }

    fn load_account(&self, id: AccountId) -> LedgerResult<Option<AccountRecord>> {
        if let Some(staged) = self.accounts.get(&id) {
            return Ok(Some(staged.clone()));
        }
        self.store.account(id)
    }

    fn put_account(&mut self, record: AccountRecord) -> LedgerResult<()> {
        self.require(LockKey::Account(record.id))?;
        self.accounts.insert(record.id, record);
        Ok(())
    }

    fn queued_accounts(&self) -> LedgerResult<Vec<AccountRecord>> {
        let tables = self.store.tables.read();
        let merged = tables
            .accounts
            .values()
            .filter(|r| !self.accounts.contains_key(&r.id))
            .chain(self.accounts.values())
            .filter(|r| r.is_queued())
            .cloned()
            .collect();
        Ok(by_rank(merged))
    }

    fn load_pool(&self, category: Category) -> LedgerResult<Option<GiveawayPool>> {
        if let Some(staged) = self.pools.get(&category) {
            return Ok(Some(staged.clone()));
        }
        self.store.pool(category)
    }

    fn put_pool(&mut self, pool: GiveawayPool) -> LedgerResult<()> {
        self.require(LockKey::Pool(pool.category))?;
        self.pools.insert(pool.category, pool);
        Ok(())
    }

    fn log_entries(&self) -> LedgerResult<Vec<LogEntry>> {
        let tables = self.store.tables.read();
        Ok(tables
            .log
            .iter()
            .map(|tx| tx.entry.clone())
            .chain(self.log.iter().cloned())
            .collect())
    }

    fn append(&mut self, entry: LogEntry) -> LedgerResult<()> {
        self.log.push(entry);
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> LedgerResult<Vec<TransactionId>> {
        let store = self.store;
        let mut tables = store.tables.write();

        let accounts = std::mem::take(&mut self.accounts);
        let pools = std::mem::take(&mut self.pools);
        let log = std::mem::take(&mut self.log);
        let (account_writes, pool_writes) = (accounts.len(), pools.len());

        tables.accounts.extend(accounts);
        tables.pools.extend(pools);

        let mut ids = Vec::with_capacity(log.len());
        for entry in log {
            tables.next_tx_id += 1;
            let id = TransactionId(tables.next_tx_id);
            tables.log.push(Transaction { id, entry });
            ids.push(id);
        }
        drop(tables);

        debug!(
            accounts = account_writes,
            pools = pool_writes,
            rows = ids.len(),
            "store transaction committed"
        );
        // locks released by Drop
        Ok(ids)
    }
}

impl Drop for MemoryTxn<'_> {
    fn drop(&mut self) {
        if !self.accounts.is_empty() || !self.pools.is_empty() || !self.log.is_empty() {
            debug!(
                accounts = self.accounts.len(),
                rows = self.log.len(),
                "store transaction rolled back"
            );
        }
        self.store.locks.release(self.held.iter());
    }
}
