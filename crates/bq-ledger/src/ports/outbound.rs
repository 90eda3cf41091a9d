//! Outbound (Driven) ports for the ledger.
//!
//! The store contract is what makes operations all-or-nothing:
//!
//! ```text
//! begin(keys) ──► StoreTxn ──► commit()   writes become visible at once
//!   │ locks acquired               │
//!   │ in ascending key order       └──► drop   staged writes discarded
//!   └─► timeout: Concurrency error            locks released
//! ```

use std::collections::BTreeSet;
use std::time::Duration;

use shared_types::{AccountId, AccountProfile, Category, Timestamp, TransactionId};

use crate::domain::{AccountRecord, GiveawayPool, LedgerResult, LogEntry, Transaction};

/// Row lock identity.
///
/// The derived order (every account before every pool, ids ascending) is the
/// one global acquisition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    Account(AccountId),
    Pool(Category),
}

/// Authoritative account, pool and log storage.
///
/// Lock-free reads may observe a snapshot older than an in-flight
/// transaction; they carry no correctness obligation.
pub trait LedgerStore: Send + Sync {
    /// Lock every key in ascending order and open a transaction.
    ///
    /// # Errors
    /// - `Concurrency`: some key stayed locked past `timeout`
    fn begin(&self, keys: &BTreeSet<LockKey>, timeout: Duration)
        -> LedgerResult<Box<dyn StoreTxn + '_>>;

    fn account(&self, id: AccountId) -> LedgerResult<Option<AccountRecord>>;

    fn accounts(&self) -> LedgerResult<Vec<AccountRecord>>;

    /// Accounts with a queue rank, in rank order.
    fn queued_accounts(&self) -> LedgerResult<Vec<AccountRecord>>;

    fn pool(&self, category: Category) -> LedgerResult<Option<GiveawayPool>>;

    fn pools(&self) -> LedgerResult<Vec<GiveawayPool>>;

    /// Committed log in commit order.
    fn transactions(&self) -> LedgerResult<Vec<Transaction>>;
}

/// A row-locked unit of work.
///
/// Reads see committed state overlaid with this transaction's staged writes.
/// Writes are only accepted for rows whose key is held.
pub trait StoreTxn {
    fn held(&self) -> &BTreeSet<LockKey>;

    fn load_account(&self, id: AccountId) -> LedgerResult<Option<AccountRecord>>;

    fn put_account(&mut self, record: AccountRecord) -> LedgerResult<()>;

    /// Queued accounts in rank order, staged writes included.
    fn queued_accounts(&self) -> LedgerResult<Vec<AccountRecord>>;

    fn load_pool(&self, category: Category) -> LedgerResult<Option<GiveawayPool>>;

    fn put_pool(&mut self, pool: GiveawayPool) -> LedgerResult<()>;

    /// Committed log entries followed by the staged ones.
    fn log_entries(&self) -> LedgerResult<Vec<LogEntry>>;

    fn append(&mut self, entry: LogEntry) -> LedgerResult<()>;

    /// Apply every staged write atomically and release the locks.
    ///
    /// Returns the ids assigned to the appended log rows, in append order.
    fn commit(self: Box<Self>) -> LedgerResult<Vec<TransactionId>>;
}

/// Time source for log timestamps.
///
/// Abstracted to allow testing with deterministic time.
pub trait TimeSource: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now(&self) -> Timestamp;
}

/// Profile lookup owned by the identity collaborator.
pub trait AccountDirectory: Send + Sync {
    fn profile(&self, id: AccountId) -> Option<AccountProfile>;
}
