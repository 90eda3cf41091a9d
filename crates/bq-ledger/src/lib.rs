//! # Bubble Queue Ledger
//!
//! The queue ledger and giveaway distribution engine. Accounts support the
//! open slots of accounts ranked ahead of them; every completed slot mints
//! credits for its owner, and supporters earn slots of their own. Accounts
//! that give credits back are rewarded from per-category giveaway pools.
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Description |
//! |----|-----------|-------------|
//! | 1 | Balance Non-Negativity | No operation debits more than a balance holds |
//! | 2 | Rank Contiguity | Queued ranks tile `1..` with no gaps or overlaps at commit |
//! | 3 | Precedence | Newcomers support rank 1; queued accounts support strictly higher ranks |
//! | 4 | Fixed Minting | A completed slot mints exactly `required_per_slot` |
//! | 5 | Repair Idempotence | Decoding repaired slot progress changes nothing |
//! | 6 | Distribution Conservation | `Σ rewards + new hold == pending + old hold` |
//! | 7 | Log Authority | Cached lifetime counters are re-derivable from the log |
//! | 8 | All-or-Nothing | Every mutation commits completely or not at all |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! ```text
//!              ┌────────────────────────────────────────┐
//!  LedgerApi ─→│ service::LedgerService                 │
//!              │   ├── domain (pure: queue, precedence, │
//!              │   │    distribution, slot progress)    │
//!              │   └── ports::outbound ────────────────┼─→ LedgerStore / StoreTxn
//!              └────────────────────────────────────────┘   TimeSource
//!                                                           AccountDirectory
//! ```
//!
//! - `domain/` - Entities, errors and pure algorithms
//! - `ports/` - Inbound API and outbound SPI traits
//! - `adapters/` - In-memory store with row locks, clocks, profile directory
//! - `service/` - Application service implementing the API
//!
//! ## Usage
//!
//! ```ignore
//! use bq_ledger::{InMemoryLedger, LedgerApi, LedgerConfig};
//!
//! let ledger = InMemoryLedger::in_memory(LedgerConfig::default())?;
//! let receipt = ledger.support(from, to, 400, 1)?;
//! let queue = ledger.queue_snapshot(None)?;
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export key types for convenience
pub use adapters::{InMemoryDirectory, ManualClock, MemoryLedgerStore, SystemClock};
pub use config::{LedgerConfig, REQUIRED_PER_SLOT, SLOTS_PER_CREDIT_RATIO};
pub use domain::{
    validate_slot_progress, Account, AccountRecord, AccountSnapshot, AccountView, AuditReport,
    DonationReceipt, Enrollment, ErrorKind, GiveBackReceipt, GiveawayPool, GiveawayPreview,
    InvariantReport, InvariantViolation, LeaderboardEntry, LedgerError, LedgerResult, LogEntry,
    OwedSummary, QueueSlotView, RepairOutcome, RepairReport, SlotProgress, SupportReceipt,
    SupporterSummary, Tier, Transaction,
};
pub use ports::{AccountDirectory, LedgerApi, LedgerStore, LockKey, StoreTxn, TimeSource};
pub use service::{InMemoryLedger, LedgerService};
