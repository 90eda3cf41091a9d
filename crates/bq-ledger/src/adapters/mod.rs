//! Adapters: in-memory store, clocks and profile directory.

pub mod clock;
pub mod directory;
pub mod lock_table;
pub mod memory_store;

pub use clock::{ManualClock, SystemClock};
pub use directory::InMemoryDirectory;
pub use lock_table::{LockTable, LockTimeout};
pub use memory_store::MemoryLedgerStore;
