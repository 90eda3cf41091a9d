//! Hexagonal ports.

pub mod inbound;
pub mod outbound;

pub use inbound::LedgerApi;
pub use outbound::{AccountDirectory, LedgerStore, LockKey, StoreTxn, TimeSource};
