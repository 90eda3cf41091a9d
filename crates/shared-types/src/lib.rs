//! # Shared Types Crate
//!
//! Identifiers and value types used across the Bubble Queue workspace.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every crate names accounts, transactions and
//!   pool categories through the types defined here.
//! - **Integer credits**: credits are whole units (`u64`). No floating point
//!   ever touches a balance.
//! - **Opaque profiles**: display metadata (name, location) is owned by the
//!   identity collaborator; the ledger only reads it.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
