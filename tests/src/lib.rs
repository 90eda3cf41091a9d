//! # Bubble Queue Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Ledger builders and ledger-wide accounting checks
//! └── integration/
//!     ├── flows.rs      # End-to-end support and giveaway lifecycles
//!     ├── contention.rs # Many threads against one shared ledger
//!     └── properties.rs # Property tests over random operation sequences
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p bq-tests
//!
//! # By category
//! cargo test -p bq-tests integration::flows
//! cargo test -p bq-tests integration::properties
//! ```

pub mod fixtures;
pub mod integration;
