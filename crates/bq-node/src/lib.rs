//! # Bubble Queue Node
//!
//! Runtime around the queue ledger: configuration loading, telemetry
//! startup and scenario replay.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (defaults, TOML file, `BQ_*` environment)
//! 2. Initialise logging and metrics
//! 3. Build the ledger over the in-memory adapters
//! 4. Seed scenario accounts and pools
//! 5. Replay steps, fanning `parallel` groups out to worker threads
//! 6. Report receipts, the final queue and an invariant check

pub mod config;
pub mod runtime;
pub mod scenario;

pub use config::{ConfigError, NodeConfig};
pub use runtime::{apply, NodeRuntime, Outcome, RunSummary, StepReport};
pub use scenario::{AccountSeed, PoolSeed, QueueSeed, Scenario, Step};
