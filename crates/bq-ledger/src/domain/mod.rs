//! Domain layer: entities, errors and the pure algorithms of the ledger.

pub mod aggregates;
pub mod distribution;
pub mod entities;
pub mod errors;
pub mod invariants;
pub mod precedence;
pub mod queue;
pub mod slot_progress;
pub mod value_objects;

pub use aggregates::{AccountTotals, LeaderboardEntry, SupporterSummary, Tier};
pub use distribution::{Award, Claim, RoundPlan};
pub use entities::*;
pub use errors::{ErrorKind, LedgerError, LedgerResult};
pub use invariants::{InvariantReport, InvariantViolation};
pub use queue::{Enrollment, QueueEntry, RankChange, SlotCompletion};
pub use slot_progress::{validate_slot_progress, RepairOutcome, SlotProgress};
pub use value_objects::*;
