//! Configuration for the queue ledger.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared_types::Credits;

use crate::domain::errors::{LedgerError, LedgerResult};

/// Credits of cumulative support that complete one slot.
pub const REQUIRED_PER_SLOT: Credits = 400;

/// Credits a supporter spends per queue slot opened for them.
pub const SLOTS_PER_CREDIT_RATIO: Credits = 100;

/// Ledger configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Credits required to complete a slot; also the amount minted on completion
    pub required_per_slot: Credits,
    /// Support amount that buys the supporter one slot (floor division)
    pub credits_per_sender_slot: Credits,
    /// Populated progress entries tolerated beyond the slot count before the
    /// stored progress is treated as corrupted
    pub corruption_tolerance: usize,
    /// Deadline for acquiring every row lock of one operation
    pub lock_timeout_ms: u64,
    /// Attempts at planning a lock set before giving up with a concurrency error
    pub max_lock_attempts: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            required_per_slot: REQUIRED_PER_SLOT,
            credits_per_sender_slot: SLOTS_PER_CREDIT_RATIO,
            corruption_tolerance: 5,
            lock_timeout_ms: 5_000,
            max_lock_attempts: 3,
        }
    }
}

impl LedgerConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Reject configurations the ledger cannot run with.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.required_per_slot == 0 {
            return Err(LedgerError::validation("required_per_slot must be positive"));
        }
        if self.credits_per_sender_slot == 0 {
            return Err(LedgerError::validation(
                "credits_per_sender_slot must be positive",
            ));
        }
        if self.max_lock_attempts == 0 {
            return Err(LedgerError::validation("max_lock_attempts must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert_eq!(config.required_per_slot, 400);
        assert_eq!(config.credits_per_sender_slot, 100);
        assert_eq!(config.corruption_tolerance, 5);
        assert_eq!(config.lock_timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_slot_size() {
        let config = LedgerConfig {
            required_per_slot: 0,
            ..LedgerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LedgerError::Validation { .. })
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LedgerConfig = serde_json::from_str(r#"{"lock_timeout_ms": 250}"#).unwrap();
        assert_eq!(config.lock_timeout_ms, 250);
        assert_eq!(config.required_per_slot, REQUIRED_PER_SLOT);
    }
}
