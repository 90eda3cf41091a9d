//! Who may support whom.
//!
//! | Sender | Allowed recipients |
//! |--------|--------------------|
//! | unqueued (rank 0) | the front of the queue only (rank 1) |
//! | queued at rank `r` | queued accounts with rank strictly below `r` |

use super::entities::{Rank, UNQUEUED};
use super::errors::{LedgerError, LedgerResult};

/// True when an account at `sender_rank` may support one at `recipient_rank`.
pub fn can_support(sender_rank: Rank, recipient_rank: Rank) -> bool {
    check_precedence(sender_rank, recipient_rank).is_ok()
}

/// Enforce the precedence rule.
pub fn check_precedence(sender_rank: Rank, recipient_rank: Rank) -> LedgerResult<()> {
    let violation = |reason| LedgerError::QueueRuleViolation {
        sender_rank,
        recipient_rank,
        reason,
    };

    if recipient_rank == UNQUEUED {
        return Err(violation("recipient is not in the queue"));
    }
    if sender_rank == UNQUEUED {
        if recipient_rank != 1 {
            return Err(violation("newcomers may only support the front of the queue"));
        }
        return Ok(());
    }
    if recipient_rank >= sender_rank {
        return Err(violation("recipient must be ranked ahead of the sender"));
    }
    Ok(())
}
