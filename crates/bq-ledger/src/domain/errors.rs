//! Ledger error types.
//!
//! Every failure aborts the enclosing store transaction; no variant is ever
//! returned after a partial write became visible.

use shared_types::{AccountId, Category, Credits, TypeParseError};
use thiserror::Error;

use super::entities::Rank;

/// Ledger error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Malformed input: non-positive amount, self-support, bad slot index.
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    /// Balance does not cover the requested amount.
    #[error("Insufficient balance for account {account}: required {required}, available {available}")]
    InsufficientBalance {
        account: AccountId,
        required: Credits,
        available: Credits,
    },

    /// Precedence rule broken.
    #[error("Queue rule violation: rank {sender_rank} may not support rank {recipient_rank}: {reason}")]
    QueueRuleViolation {
        sender_rank: Rank,
        recipient_rank: Rank,
        reason: &'static str,
    },

    /// Unknown account.
    #[error("Account not found: {account}")]
    AccountNotFound { account: AccountId },

    /// Unknown giveaway category.
    #[error("Category not found: {name}")]
    CategoryNotFound { name: String },

    /// Stored slot progress could not be trusted and was reset.
    ///
    /// Recovered locally: logged and counted, never returned by an operation.
    #[error("Corrupted slot progress for account {account}: {reason}")]
    CorruptedState { account: AccountId, reason: String },

    /// Row locks could not be acquired in time. Safe to retry.
    #[error("Concurrency conflict in {operation}: gave up after {waited_ms} ms, retry the request")]
    Concurrency {
        operation: &'static str,
        waited_ms: u64,
    },

    /// The category has no pool, or its pool is disabled.
    #[error("No active {category} giveaway pool")]
    NoActivePool { category: Category },

    /// Nobody has returned credits since their last reward.
    #[error("No eligible recipients for the {category} giveaway")]
    NoEligibleRecipients { category: Category },

    /// The account has not received more than it already returned.
    #[error("Account {account} has nothing owed to return")]
    NothingOwed { account: AccountId },

    /// The planned lock set no longer covers the rows the operation touches.
    /// Internal: the service re-plans and retries.
    #[error("Lock set for {operation} is stale")]
    LockSetStale { operation: &'static str },

    /// Store contract violated (write outside the held lock set, etc).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Arithmetic overflow or another impossible state.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used by callers to pick a response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    InsufficientBalance,
    QueueRule,
    NotFound,
    Concurrency,
    Precondition,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::InsufficientBalance => "insufficient_balance",
            ErrorKind::QueueRule => "queue_rule",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Concurrency => "concurrency",
            ErrorKind::Precondition => "precondition",
            ErrorKind::Internal => "internal",
        }
    }
}

impl LedgerError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Self::QueueRuleViolation { .. } => ErrorKind::QueueRule,
            Self::AccountNotFound { .. } | Self::CategoryNotFound { .. } => ErrorKind::NotFound,
            Self::Concurrency { .. } | Self::LockSetStale { .. } => ErrorKind::Concurrency,
            Self::NoActivePool { .. } | Self::NoEligibleRecipients { .. } | Self::NothingOwed { .. } => {
                ErrorKind::Precondition
            }
            Self::CorruptedState { .. } | Self::Storage(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Only lock timeouts are worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Concurrency { .. })
    }
}

impl From<TypeParseError> for LedgerError {
    fn from(err: TypeParseError) -> Self {
        match err {
            TypeParseError::UnknownCategory(name) => Self::CategoryNotFound { name },
            other => Self::validation(other.to_string()),
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_balance_message_has_both_amounts() {
        let err = LedgerError::InsufficientBalance {
            account: AccountId(3),
            required: 400,
            available: 120,
        };
        let msg = err.to_string();
        assert!(msg.contains("required 400"));
        assert!(msg.contains("available 120"));
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
    }

    #[test]
    fn test_only_concurrency_is_retryable() {
        let timeout = LedgerError::Concurrency {
            operation: "support",
            waited_ms: 5000,
        };
        assert!(timeout.is_retryable());
        assert!(!LedgerError::validation("amount must be positive").is_retryable());
        assert!(!LedgerError::NothingOwed {
            account: AccountId(1)
        }
        .is_retryable());
    }

    #[test]
    fn test_unknown_category_maps_to_not_found() {
        let err: LedgerError = "Housing".parse::<Category>().unwrap_err().into();
        assert_eq!(
            err,
            LedgerError::CategoryNotFound {
                name: "Housing".into()
            }
        );
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
