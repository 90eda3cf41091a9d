//! # Error Types
//!
//! Parse errors for the shared value types.

use thiserror::Error;

/// Errors raised while parsing shared value types from external input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeParseError {
    /// The category name is not one of the known giveaway categories.
    #[error("Unknown giveaway category: {0}")]
    UnknownCategory(String),

    /// The transaction kind name is not recognised.
    #[error("Unknown transaction kind: {0}")]
    UnknownTransactionKind(String),
}
