//! Cross-module scenarios driven through the public ledger API.

pub mod contention;
pub mod flows;
pub mod properties;
