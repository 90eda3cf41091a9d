//! # Shared Entities
//!
//! ## Clusters
//!
//! - **Identity**: `AccountId`, `TransactionId`, `AccountProfile`
//! - **Money**: `Credits`, `Timestamp`
//! - **Giveaway**: `Category`, `Percentage`
//! - **Log**: `TransactionKind`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::TypeParseError;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Identifier of a user account, issued by the identity collaborator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for AccountId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Sequence number of a transaction log row.
///
/// Assigned by the store at commit time; strictly increasing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct TransactionId(pub u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx#{}", self.0)
    }
}

/// Display metadata for an account.
///
/// Owned by the identity collaborator. The ledger uses it for location
/// filtering, giveaway eligibility (`active`) and display enrichment only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub id: AccountId,
    pub name: String,
    pub city: Option<String>,
    pub area: Option<String>,
    pub active: bool,
}

impl AccountProfile {
    /// An active profile with no location.
    pub fn new(id: AccountId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            city: None,
            area: None,
            active: true,
        }
    }

    /// Builder-style location setter.
    pub fn located(mut self, city: impl Into<String>, area: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self.area = Some(area.into());
        self
    }

    /// True when the profile's city or area equals `location`.
    ///
    /// `None` and the literal `"All"` match every profile.
    pub fn matches_location(&self, location: Option<&str>) -> bool {
        match location {
            None | Some("All") => true,
            Some(wanted) => {
                self.city.as_deref() == Some(wanted) || self.area.as_deref() == Some(wanted)
            }
        }
    }
}

// =============================================================================
// CLUSTER B: MONEY
// =============================================================================

/// Whole credits ("bubbles").
pub type Credits = u64;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

// =============================================================================
// CLUSTER C: GIVEAWAY
// =============================================================================

/// Giveaway pool category. One pool exists per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Medical,
    Grocery,
    Education,
}

impl Category {
    /// All categories in lock order.
    pub const ALL: [Category; 3] = [Category::Medical, Category::Grocery, Category::Education];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Medical => "Medical",
            Category::Grocery => "Grocery",
            Category::Education => "Education",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TypeParseError::UnknownCategory(s.to_string()))
    }
}

/// Whole-number percentage in `0..=100`.
pub type Percentage = u8;

// =============================================================================
// CLUSTER D: LOG
// =============================================================================

/// Kind of a transaction log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Peer support into a queue slot.
    Support,
    /// Donation into a giveaway pool.
    Donation,
    /// Payout from a donation round, or an externally minted deposit.
    Transfer,
    /// Credits voluntarily returned by a supported account.
    Return,
    /// Immediate reward paid from a pool's hold on return.
    Reward,
    /// Support issued by an administrator outside the precedence rule.
    AdminSupport,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Support => "support",
            TransactionKind::Donation => "donation",
            TransactionKind::Transfer => "transfer",
            TransactionKind::Return => "return",
            TransactionKind::Reward => "reward",
            TransactionKind::AdminSupport => "admin_support",
        }
    }

    /// Kinds that deliver credits into a queue slot.
    pub fn is_support(&self) -> bool {
        matches!(self, TransactionKind::Support | TransactionKind::AdminSupport)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "support" => Ok(TransactionKind::Support),
            "donation" => Ok(TransactionKind::Donation),
            "transfer" => Ok(TransactionKind::Transfer),
            "return" => Ok(TransactionKind::Return),
            "reward" => Ok(TransactionKind::Reward),
            "admin_support" => Ok(TransactionKind::AdminSupport),
            other => Err(TypeParseError::UnknownTransactionKind(other.to_string())),
        }
    }
}
