//! # Scenario Files
//!
//! JSON description of an initial ledger state and the operations to replay
//! against it.
//!
//! ```json
//! {
//!   "accounts": [
//!     { "id": 1, "name": "Ayesha", "city": "Lahore", "balance": 0,
//!       "queue": { "rank": 1, "progress": [0] } },
//!     { "id": 2, "name": "Bilal", "balance": 500 }
//!   ],
//!   "pools": [ { "category": "Medical", "percentage": 25 } ],
//!   "steps": [
//!     { "op": "support", "from": 2, "to": 1, "amount": 400, "slot": 1 },
//!     { "op": "parallel", "steps": [ ... ] }
//!   ]
//! }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shared_types::{AccountId, AccountProfile, Category, Credits, Percentage};

fn yes() -> bool {
    true
}

/// Initial state plus operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub accounts: Vec<AccountSeed>,
    pub pools: Vec<PoolSeed>,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("invalid scenario {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Account opened before replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSeed {
    pub id: AccountId,
    pub name: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default = "yes")]
    pub active: bool,
    /// Deposited through the external-credit hook.
    #[serde(default)]
    pub balance: Credits,
    /// Pre-existing queue position, for bootstrapping a queue.
    #[serde(default)]
    pub queue: Option<QueueSeed>,
}

impl AccountSeed {
    pub fn profile(&self) -> AccountProfile {
        AccountProfile {
            id: self.id,
            name: self.name.clone(),
            city: self.city.clone(),
            area: self.area.clone(),
            active: self.active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSeed {
    pub rank: u64,
    pub progress: Vec<Credits>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSeed {
    pub category: Category,
    pub percentage: Percentage,
    #[serde(default = "yes")]
    pub active: bool,
}

/// One replayed operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Support {
        from: AccountId,
        to: AccountId,
        amount: Credits,
        slot: u32,
    },
    AdminSupport {
        admin: AccountId,
        to: AccountId,
        amount: Credits,
        slot: u32,
    },
    Donate {
        donor: AccountId,
        category: Category,
        amount: Credits,
        #[serde(default)]
        location: Option<String>,
    },
    GiveBack {
        account: AccountId,
        amount: Credits,
    },
    Credit {
        account: AccountId,
        amount: Credits,
    },
    ConfigurePool {
        category: Category,
        percentage: Percentage,
        #[serde(default = "yes")]
        active: bool,
    },
    Queue {
        #[serde(default)]
        location: Option<String>,
    },
    Preview {
        category: Category,
        #[serde(default)]
        location: Option<String>,
    },
    Owed {
        account: AccountId,
    },
    Leaderboard {
        #[serde(default = "default_limit")]
        limit: usize,
    },
    Repair,
    CheckInvariants,
    /// Children run concurrently on blocking worker threads.
    Parallel {
        steps: Vec<Step>,
    },
}

fn default_limit() -> usize {
    10
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Support { .. } => "support",
            Step::AdminSupport { .. } => "admin_support",
            Step::Donate { .. } => "donate",
            Step::GiveBack { .. } => "give_back",
            Step::Credit { .. } => "credit",
            Step::ConfigurePool { .. } => "configure_pool",
            Step::Queue { .. } => "queue",
            Step::Preview { .. } => "preview",
            Step::Owed { .. } => "owed",
            Step::Leaderboard { .. } => "leaderboard",
            Step::Repair => "repair",
            Step::CheckInvariants => "check_invariants",
            Step::Parallel { .. } => "parallel",
        }
    }
}
