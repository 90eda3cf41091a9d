//! In-memory profile directory.

use std::collections::HashMap;

use parking_lot::RwLock;
use shared_types::{AccountId, AccountProfile};

use crate::ports::AccountDirectory;

/// Profiles keyed by account id.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    profiles: RwLock<HashMap<AccountId, AccountProfile>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, profile: AccountProfile) {
        self.profiles.write().insert(profile.id, profile);
    }

    pub fn set_active(&self, id: AccountId, active: bool) -> bool {
        match self.profiles.write().get_mut(&id) {
            Some(profile) => {
                profile.active = active;
                true
            }
            None => false,
        }
    }
}

impl AccountDirectory for InMemoryDirectory {
    fn profile(&self, id: AccountId) -> Option<AccountProfile> {
        self.profiles.read().get(&id).cloned()
    }
}
