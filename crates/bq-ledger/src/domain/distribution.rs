//! # Giveaway Distribution Math
//!
//! Pure, integer-only payout planning. No store access, no side effects:
//! the service applies a [`RoundPlan`] inside its transaction.
//!
//! ## Donation Round
//!
//! 1. `available = pending + hold`
//! 2. each claim proposes `floor(new_giveback × percentage / 100)`
//! 3. claims proposing 0 are dropped
//! 4. if `Σ proposed ≤ available` everyone is paid in full, otherwise each
//!    award is `floor(proposed × available / Σ proposed)`
//! 5. `new_hold = available − Σ actual`
//!
//! Flooring only ever rounds down, so `Σ actual ≤ available` and
//! `Σ actual + new_hold == pending + hold` holds exactly.
//!
//! ## Return Reward
//!
//! On a give-back, each active pool pays `floor(amount × percentage / 100)`
//! capped at its hold.

use serde::{Deserialize, Serialize};
use shared_types::{AccountId, Credits, Percentage};

use super::errors::{LedgerError, LedgerResult};

/// Largest accepted `percentage_per_user`.
pub const MAX_PERCENTAGE: Percentage = 100;

/// An account's claim on a round: returns not yet rewarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub account: AccountId,
    pub new_giveback: Credits,
}

/// Planned payout for one claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Award {
    pub account: AccountId,
    pub new_giveback: Credits,
    pub proposed: Credits,
    pub actual: Credits,
}

/// Full plan for one donation round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundPlan {
    pub available: Credits,
    pub total_proposed: Credits,
    /// Proposals exceeded the pool and were scaled down
    pub scaled: bool,
    /// Claims with a positive proposal, in claim order
    pub awards: Vec<Award>,
    pub distributed: Credits,
    pub new_hold: Credits,
}

impl RoundPlan {
    /// Awards that actually move credits.
    pub fn paid(&self) -> impl Iterator<Item = &Award> {
        self.awards.iter().filter(|a| a.actual > 0)
    }
}

fn check_percentage(percentage: Percentage) -> LedgerResult<()> {
    if percentage > MAX_PERCENTAGE {
        return Err(LedgerError::validation(format!(
            "percentage_per_user {percentage} exceeds {MAX_PERCENTAGE}"
        )));
    }
    Ok(())
}

/// `floor(amount × percentage / 100)` without intermediate overflow.
pub fn proposed_reward(amount: Credits, percentage: Percentage) -> Credits {
    let scaled = u128::from(amount) * u128::from(percentage) / 100;
    // percentage ≤ 100 keeps the result ≤ amount
    Credits::try_from(scaled).unwrap_or(amount)
}

/// Immediate reward for returning `amount`, capped at the pool's hold.
pub fn immediate_reward(
    amount: Credits,
    percentage: Percentage,
    hold: Credits,
) -> LedgerResult<Credits> {
    check_percentage(percentage)?;
    Ok(proposed_reward(amount, percentage).min(hold))
}

/// Plan a proportional, pool-bounded round.
pub fn plan_round(
    pending: Credits,
    hold: Credits,
    percentage: Percentage,
    claims: &[Claim],
) -> LedgerResult<RoundPlan> {
    check_percentage(percentage)?;

    let available = pending
        .checked_add(hold)
        .ok_or_else(|| LedgerError::Internal("pool balance overflow".into()))?;

    let mut awards: Vec<Award> = claims
        .iter()
        .map(|claim| Award {
            account: claim.account,
            new_giveback: claim.new_giveback,
            proposed: proposed_reward(claim.new_giveback, percentage),
            actual: 0,
        })
        .filter(|award| award.proposed > 0)
        .collect();

    let total_proposed: u128 = awards.iter().map(|a| u128::from(a.proposed)).sum();
    let scaled = total_proposed > u128::from(available);

    let mut distributed: Credits = 0;
    for award in &mut awards {
        award.actual = if scaled {
            let share = u128::from(award.proposed) * u128::from(available) / total_proposed;
            // share ≤ proposed ≤ u64::MAX
            Credits::try_from(share).unwrap_or(award.proposed)
        } else {
            award.proposed
        };
        distributed += award.actual;
    }

    Ok(RoundPlan {
        available,
        total_proposed: Credits::try_from(total_proposed).unwrap_or(Credits::MAX),
        scaled,
        awards,
        distributed,
        new_hold: available - distributed,
    })
}
