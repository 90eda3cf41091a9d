//! Giveaway pools: donations, distribution rounds and give-backs.

use std::collections::{BTreeMap, BTreeSet};

use bq_telemetry::{metric_add, metric_inc};
use shared_types::{AccountId, Category, Credits, Percentage, TransactionKind};
use tracing::{debug, info};

use super::{ensure_covered, require_positive, LedgerService};
use crate::domain::{
    aggregates,
    distribution::{self, MAX_PERCENTAGE},
    entities::checked_add,
    Claim, DonationReceipt, GiveBackReceipt, GiveawayPool, GiveawayPreview, LedgerError,
    LedgerResult, LogEntry, RewardState, ReturnReward,
};
use crate::ports::{AccountDirectory, LedgerStore, LockKey, StoreTxn, TimeSource};

impl<S, C, D> LedgerService<S, C, D>
where
    S: LedgerStore,
    C: TimeSource,
    D: AccountDirectory,
{
    // =========================================================================
    // DONATE
    // =========================================================================

    pub(super) fn execute_donate(
        &self,
        donor: AccountId,
        category: Category,
        amount: Credits,
        location: Option<&str>,
    ) -> LedgerResult<DonationReceipt> {
        require_positive(amount, "donation amount")?;

        let (mut receipt, transactions) = self.run_locked(
            "donate",
            || {
                let log = self.store.transactions()?;
                let mut keys: BTreeSet<LockKey> =
                    aggregates::returners(log.iter().map(|tx| &tx.entry))
                        .into_iter()
                        .map(LockKey::Account)
                        .collect();
                keys.insert(LockKey::Account(donor));
                keys.insert(LockKey::Pool(category));
                Ok(keys)
            },
            |txn| self.donate_in(txn, donor, category, amount, location),
        )?;
        receipt.transactions = transactions;

        metric_inc!(bq_telemetry::DONATIONS, &[category.as_str()]);
        metric_add!(
            bq_telemetry::CREDITS_DISTRIBUTED,
            &[category.as_str()],
            receipt.total_distributed
        );
        info!(
            %donor,
            %category,
            amount,
            recipients = receipt.recipients.len(),
            distributed = receipt.total_distributed,
            hold = receipt.new_hold_amount,
            scaled = receipt.scaled,
            "donation distributed"
        );
        Ok(receipt)
    }

    fn donate_in(
        &self,
        txn: &mut dyn StoreTxn,
        donor: AccountId,
        category: Category,
        amount: Credits,
        location: Option<&str>,
    ) -> LedgerResult<DonationReceipt> {
        let now = self.clock.now();
        let mut pool = txn
            .load_pool(category)?
            .filter(|pool| pool.is_active)
            .ok_or(LedgerError::NoActivePool { category })?;

        // giveBack locks every pool, so the returner set is frozen from here
        let returned = aggregates::returned_by_account(&txn.log_entries()?);
        ensure_covered(
            &*txn,
            "donate",
            returned.keys().map(|id| LockKey::Account(*id)),
        )?;

        let mut donor_account = self.load(&*txn, donor)?;
        donor_account.debit(amount)?;
        self.save(txn, &donor_account)?;

        pool.pending_amount = checked_add(pool.pending_amount, amount)?;
        pool.total_donated_lifetime = checked_add(pool.total_donated_lifetime, amount)?;
        txn.append(
            LogEntry::new(TransactionKind::Donation, amount, now)
                .from_account(donor)
                .in_category(category),
        )?;

        let claims = self.eligible_claims(&returned, category, Some(donor), location, |id| {
            Ok(txn.load_account(id)?.map(|record| {
                record.rewards.get(&category).copied().unwrap_or_default()
            }))
        })?;
        if claims.is_empty() {
            return Err(LedgerError::NoEligibleRecipients { category });
        }

        let plan = distribution::plan_round(
            pool.pending_amount,
            pool.hold_amount,
            pool.percentage_per_user,
            &claims,
        )?;
        debug!(
            %category,
            available = plan.available,
            proposed = plan.total_proposed,
            scaled = plan.scaled,
            claims = claims.len(),
            "distribution planned"
        );

        for award in plan.paid() {
            let mut account = self.load(&*txn, award.account)?;
            account.credit(award.actual)?;
            account
                .reward_state_mut(category)
                .record(award.new_giveback, award.actual)?;
            self.save(txn, &account)?;
            txn.append(
                LogEntry::new(TransactionKind::Transfer, award.actual, now)
                    .from_account(donor)
                    .to_account(award.account)
                    .in_category(category),
            )?;
        }

        pool.pending_amount = 0;
        pool.hold_amount = plan.new_hold;
        txn.put_pool(pool)?;

        Ok(DonationReceipt {
            transactions: Vec::new(),
            category,
            total_distributed: plan.distributed,
            recipients: plan.paid().copied().collect(),
            scaled: plan.scaled,
            new_hold_amount: plan.new_hold,
        })
    }

    /// Claims of every returner with returns not yet rewarded in `category`.
    ///
    /// `excluded` (the donor) and inactive profiles never qualify. With a
    /// location filter, accounts without a profile do not qualify either.
    pub(super) fn eligible_claims<R>(
        &self,
        returned: &BTreeMap<AccountId, Credits>,
        category: Category,
        excluded: Option<AccountId>,
        location: Option<&str>,
        mut reward_state: R,
    ) -> LedgerResult<Vec<Claim>>
    where
        R: FnMut(AccountId) -> LedgerResult<Option<RewardState>>,
    {
        let mut claims = Vec::new();
        for (&account, &lifetime_returned) in returned {
            if Some(account) == excluded || !self.in_location(account, location) {
                continue;
            }
            let Some(state) = reward_state(account)? else {
                continue;
            };
            if lifetime_returned > state.last_rewarded_giveback {
                claims.push(Claim {
                    account,
                    new_giveback: lifetime_returned - state.last_rewarded_giveback,
                });
            }
        }
        debug!(%category, returners = returned.len(), claims = claims.len(), "claims collected");
        Ok(claims)
    }

    /// Active and, when filtered, located in `location`.
    pub(super) fn in_location(&self, account: AccountId, location: Option<&str>) -> bool {
        match self.directory.profile(account) {
            Some(profile) => profile.active && profile.matches_location(location),
            None => matches!(location, None | Some("All")),
        }
    }

    // =========================================================================
    // GIVE BACK
    // =========================================================================

    pub(super) fn execute_give_back(
        &self,
        account: AccountId,
        amount: Credits,
    ) -> LedgerResult<GiveBackReceipt> {
        require_positive(amount, "give-back amount")?;

        let (mut receipt, transactions) = self.run_locked(
            "give_back",
            || {
                let mut keys: BTreeSet<LockKey> =
                    Category::ALL.iter().map(|c| LockKey::Pool(*c)).collect();
                keys.insert(LockKey::Account(account));
                Ok(keys)
            },
            |txn| self.give_back_in(txn, account, amount),
        )?;
        receipt.transactions = transactions;

        metric_inc!(bq_telemetry::GIVEBACKS);
        info!(
            %account,
            returned = receipt.amount_returned,
            remaining_owed = receipt.remaining_owed,
            rewards = receipt.rewards_breakdown.len(),
            "give-back recorded"
        );
        Ok(receipt)
    }

    fn give_back_in(
        &self,
        txn: &mut dyn StoreTxn,
        id: AccountId,
        amount: Credits,
    ) -> LedgerResult<GiveBackReceipt> {
        let now = self.clock.now();
        let mut account = self.load(&*txn, id)?;

        // owed comes from the log, not the cached counters
        let owed = aggregates::account_totals(&txn.log_entries()?, id).owed();
        if owed == 0 {
            return Err(LedgerError::NothingOwed { account: id });
        }
        let returned = amount.min(owed);
        account.debit(returned)?;
        account.lifetime_returned = checked_add(account.lifetime_returned, returned)?;
        txn.append(LogEntry::new(TransactionKind::Return, returned, now).from_account(id))?;

        let mut rewards_breakdown = Vec::new();
        for category in Category::ALL {
            let Some(mut pool) = txn.load_pool(category)? else {
                continue;
            };
            if !pool.is_active || pool.hold_amount == 0 {
                continue;
            }
            let reward =
                distribution::immediate_reward(returned, pool.percentage_per_user, pool.hold_amount)?;
            if reward == 0 {
                continue;
            }

            pool.hold_amount -= reward;
            account.credit(reward)?;
            account.reward_state_mut(category).record(returned, reward)?;
            txn.append(
                LogEntry::new(TransactionKind::Reward, reward, now)
                    .to_account(id)
                    .in_category(category),
            )?;
            debug!(account = %id, %category, reward, hold = pool.hold_amount, "return rewarded");
            rewards_breakdown.push(ReturnReward {
                category,
                reward,
                pool_hold_after: pool.hold_amount,
            });
            txn.put_pool(pool)?;
        }

        self.save(txn, &account)?;
        Ok(GiveBackReceipt {
            transactions: Vec::new(),
            amount_returned: returned,
            remaining_owed: owed - returned,
            rewards_breakdown,
            new_balance: account.balance,
        })
    }

    // =========================================================================
    // POOLS
    // =========================================================================

    pub(super) fn execute_configure_pool(
        &self,
        category: Category,
        percentage_per_user: Percentage,
        active: bool,
    ) -> LedgerResult<GiveawayPool> {
        if percentage_per_user > MAX_PERCENTAGE {
            return Err(LedgerError::validation(format!(
                "percentage_per_user {percentage_per_user} exceeds {MAX_PERCENTAGE}"
            )));
        }

        let (pool, _) = self.run_locked(
            "configure_pool",
            || Ok(BTreeSet::from([LockKey::Pool(category)])),
            |txn| {
                let mut pool = txn
                    .load_pool(category)?
                    .unwrap_or_else(|| GiveawayPool::new(category, percentage_per_user));
                pool.percentage_per_user = percentage_per_user;
                pool.is_active = active;
                txn.put_pool(pool.clone())?;
                Ok(pool)
            },
        )?;
        bq_telemetry::log_event!(
            info,
            "giveaway",
            "giveaway pool configured",
            %category,
            percentage_per_user,
            active
        );
        Ok(pool)
    }

    pub(super) fn read_giveaway_preview(
        &self,
        category: Category,
        location: Option<&str>,
    ) -> LedgerResult<GiveawayPreview> {
        let pool = self
            .store
            .pool(category)?
            .filter(|pool| pool.is_active)
            .ok_or(LedgerError::NoActivePool { category })?;
        let log = self.store.transactions()?;
        let returned = aggregates::returned_by_account(log.iter().map(|tx| &tx.entry));

        let claims = self.eligible_claims(&returned, category, None, location, |id| {
            Ok(self
                .store
                .account(id)?
                .map(|record| record.rewards.get(&category).copied().unwrap_or_default()))
        })?;
        let plan = distribution::plan_round(
            pool.pending_amount,
            pool.hold_amount,
            pool.percentage_per_user,
            &claims,
        )?;

        Ok(GiveawayPreview {
            eligible_accounts: claims.len(),
            total_proposed: plan.total_proposed,
            would_distribute: plan.distributed,
            would_hold: plan.new_hold,
            pool,
        })
    }
}
