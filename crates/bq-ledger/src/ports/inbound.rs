//! Inbound (Driving) port: the API the HTTP layer and other collaborators
//! call.

use shared_types::{AccountId, Category, Credits, Percentage};

use crate::domain::{
    AccountView, AuditReport, DonationReceipt, GiveBackReceipt, GiveawayPool, GiveawayPreview,
    InvariantReport, LeaderboardEntry, LedgerResult, OwedSummary, QueueSlotView, RepairReport,
    SupportReceipt, SupporterSummary,
};

/// Queue ledger and distribution engine API.
///
/// Mutating operations are transactional: each either commits every write or
/// none. Reads take no locks.
pub trait LedgerApi: Send + Sync {
    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Support `to`'s slot `target_slot` with `amount` credits from `from`.
    ///
    /// # Errors
    /// - `Validation`: non-positive amount, self-support, slot out of range
    /// - `QueueRuleViolation`: precedence rule broken
    /// - `InsufficientBalance`: sender cannot cover `amount`
    /// - `AccountNotFound`
    /// - `Concurrency`: lock timeout, retryable
    fn support(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Credits,
        target_slot: u32,
    ) -> LedgerResult<SupportReceipt>;

    /// Support issued by an administrator. Ignores precedence and never
    /// enrolls the administrator.
    fn admin_support(
        &self,
        admin: AccountId,
        to: AccountId,
        amount: Credits,
        target_slot: u32,
    ) -> LedgerResult<SupportReceipt>;

    /// Donate into a category pool and run a distribution round.
    ///
    /// `location` restricts recipients to profiles whose city or area matches.
    ///
    /// # Errors
    /// - `Validation`, `InsufficientBalance`, `AccountNotFound`
    /// - `NoActivePool`: category has no enabled pool
    /// - `NoEligibleRecipients`: nobody has unrewarded returns
    fn donate(
        &self,
        donor: AccountId,
        category: Category,
        amount: Credits,
        location: Option<&str>,
    ) -> LedgerResult<DonationReceipt>;

    /// Return up to `amount` received credits; collects immediate rewards
    /// from pools holding leftovers.
    ///
    /// # Errors
    /// - `Validation`, `InsufficientBalance`, `AccountNotFound`
    /// - `NothingOwed`: everything received was already returned
    fn give_back(&self, account: AccountId, amount: Credits) -> LedgerResult<GiveBackReceipt>;

    // =========================================================================
    // COLLABORATOR HOOKS
    // =========================================================================

    /// Create an empty account row. Returns `false` if it already existed.
    fn open_account(&self, id: AccountId) -> LedgerResult<bool>;

    /// Record credits minted outside the ledger (wallet deposits).
    fn credit_external(&self, id: AccountId, amount: Credits) -> LedgerResult<AccountView>;

    /// Create or reconfigure a category pool, keeping its balances.
    fn configure_pool(
        &self,
        category: Category,
        percentage_per_user: Percentage,
        active: bool,
    ) -> LedgerResult<GiveawayPool>;

    // =========================================================================
    // READ MODELS
    // =========================================================================

    /// Every open slot in rank order.
    fn queue_snapshot(&self, location: Option<&str>) -> LedgerResult<Vec<QueueSlotView>>;

    /// Slots `viewer` is allowed to support right now.
    fn supportable_slots(
        &self,
        viewer: AccountId,
        location: Option<&str>,
    ) -> LedgerResult<Vec<QueueSlotView>>;

    /// The account's own open slots.
    fn account_slots(&self, id: AccountId) -> LedgerResult<Vec<QueueSlotView>>;

    fn account_view(&self, id: AccountId) -> LedgerResult<AccountView>;

    fn amount_owed(&self, id: AccountId) -> LedgerResult<OwedSummary>;

    fn supporters_of(&self, id: AccountId) -> LedgerResult<Vec<SupporterSummary>>;

    fn supporter_leaderboard(&self, limit: usize) -> LedgerResult<Vec<LeaderboardEntry>>;

    fn donor_leaderboard(&self, limit: usize) -> LedgerResult<Vec<LeaderboardEntry>>;

    fn pool_status(&self, category: Category) -> LedgerResult<GiveawayPool>;

    /// Dry run of a donation round with the pool's current balances.
    fn giveaway_preview(
        &self,
        category: Category,
        location: Option<&str>,
    ) -> LedgerResult<GiveawayPreview>;

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    /// Rewrite one account's slot progress in canonical form.
    fn repair_slot_progress(&self, id: AccountId) -> LedgerResult<RepairReport>;

    /// Rewrite every non-canonical slot progress blob.
    fn repair_all_slot_progress(&self) -> LedgerResult<RepairReport>;

    /// Compare an account's cached counters with the log.
    fn audit_account(&self, id: AccountId) -> LedgerResult<AuditReport>;

    /// Sweep rank contiguity, progress bounds and counter consistency.
    fn check_invariants(&self) -> LedgerResult<InvariantReport>;
}
