//! Support processing: peer support and administrative support.

use std::collections::BTreeSet;

use bq_telemetry::{metric_add, metric_inc};
use shared_types::{AccountId, Credits, TransactionKind};
use tracing::{debug, info};

use super::{ensure_covered, require_positive, LedgerService};
use crate::domain::{
    entities::checked_add, precedence, queue, AccountSnapshot, Enrollment, LedgerError,
    LedgerResult, LogEntry, QueueEntry, SlotCompletion, SupportReceipt,
};
use crate::ports::{AccountDirectory, LedgerStore, LockKey, StoreTxn, TimeSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SupportMode {
    /// Precedence enforced, sender enrolled.
    Peer,
    /// Precedence bypassed, sender never enrolled.
    Admin,
}

impl SupportMode {
    fn kind(self) -> TransactionKind {
        match self {
            SupportMode::Peer => TransactionKind::Support,
            SupportMode::Admin => TransactionKind::AdminSupport,
        }
    }

    fn operation(self) -> &'static str {
        match self {
            SupportMode::Peer => "support",
            SupportMode::Admin => "admin_support",
        }
    }
}

impl<S, C, D> LedgerService<S, C, D>
where
    S: LedgerStore,
    C: TimeSource,
    D: AccountDirectory,
{
    pub(super) fn execute_support(
        &self,
        mode: SupportMode,
        from: AccountId,
        to: AccountId,
        amount: Credits,
        target_slot: u32,
    ) -> LedgerResult<SupportReceipt> {
        let operation = mode.operation();
        require_positive(amount, "support amount")?;
        if from == to {
            return Err(LedgerError::validation("an account cannot support itself"));
        }
        if target_slot == 0 {
            return Err(LedgerError::validation("slot numbers start at 1"));
        }

        let (mut receipt, transactions) = self.run_locked(
            operation,
            || {
                // completion may rebalance any queued account
                let mut keys: BTreeSet<LockKey> = self
                    .store
                    .queued_accounts()?
                    .iter()
                    .map(|record| LockKey::Account(record.id))
                    .collect();
                keys.insert(LockKey::Account(from));
                keys.insert(LockKey::Account(to));
                Ok(keys)
            },
            |txn| self.support_in(txn, mode, from, to, amount, target_slot),
        )?;
        receipt.transactions = transactions;

        metric_inc!(bq_telemetry::SUPPORTS);
        if receipt.slot_completed {
            metric_inc!(bq_telemetry::SLOTS_COMPLETED);
            metric_add!(bq_telemetry::CREDITS_MINTED, receipt.minted_amount);
        }
        info!(
            operation,
            %from,
            %to,
            amount,
            target_slot,
            slot_completed = receipt.slot_completed,
            rank_changes = receipt.rank_changes,
            "support applied"
        );
        Ok(receipt)
    }

    fn support_in(
        &self,
        txn: &mut dyn StoreTxn,
        mode: SupportMode,
        from: AccountId,
        to: AccountId,
        amount: Credits,
        target_slot: u32,
    ) -> LedgerResult<SupportReceipt> {
        let operation = mode.operation();
        let required = self.config.required_per_slot;

        let queued = txn.queued_accounts()?;
        ensure_covered(
            &*txn,
            operation,
            queued.iter().map(|record| LockKey::Account(record.id)),
        )?;

        let mut sender = self.load(&*txn, from)?;
        let mut recipient = self.load(&*txn, to)?;

        // peer support to an unqueued recipient breaks precedence, whatever the slot
        if mode == SupportMode::Peer && !recipient.is_queued() {
            precedence::check_precedence(sender.queue_rank, recipient.queue_rank)?;
        }
        if target_slot > recipient.slot_count() {
            return Err(LedgerError::validation(format!(
                "slot {target_slot} is out of range: account {to} has {} open slots",
                recipient.slot_count()
            )));
        }
        if mode == SupportMode::Peer {
            precedence::check_precedence(sender.queue_rank, recipient.queue_rank)?;
        }
        sender.debit(amount)?;

        // ==== recipient side ====
        recipient.lifetime_received = checked_add(recipient.lifetime_received, amount)?;
        let progress = recipient.progress.add(target_slot, amount).ok_or_else(|| {
            LedgerError::Internal(format!("slot {target_slot} vanished on account {to}"))
        })?;

        let mut completion: Option<SlotCompletion> = None;
        if progress >= required {
            let done = queue::complete_slot(&mut recipient, target_slot, required)?;
            debug!(
                account = %to,
                slot = target_slot,
                minted = done.minted,
                overshoot = done.overshoot,
                left_queue = done.left_queue,
                "slot completed"
            );
            completion = Some(done);
        }

        self.save(txn, &sender)?;
        self.save(txn, &recipient)?;

        let mut rank_changes = 0;
        if completion.is_some() {
            rank_changes += self.rebalance_queue(txn)?.len();
        }

        // ==== sender enrollment ====
        let mut placement = Enrollment::Unchanged;
        let mut slots_opened = 0;
        if mode == SupportMode::Peer {
            slots_opened = u32::try_from(amount / self.config.credits_per_sender_slot)
                .map_err(|_| LedgerError::validation("support amount opens too many slots"))?;
        }
        if slots_opened > 0 {
            // ranks may have moved in the rebalance above
            let mut sender = self.load(&*txn, from)?;
            let others: Vec<QueueEntry> = txn
                .queued_accounts()?
                .iter()
                .filter(|record| record.id != from)
                .map(QueueEntry::from)
                .collect();
            placement = queue::enroll(&mut sender, slots_opened, queue::max_occupied_rank(&others));
            self.save(txn, &sender)?;
            if matches!(placement, Enrollment::Extended { .. }) {
                rank_changes += self.rebalance_queue(txn)?.len();
            }
            debug!(account = %from, ?placement, "sender enrolled");
        }

        txn.append(
            LogEntry::new(mode.kind(), amount, self.clock.now())
                .from_account(from)
                .to_account(to)
                .against_slot(target_slot, slots_opened, completion.is_some()),
        )?;

        let sender = self.load(&*txn, from)?;
        let recipient = self.load(&*txn, to)?;
        Ok(SupportReceipt {
            transactions: Vec::new(),
            slot_completed: completion.is_some(),
            minted_amount: completion.map_or(0, |done| done.minted),
            sender: AccountSnapshot::from(&sender),
            recipient: AccountSnapshot::from(&recipient),
            placement,
            rank_changes,
        })
    }
}
