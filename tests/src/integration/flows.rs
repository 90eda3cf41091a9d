//! # End-to-End Flows
//!
//! Whole lifecycles through the public `LedgerApi`:
//!
//! 1. **Queue**: bootstrap account, newcomers completing slots, enrollment
//!    behind the queue, precedence-filtered listings
//! 2. **Giveaway**: give-back, donation round, hold reward on a later return
//! 3. **Node**: the shipped demo scenario replayed through the runtime

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use bq_ledger::{Enrollment, ErrorKind, LedgerApi};
    use shared_types::{Category, TransactionKind};

    use crate::fixtures::*;

    // =============================================================================
    // QUEUE LIFECYCLE
    // =============================================================================

    #[test]
    fn test_queue_lifecycle_from_bootstrap() {
        let ledger = ledger();
        queued(&ledger, 1, 1, vec![0, 0]); // A
        funded(&ledger, 2, 500); // B
        funded(&ledger, 3, 500); // C
        funded(&ledger, 4, 500); // D

        // B completes A's first slot and queues behind A's remaining one
        let receipt = ledger.support(id(2), id(1), 400, 1).unwrap();
        assert!(receipt.slot_completed);
        assert_eq!(receipt.placement, Enrollment::Joined { rank: 2, slots: 4 });
        assert_eq!(receipt.recipient.slot_count, 1);

        // C completes A's last slot; A leaves and B moves to the front
        let receipt = ledger.support(id(3), id(1), 400, 1).unwrap();
        assert!(receipt.slot_completed);
        assert_eq!(receipt.placement, Enrollment::Joined { rank: 5, slots: 4 });
        assert_eq!(ledger.account_view(id(1)).unwrap().account.balance, 800);

        // D only partially fills B's front slot
        let receipt = ledger.support(id(4), id(2), 250, 1).unwrap();
        assert!(!receipt.slot_completed);
        assert_eq!(receipt.placement, Enrollment::Joined { rank: 9, slots: 2 });

        let queue = ledger.queue_snapshot(None).unwrap();
        let ranks: Vec<u64> = queue.iter().map(|v| v.rank).collect();
        assert_eq!(ranks, (1..=10).collect::<Vec<_>>());
        assert_eq!(queue[0].account, id(2));
        assert_eq!(queue[0].progress, 250);
        assert_eq!(queue[4].account, id(3));
        assert_eq!(queue[8].account, id(4));

        // C may only support accounts ranked ahead of it
        let visible = ledger.supportable_slots(id(3), None).unwrap();
        assert_eq!(visible.len(), 4);
        assert!(visible.iter().all(|v| v.account == id(2)));

        let supporters = ledger.supporters_of(id(2)).unwrap();
        assert_eq!(supporters.len(), 1);
        assert_eq!(supporters[0].supporter, id(4));
        assert_eq!(supporters[0].total, 250);
        assert_eq!(supporters[0].slots, vec![1]);

        let board = ledger.supporter_leaderboard(10).unwrap();
        assert_eq!(board.len(), 3);
        assert_eq!(board[0].total, 400);
        assert_eq!(board[1].total, 400);
        assert_eq!(board[2].account, id(4));
        assert_eq!(board[2].slots_opened, 2);

        let owed = ledger.amount_owed(id(1)).unwrap();
        assert_eq!((owed.received, owed.returned, owed.owed), (800, 0, 800));

        assert_consistent(&ledger);
    }

    #[test]
    fn test_precedence_blocks_supporting_backwards() {
        let ledger = ledger();
        queued(&ledger, 1, 1, vec![0]);
        queued(&ledger, 2, 2, vec![0]);
        funded(&ledger, 3, 100);

        // newcomers only reach the front
        let err = ledger.support(id(3), id(2), 50, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueueRule);

        // nobody supports their own rank or anything behind it
        ledger.credit_external(id(1), 100).unwrap();
        let err = ledger.support(id(1), id(2), 50, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueueRule);

        assert!(log(&ledger)
            .iter()
            .all(|entry| entry.kind == TransactionKind::Transfer));
        assert_consistent(&ledger);
    }

    #[test]
    fn test_queued_supporter_extends_own_slots() {
        let ledger = ledger();
        queued(&ledger, 1, 1, vec![0]);
        queued(&ledger, 2, 2, vec![0, 0]);
        queued(&ledger, 3, 4, vec![0]);
        ledger.credit_external(id(2), 300).unwrap();

        let receipt = ledger.support(id(2), id(1), 300, 1).unwrap();
        assert_eq!(
            receipt.placement,
            Enrollment::Extended {
                rank: 2,
                added: 3,
                slot_count: 5
            }
        );

        // account 3 was pushed behind the extended block
        let slots = ledger.account_slots(id(3)).unwrap();
        assert_eq!(slots[0].rank, 7);
        assert_consistent(&ledger);
    }

    // =============================================================================
    // GIVEAWAY LIFECYCLE
    // =============================================================================

    #[test]
    fn test_giveback_round_and_hold_reward() {
        let ledger = ledger();
        ledger.configure_pool(Category::Medical, 25, true).unwrap();
        queued(&ledger, 1, 1, vec![0]); // X
        funded(&ledger, 2, 400); // Y
        funded(&ledger, 9, 1_000); // donor
        profile(&ledger, 1, "X", "Lahore", "Gulberg");

        ledger.support(id(2), id(1), 400, 1).unwrap();
        assert_eq!(ledger.amount_owed(id(1)).unwrap().owed, 400);

        // no hold yet, so no reward
        let receipt = ledger.give_back(id(1), 200).unwrap();
        assert_eq!(receipt.remaining_owed, 200);
        assert!(receipt.rewards_breakdown.is_empty());

        // nothing donated yet, so the dry run pays nobody
        let preview = ledger.giveaway_preview(Category::Medical, None).unwrap();
        assert_eq!(preview.eligible_accounts, 1);
        assert_eq!(preview.would_distribute, 0);

        let donation = ledger.donate(id(9), Category::Medical, 100, None).unwrap();
        assert_eq!(donation.total_distributed, 50);
        assert_eq!(donation.new_hold_amount, 50);

        // the next return is rewarded from the hold straight away
        let receipt = ledger.give_back(id(1), 200).unwrap();
        assert_eq!(receipt.remaining_owed, 0);
        assert_eq!(receipt.rewards_breakdown.len(), 1);
        assert_eq!(receipt.rewards_breakdown[0].reward, 50);
        assert_eq!(receipt.new_balance, 100);

        let err = ledger.give_back(id(1), 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);

        // everything already returned has been rewarded
        let err = ledger.donate(id(9), Category::Medical, 100, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert_eq!(ledger.account_view(id(9)).unwrap().account.balance, 900);

        let view = ledger.account_view(id(1)).unwrap();
        assert_eq!(view.rewards[&Category::Medical].total_rewards_received, 100);

        let donors = ledger.donor_leaderboard(5).unwrap();
        assert_eq!(donors[0].account, id(9));
        assert_eq!(donors[0].total, 100);

        let pool = ledger.pool_status(Category::Medical).unwrap();
        assert_eq!(pool.hold_amount, 0);
        assert_eq!(pool.total_donated_lifetime, 100);

        assert_consistent(&ledger);
    }

    #[test]
    fn test_round_pays_every_claimant_proportionally_when_short() {
        let ledger = ledger();
        ledger.configure_pool(Category::Grocery, 50, true).unwrap();
        funded(&ledger, 9, 1_000);
        let mut returners = BTreeSet::new();
        for n in 1..=3 {
            queued(&ledger, n, n, vec![0]);
            returners.insert(id(n));
        }
        // each returner first gets a slot completed so it has credits to return
        for n in 1..=3 {
            funded(&ledger, 10 + n, 400);
            ledger.admin_support(id(10 + n), id(n), 400, 1).unwrap();
        }
        for (n, returned) in [(1, 200), (2, 100), (3, 100)] {
            ledger.give_back(id(n), returned).unwrap();
        }

        // claims are 100 + 50 + 50 against a 100 credit pool
        let receipt = ledger.donate(id(9), Category::Grocery, 100, None).unwrap();
        assert!(receipt.scaled);
        let paid: Vec<_> = receipt
            .recipients
            .iter()
            .map(|award| (award.account, award.actual))
            .collect();
        assert_eq!(paid, vec![(id(1), 50), (id(2), 25), (id(3), 25)]);
        assert_eq!(receipt.new_hold_amount, 0);
        assert!(receipt
            .recipients
            .iter()
            .all(|award| returners.contains(&award.account)));

        assert_consistent(&ledger);
    }

    // =============================================================================
    // NODE RUNTIME
    // =============================================================================

    #[tokio::test]
    async fn test_demo_scenario_replays_cleanly() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../crates/bq-node/scenarios/demo.json");
        let scenario = bq_node::Scenario::from_file(std::path::Path::new(path)).unwrap();
        let runtime = bq_node::NodeRuntime::new(&bq_node::NodeConfig::default()).unwrap();
        runtime.seed(&scenario).unwrap();

        let reports = runtime.replay(&scenario.steps).await.unwrap();
        assert_eq!(reports.len(), 11);
        for report in &reports {
            if matches!(report.op, "support" | "give_back" | "donate") {
                assert!(report.outcome.is_ok(), "{} rejected: {:?}", report.op, report.outcome);
            }
        }

        let summary = runtime.summarize(reports).unwrap();
        assert!(summary.invariants.is_clean());
        assert!(!summary.queue.is_empty());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["steps"][0]["status"], "ok");
        assert_eq!(json["steps"][0]["op"], "support");
    }
}
