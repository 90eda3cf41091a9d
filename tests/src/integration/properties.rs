//! # Property Tests
//!
//! Random operation sequences against a small ledger. After every step the
//! ledger must stay internally consistent, and a rejected operation must
//! leave no trace at all.

use bq_ledger::{LedgerApi, LedgerResult};
use shared_types::{Category, Credits};

use crate::fixtures::*;

/// One generated ledger operation.
#[derive(Debug, Clone)]
pub enum Op {
    Support {
        from: u64,
        to: u64,
        amount: Credits,
        slot: u32,
    },
    AdminSupport {
        to: u64,
        amount: Credits,
        slot: u32,
    },
    GiveBack {
        account: u64,
        amount: Credits,
    },
    Donate {
        donor: u64,
        category: Category,
        amount: Credits,
    },
    Credit {
        account: u64,
        amount: Credits,
    },
    Repair,
}

/// Accounts 1..=6: two queued at the start, the rest funded newcomers.
/// Account 6 doubles as the admin.
pub fn populated_ledger() -> TestLedger {
    let ledger = ledger();
    ledger.configure_pool(Category::Medical, 25, true).unwrap();
    ledger.configure_pool(Category::Grocery, 10, true).unwrap();
    queued(&ledger, 1, 1, vec![0, 0, 0]);
    queued(&ledger, 2, 4, vec![0, 0]);
    ledger.credit_external(id(1), 200).unwrap();
    ledger.credit_external(id(2), 200).unwrap();
    for n in 3..=6 {
        funded(&ledger, n, 1_000);
    }
    ledger
}

pub fn apply(ledger: &TestLedger, op: &Op) -> LedgerResult<()> {
    match *op {
        Op::Support {
            from,
            to,
            amount,
            slot,
        } => ledger.support(id(from), id(to), amount, slot).map(drop),
        Op::AdminSupport { to, amount, slot } => {
            ledger.admin_support(id(6), id(to), amount, slot).map(drop)
        }
        Op::GiveBack { account, amount } => ledger.give_back(id(account), amount).map(drop),
        Op::Donate {
            donor,
            category,
            amount,
        } => ledger.donate(id(donor), category, amount, None).map(drop),
        Op::Credit { account, amount } => ledger.credit_external(id(account), amount).map(drop),
        Op::Repair => ledger.repair_all_slot_progress().map(drop),
    }
}

/// Apply `op`; when it is rejected, check that nothing changed.
pub fn apply_checked(ledger: &TestLedger, op: &Op) -> bool {
    use bq_ledger::LedgerStore;

    let accounts = ledger.store().accounts().unwrap();
    let pools = ledger.store().pools().unwrap();
    let log_len = ledger.store().transactions().unwrap().len();

    match apply(ledger, op) {
        Ok(()) => true,
        Err(err) => {
            assert!(!err.is_retryable(), "single-threaded {op:?} hit {err}");
            assert_eq!(ledger.store().accounts().unwrap(), accounts, "{op:?} leaked writes");
            assert_eq!(ledger.store().pools().unwrap(), pools, "{op:?} leaked pool writes");
            assert_eq!(ledger.store().transactions().unwrap().len(), log_len);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use bq_ledger::domain::UNQUEUED;
    use bq_ledger::{AccountRecord, ErrorKind, LedgerStore};
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use serde_json::{json, Value};

    fn op() -> impl Strategy<Value = Op> {
        let category = prop_oneof![
            Just(Category::Medical),
            Just(Category::Grocery),
            Just(Category::Education),
        ];
        prop_oneof![
            5 => (1u64..=6, 1u64..=6, 1u64..=500, 1u32..=5).prop_map(|(from, to, amount, slot)| {
                Op::Support { from, to, amount, slot }
            }),
            1 => (1u64..=5, 1u64..=500, 1u32..=5)
                .prop_map(|(to, amount, slot)| Op::AdminSupport { to, amount, slot }),
            2 => (1u64..=6, 1u64..=300).prop_map(|(account, amount)| Op::GiveBack { account, amount }),
            2 => (3u64..=6, category, 1u64..=300).prop_map(|(donor, category, amount)| {
                Op::Donate { donor, category, amount }
            }),
            1 => (1u64..=6, 1u64..=400).prop_map(|(account, amount)| Op::Credit { account, amount }),
            1 => Just(Op::Repair),
        ]
    }

    fn stored_progress() -> impl Strategy<Value = Value> {
        prop_oneof![
            prop::collection::vec(0u64..600, 0..8).prop_map(|v| json!(v)),
            prop::collection::vec(prop::option::of(-50i64..600), 0..8).prop_map(|v| json!(v)),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-z]{0,6}".prop_map(|s| json!(s)),
            Just(Value::Null),
            prop::collection::btree_map("[1-9]", 0u64..900, 0..6)
                .prop_map(|m| json!(m)),
            prop::collection::vec(0u64..600, 0..6).prop_map(|v| json!(json!(v).to_string())),
            prop::collection::vec(0u64..600, 0..4).prop_map(|v| {
                let chars: Vec<String> = json!(v).to_string().chars().map(String::from).collect();
                json!(chars)
            }),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_random_sequences_keep_ledger_consistent(ops in prop::collection::vec(op(), 1..40)) {
            let ledger = populated_ledger();
            for op in &ops {
                apply_checked(&ledger, op);
            }
            assert_consistent(&ledger);
        }

        #[test]
        fn test_repair_is_idempotent(progress in stored_progress(), slot_count in 0u32..6) {
            let ledger = ledger();
            let mut record = AccountRecord::new(id(1));
            record.queue_rank = if slot_count > 0 { 1 } else { UNQUEUED };
            record.slot_count = slot_count;
            record.slot_progress = progress;
            ledger.store().seed_account(record);

            ledger.repair_slot_progress(id(1)).unwrap();
            let again = ledger.repair_slot_progress(id(1)).unwrap();
            prop_assert!(again.repaired.is_empty());
            prop_assert_eq!(again.examined, 1);

            let slots = ledger.account_slots(id(1)).unwrap();
            prop_assert_eq!(slots.len(), slot_count as usize);
            prop_assert!(ledger.check_invariants().unwrap().is_clean());
        }

        #[test]
        fn test_give_back_never_exceeds_owed(received in 0u64..2_000, asks in prop::collection::vec(1u64..700, 1..10)) {
            let ledger = ledger();
            queued(&ledger, 1, 1, vec![0; 6]);
            ledger.credit_external(id(1), 5_000).unwrap();
            funded(&ledger, 9, 2_000);
            if received > 0 {
                ledger.admin_support(id(9), id(1), received, 1).unwrap();
            }

            for ask in asks {
                let before = ledger.amount_owed(id(1)).unwrap();
                match ledger.give_back(id(1), ask) {
                    Ok(receipt) => {
                        prop_assert_eq!(receipt.amount_returned, ask.min(before.owed));
                        prop_assert_eq!(receipt.remaining_owed, before.owed - receipt.amount_returned);
                    }
                    Err(err) => {
                        prop_assert_eq!(err.kind(), ErrorKind::Precondition);
                        prop_assert_eq!(before.owed, 0);
                    }
                }
            }
            let owed = ledger.amount_owed(id(1)).unwrap();
            prop_assert_eq!(owed.received, received);
            prop_assert!(owed.returned <= owed.received);
            assert_consistent(&ledger);
        }
    }

    #[test]
    fn test_seeded_soak_run() {
        let mut rng = StdRng::seed_from_u64(0xB0BB1E);
        let ledger = populated_ledger();
        let mut accepted = 0;

        for step in 0..1_000 {
            let op = match rng.gen_range(0..10) {
                0..=4 => Op::Support {
                    from: rng.gen_range(1..=6),
                    to: rng.gen_range(1..=6),
                    amount: rng.gen_range(1..=450),
                    slot: rng.gen_range(1..=4),
                },
                5 => Op::AdminSupport {
                    to: rng.gen_range(1..=5),
                    amount: rng.gen_range(1..=400),
                    slot: 1,
                },
                6 | 7 => Op::GiveBack {
                    account: rng.gen_range(1..=6),
                    amount: rng.gen_range(1..=250),
                },
                8 => Op::Donate {
                    donor: rng.gen_range(3..=6),
                    category: Category::ALL[rng.gen_range(0..Category::ALL.len())],
                    amount: rng.gen_range(1..=200),
                },
                _ => Op::Credit {
                    account: rng.gen_range(1..=6),
                    amount: rng.gen_range(1..=300),
                },
            };
            if apply_checked(&ledger, &op) {
                accepted += 1;
            }
            if step % 100 == 99 {
                assert_consistent(&ledger);
            }
        }

        assert!(accepted > 100, "only {accepted} operations were accepted");
        assert_consistent(&ledger);
    }
}
