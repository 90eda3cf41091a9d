//! # Contention
//!
//! Many OS threads hitting one shared ledger. Every operation takes row
//! locks for the rows it touches, so the final state must equal some serial
//! order of the same operations.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use bq_ledger::{Enrollment, ErrorKind, LedgerApi, LedgerStore};
    use shared_types::Category;

    use crate::fixtures::*;

    #[test]
    fn test_concurrent_newcomers_all_land_in_queue() {
        const NEWCOMERS: u64 = 16;

        let ledger = ledger();
        queued(&ledger, 1, 1, vec![0; 8]);
        for n in 0..NEWCOMERS {
            funded(&ledger, 100 + n, 100);
        }

        let barrier = Barrier::new(NEWCOMERS as usize);
        let receipts: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..NEWCOMERS)
                .map(|n| {
                    let ledger = &ledger;
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        ledger.support(id(100 + n), id(1), 100, 1)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut completed = 0;
        for receipt in receipts {
            let receipt = receipt.expect("every newcomer may support the front");
            assert!(
                matches!(receipt.placement, Enrollment::Joined { slots: 1, .. }),
                "unexpected placement {:?}",
                receipt.placement
            );
            completed += usize::from(receipt.slot_completed);
        }
        assert_eq!(completed, 4);

        // four completed slots out of eight
        let front = ledger.account_view(id(1)).unwrap().account;
        assert_eq!(front.balance, 1_600);
        assert_eq!(front.slot_count, 4);

        let newcomer_ranks: Vec<u64> = ledger
            .store()
            .queued_accounts()
            .unwrap()
            .iter()
            .filter(|r| r.id != id(1))
            .map(|r| r.queue_rank)
            .collect();
        assert_eq!(newcomer_ranks, (5..=20).collect::<Vec<_>>());

        assert_consistent(&ledger);
    }

    #[test]
    fn test_mixed_operations_keep_ledger_consistent() {
        let ledger = Arc::new(ledger());
        ledger.configure_pool(Category::Medical, 20, true).unwrap();
        ledger.configure_pool(Category::Education, 40, true).unwrap();
        queued(&ledger, 1, 1, vec![0; 6]);
        for n in 2..=9 {
            funded(&ledger, n, 800);
        }
        funded(&ledger, 50, 5_000);
        funded(&ledger, 51, 5_000);

        // give the front account something to return
        ledger.support(id(2), id(1), 400, 1).unwrap();
        ledger.support(id(3), id(1), 400, 1).unwrap();

        let barrier = Arc::new(Barrier::new(6));
        let mut handles = Vec::new();

        for n in 4..=7 {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                (0..4)
                    .map(|_| ledger.support(id(n), id(1), 150, 1).map(|_| ()))
                    .collect::<Vec<_>>()
            }));
        }
        {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                (0..8)
                    .map(|_| ledger.give_back(id(1), 60).map(|_| ()))
                    .collect::<Vec<_>>()
            }));
        }
        {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                let mut results = Vec::new();
                for round in 0..6 {
                    let (donor, category) = if round % 2 == 0 {
                        (50, Category::Medical)
                    } else {
                        (51, Category::Education)
                    };
                    results.push(ledger.donate(id(donor), category, 120, None).map(|_| ()));
                }
                results
            }));
        }

        for handle in handles {
            for result in handle.join().unwrap() {
                if let Err(err) = result {
                    assert!(
                        matches!(
                            err.kind(),
                            ErrorKind::Precondition
                                | ErrorKind::InsufficientBalance
                                | ErrorKind::QueueRule
                                | ErrorKind::Validation
                                | ErrorKind::Concurrency
                        ),
                        "unexpected failure under contention: {err}"
                    );
                }
            }
        }

        assert_consistent(&ledger);

        // every returned credit has been tallied exactly once
        let owed = ledger.amount_owed(id(1)).unwrap();
        assert_eq!(owed.received - owed.returned, owed.owed);
        assert_eq!(owed.returned % 60, 0);
    }
}
