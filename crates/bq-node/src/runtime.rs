//! # Node Runtime
//!
//! Wires the ledger service to the in-memory adapters, seeds scenario state
//! and replays scenario steps on blocking worker threads.

use std::sync::Arc;

use anyhow::{Context, Result};
use bq_ledger::{
    InMemoryLedger, InvariantReport, LedgerApi, LedgerError, LedgerResult, LedgerStore,
    QueueSlotView,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::scenario::{Scenario, Step};

/// Result of one replayed step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub op: &'static str,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Ok { result: Value },
    Rejected {
        kind: &'static str,
        retryable: bool,
        message: String,
    },
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok { .. })
    }

    fn from_result<T: Serialize>(result: LedgerResult<T>) -> Self {
        match result {
            Ok(value) => Outcome::Ok {
                result: serde_json::to_value(value)
                    .unwrap_or_else(|err| Value::String(err.to_string())),
            },
            Err(err) => Outcome::rejected(&err),
        }
    }

    fn rejected(err: &LedgerError) -> Self {
        Outcome::Rejected {
            kind: err.kind().as_str(),
            retryable: err.is_retryable(),
            message: err.to_string(),
        }
    }
}

/// Everything printed after a replay.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub steps: Vec<StepReport>,
    pub queue: Vec<QueueSlotView>,
    pub invariants: InvariantReport,
}

/// The main node runtime.
pub struct NodeRuntime {
    ledger: Arc<InMemoryLedger>,
}

impl NodeRuntime {
    pub fn new(config: &NodeConfig) -> Result<Self> {
        let ledger =
            InMemoryLedger::in_memory(config.ledger.clone()).context("failed to build ledger")?;
        Ok(Self {
            ledger: Arc::new(ledger),
        })
    }

    pub fn ledger(&self) -> &Arc<InMemoryLedger> {
        &self.ledger
    }

    /// Open the scenario's accounts and pools.
    pub fn seed(&self, scenario: &Scenario) -> Result<()> {
        for seed in &scenario.accounts {
            self.ledger
                .open_account(seed.id)
                .with_context(|| format!("failed to open account {}", seed.id))?;
            self.ledger.directory().upsert(seed.profile());
            if seed.balance > 0 {
                self.ledger
                    .credit_external(seed.id, seed.balance)
                    .with_context(|| format!("failed to fund account {}", seed.id))?;
            }

            if let Some(queue) = &seed.queue {
                let mut record = self
                    .ledger
                    .store()
                    .account(seed.id)?
                    .with_context(|| format!("account {} vanished while seeding", seed.id))?;
                record.queue_rank = queue.rank;
                record.slot_count = u32::try_from(queue.progress.len())
                    .with_context(|| format!("too many slots for account {}", seed.id))?;
                record.slot_progress = serde_json::to_value(&queue.progress)?;
                self.ledger.store().seed_account(record);
            }
        }

        for pool in &scenario.pools {
            self.ledger
                .configure_pool(pool.category, pool.percentage, pool.active)
                .with_context(|| format!("failed to configure {} pool", pool.category))?;
        }

        info!(
            accounts = scenario.accounts.len(),
            pools = scenario.pools.len(),
            "scenario seeded"
        );
        Ok(())
    }

    /// Replay steps in order; `parallel` groups fan out to worker threads.
    pub async fn replay(&self, steps: &[Step]) -> Result<Vec<StepReport>> {
        let mut reports = Vec::with_capacity(steps.len());
        for step in steps {
            match step {
                Step::Parallel { steps: group } => {
                    let handles: Vec<_> = group
                        .iter()
                        .cloned()
                        .map(|child| {
                            let ledger = Arc::clone(&self.ledger);
                            tokio::task::spawn_blocking(move || apply(ledger.as_ref(), &child))
                        })
                        .collect();
                    debug!(workers = handles.len(), "parallel group started");
                    for handle in handles {
                        reports.push(handle.await.context("worker thread panicked")?);
                    }
                }
                step => {
                    let ledger = Arc::clone(&self.ledger);
                    let step = step.clone();
                    let report = tokio::task::spawn_blocking(move || apply(ledger.as_ref(), &step))
                        .await
                        .context("worker thread panicked")?;
                    reports.push(report);
                }
            }
        }

        let rejected = reports.iter().filter(|r| !r.outcome.is_ok()).count();
        if rejected > 0 {
            warn!(steps = reports.len(), rejected, "replay finished with rejections");
        } else {
            info!(steps = reports.len(), "replay finished");
        }
        Ok(reports)
    }

    pub fn summarize(&self, steps: Vec<StepReport>) -> Result<RunSummary> {
        Ok(RunSummary {
            steps,
            queue: self.ledger.queue_snapshot(None)?,
            invariants: self.ledger.check_invariants()?,
        })
    }
}

/// Run one step against the ledger. Nested parallel groups run in order.
pub fn apply<L: LedgerApi + ?Sized>(ledger: &L, step: &Step) -> StepReport {
    let outcome = match step {
        Step::Support {
            from,
            to,
            amount,
            slot,
        } => Outcome::from_result(ledger.support(*from, *to, *amount, *slot)),
        Step::AdminSupport {
            admin,
            to,
            amount,
            slot,
        } => Outcome::from_result(ledger.admin_support(*admin, *to, *amount, *slot)),
        Step::Donate {
            donor,
            category,
            amount,
            location,
        } => Outcome::from_result(ledger.donate(*donor, *category, *amount, location.as_deref())),
        Step::GiveBack { account, amount } => {
            Outcome::from_result(ledger.give_back(*account, *amount))
        }
        Step::Credit { account, amount } => {
            Outcome::from_result(ledger.credit_external(*account, *amount))
        }
        Step::ConfigurePool {
            category,
            percentage,
            active,
        } => Outcome::from_result(ledger.configure_pool(*category, *percentage, *active)),
        Step::Queue { location } => {
            Outcome::from_result(ledger.queue_snapshot(location.as_deref()))
        }
        Step::Preview { category, location } => {
            Outcome::from_result(ledger.giveaway_preview(*category, location.as_deref()))
        }
        Step::Owed { account } => Outcome::from_result(ledger.amount_owed(*account)),
        Step::Leaderboard { limit } => Outcome::from_result(ledger.supporter_leaderboard(*limit)),
        Step::Repair => Outcome::from_result(ledger.repair_all_slot_progress()),
        Step::CheckInvariants => Outcome::from_result(ledger.check_invariants()),
        Step::Parallel { steps } => {
            let children: Vec<StepReport> = steps.iter().map(|s| apply(ledger, s)).collect();
            Outcome::from_result(Ok(children))
        }
    };
    StepReport {
        op: step.name(),
        outcome,
    }
}
