//! Prometheus metrics for the queue ledger.
//!
//! All metrics follow the naming convention: `bq_ledger_<metric>_total`.
//! Counters exist from first use; [`register_metrics`] only makes them visible
//! to [`encode_metrics`].

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // QUEUE METRICS
    // =========================================================================

    /// Successful support transfers (peer and admin)
    pub static ref SUPPORTS: IntCounter = IntCounter::new(
        "bq_ledger_supports_total",
        "Total support transfers committed"
    ).expect("metric creation failed");

    /// Slots that reached the required amount
    pub static ref SLOTS_COMPLETED: IntCounter = IntCounter::new(
        "bq_ledger_slots_completed_total",
        "Total queue slots completed"
    ).expect("metric creation failed");

    /// Credits created by slot completion
    pub static ref CREDITS_MINTED: IntCounter = IntCounter::new(
        "bq_ledger_credits_minted_total",
        "Credits minted by slot completion"
    ).expect("metric creation failed");

    /// Accounts whose rank changed during rebalance
    pub static ref REBALANCE_MOVES: IntCounter = IntCounter::new(
        "bq_ledger_rebalance_moves_total",
        "Queue rank changes written by rebalance"
    ).expect("metric creation failed");

    /// Slot progress blobs reset or normalized on load
    pub static ref SLOT_REPAIRS: IntCounterVec = IntCounterVec::new(
        Opts::new("bq_ledger_slot_repairs_total", "Slot progress repairs by outcome"),
        &["outcome"]  // outcome: normalized/reset
    ).expect("metric creation failed");

    // =========================================================================
    // GIVEAWAY METRICS
    // =========================================================================

    /// Donation rounds run
    pub static ref DONATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("bq_ledger_donations_total", "Donation rounds by category"),
        &["category"]
    ).expect("metric creation failed");

    /// Credits paid to recipients by donation rounds and return rewards
    pub static ref CREDITS_DISTRIBUTED: IntCounterVec = IntCounterVec::new(
        Opts::new("bq_ledger_credits_distributed_total", "Credits paid out of giveaway pools"),
        &["category"]
    ).expect("metric creation failed");

    /// Give-back operations
    pub static ref GIVEBACKS: IntCounter = IntCounter::new(
        "bq_ledger_givebacks_total",
        "Total give-back operations committed"
    ).expect("metric creation failed");

    // =========================================================================
    // ERROR METRICS
    // =========================================================================

    /// Row lock acquisitions that hit the deadline
    pub static ref LOCK_TIMEOUTS: IntCounter = IntCounter::new(
        "bq_ledger_lock_timeouts_total",
        "Lock acquisitions that timed out"
    ).expect("metric creation failed");

    /// Failed operations by operation and error kind
    pub static ref LEDGER_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("bq_ledger_errors_total", "Failed ledger operations"),
        &["operation", "kind"]
    ).expect("metric creation failed");
}

/// Handle for the registered metrics
pub struct MetricsHandle {
    registry: Arc<Registry>,
}

impl MetricsHandle {
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; already registered collectors are skipped.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Queue
        Box::new(SUPPORTS.clone()),
        Box::new(SLOTS_COMPLETED.clone()),
        Box::new(CREDITS_MINTED.clone()),
        Box::new(REBALANCE_MOVES.clone()),
        Box::new(SLOT_REPAIRS.clone()),
        // Giveaway
        Box::new(DONATIONS.clone()),
        Box::new(CREDITS_DISTRIBUTED.clone()),
        Box::new(GIVEBACKS.clone()),
        // Errors
        Box::new(LOCK_TIMEOUTS.clone()),
        Box::new(LEDGER_ERRORS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
