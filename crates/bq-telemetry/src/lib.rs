//! # Bubble Queue Telemetry
//!
//! Observability for the queue ledger.
//!
//! ## Components
//!
//! - **Logs**: `tracing` events rendered by `tracing-subscriber`, pretty for
//!   development or JSON for log shippers.
//! - **Metrics**: Prometheus counters for ledger events, exposed through
//!   [`encode_metrics`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bq_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(&config)?;
//!     // Ledger operations now emit logs and metrics
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BQ_SERVICE_NAME` | `bubble-queue` | Service name attached to logs |
//! | `BQ_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `BQ_JSON_LOGS` | `false` | Emit JSON log lines |
//! | `BQ_CONSOLE_OUTPUT` | `true` | Write logs to stdout at all |

mod config;
mod logging;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, CREDITS_DISTRIBUTED, CREDITS_MINTED,
    DONATIONS, GIVEBACKS, LEDGER_ERRORS, LOCK_TIMEOUTS, REBALANCE_MOVES, SLOTS_COMPLETED,
    SLOT_REPAIRS, SUPPORTS,
};
pub use tracing_setup::TracingGuard;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and metrics.
///
/// Returns a guard that should be held for the lifetime of the process.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    config.validate()?;

    // Metrics first so early log lines can reference registered counters
    let metrics_handle = register_metrics()?;
    let tracing_guard = tracing_setup::init_tracing(config)?;

    Ok(TelemetryGuard {
        _tracing: tracing_guard,
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry");
    }
}

/// Span for a ledger operation with its structured context.
///
/// ```rust,ignore
/// let _span = bq_telemetry::ledger_span!("support", from = 3, to = 1).entered();
/// ```
#[macro_export]
macro_rules! ledger_span {
    ($name:expr) => {
        tracing::info_span!($name)
    };
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}

/// Increment a counter, optionally with label values.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

/// Add a value to a counter, optionally with label values.
#[macro_export]
macro_rules! metric_add {
    ($metric:expr, $value:expr) => {
        $metric.inc_by($value)
    };
    ($metric:expr, $labels:expr, $value:expr) => {
        $metric.with_label_values($labels).inc_by($value)
    };
}
