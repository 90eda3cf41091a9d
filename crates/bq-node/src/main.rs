//! # Bubble Queue Node
//!
//! Replays a ledger scenario and prints the receipts, final queue and
//! invariant report as JSON.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use bq_node::{NodeConfig, NodeRuntime, Scenario};

#[derive(Debug, Parser)]
#[command(name = "bq-node", version, about = "Bubble Queue ledger node")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Scenario to replay; overrides the configured one
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Print the Prometheus exposition after the run
    #[arg(long)]
    metrics: bool,

    /// Pretty-print the JSON summary
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config =
        NodeConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(path) = args.scenario {
        config.scenario = Some(path);
    }

    let _telemetry =
        bq_telemetry::init_telemetry(&config.telemetry).context("failed to start telemetry")?;
    info!(
        required_per_slot = config.ledger.required_per_slot,
        credits_per_sender_slot = config.ledger.credits_per_sender_slot,
        lock_timeout_ms = config.ledger.lock_timeout_ms,
        "starting bq-node"
    );

    let runtime = NodeRuntime::new(&config)?;

    let Some(path) = config.scenario.as_deref() else {
        warn!("no scenario configured, nothing to replay");
        return Ok(());
    };
    let scenario = Scenario::from_file(path)?;
    runtime.seed(&scenario)?;
    let reports = runtime.replay(&scenario.steps).await?;
    let summary = runtime.summarize(reports)?;

    let output = if args.pretty {
        serde_json::to_string_pretty(&summary)?
    } else {
        serde_json::to_string(&summary)?
    };
    println!("{output}");

    if !summary.invariants.is_clean() {
        warn!(
            violations = summary.invariants.violations.len(),
            "ledger invariants violated after replay"
        );
    }

    if args.metrics {
        print!("{}", bq_telemetry::encode_metrics()?);
    }

    Ok(())
}
