//! # Node Configuration
//!
//! Ledger and telemetry settings plus the scenario to replay.
//!
//! Sources, later ones winning:
//!
//! 1. Built-in defaults
//! 2. A TOML file (`--config`)
//! 3. `BQ_*` environment variables

use std::path::{Path, PathBuf};

use bq_ledger::LedgerConfig;
use bq_telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid environment variable {name}={value}")]
    Env { name: &'static str, value: String },

    #[error("Invalid ledger configuration: {0}")]
    Ledger(#[from] bq_ledger::LedgerError),
}

/// Complete node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub ledger: LedgerConfig,
    pub telemetry: TelemetryConfig,
    /// Scenario file replayed at startup.
    pub scenario: Option<PathBuf>,
}

impl NodeConfig {
    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self {
                telemetry: TelemetryConfig::from_env(),
                ..Self::default()
            },
        };
        config.apply_env()?;
        config.ledger.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Override ledger settings from `BQ_*` variables.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    fn apply_vars<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(
            name: &'static str,
            value: Option<String>,
            target: &mut T,
        ) -> Result<(), ConfigError> {
            if let Some(value) = value {
                *target = value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::Env { name, value })?;
            }
            Ok(())
        }

        let ledger = &mut self.ledger;
        parse("BQ_REQUIRED_PER_SLOT", var("BQ_REQUIRED_PER_SLOT"), &mut ledger.required_per_slot)?;
        parse(
            "BQ_CREDITS_PER_SENDER_SLOT",
            var("BQ_CREDITS_PER_SENDER_SLOT"),
            &mut ledger.credits_per_sender_slot,
        )?;
        parse(
            "BQ_CORRUPTION_TOLERANCE",
            var("BQ_CORRUPTION_TOLERANCE"),
            &mut ledger.corruption_tolerance,
        )?;
        parse("BQ_LOCK_TIMEOUT_MS", var("BQ_LOCK_TIMEOUT_MS"), &mut ledger.lock_timeout_ms)?;
        parse(
            "BQ_MAX_LOCK_ATTEMPTS",
            var("BQ_MAX_LOCK_ATTEMPTS"),
            &mut ledger.max_lock_attempts,
        )?;
        if let Some(path) = var("BQ_SCENARIO") {
            self.scenario = Some(PathBuf::from(path));
        }
        Ok(())
    }
}
