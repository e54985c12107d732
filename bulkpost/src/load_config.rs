//! Loads the YAML intake config and applies environment overrides.
//!
//! Without a file the built-in defaults apply. `BULKPOST_SUBMIT_LATENCY_MS`
//! overrides the simulated submission latency either way.

use anyhow::Result;
use bulkpost_core::config::IntakeConfig;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const LATENCY_ENV: &str = "BULKPOST_SUBMIT_LATENCY_MS";

pub fn load_config(path: Option<&Path>) -> Result<IntakeConfig> {
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => {
            info!("No config file given, using built-in defaults");
            IntakeConfig::default()
        }
    };

    if let Ok(raw) = std::env::var(LATENCY_ENV) {
        match raw.trim().parse::<u64>() {
            Ok(latency_ms) => {
                info!(latency_ms, "Submission latency overridden from environment");
                config.submission.latency_ms = latency_ms;
            }
            Err(e) => {
                error!(error = ?e, value = %raw, "Invalid {LATENCY_ENV}");
                return Err(anyhow::anyhow!(
                    "{LATENCY_ENV} must be a whole number of milliseconds, got {raw:?}"
                ));
            }
        }
    }

    config.trace_loaded();
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<IntakeConfig> {
    info!(config_path = ?path, "Loading configuration from file");

    let config_content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path,
                e
            ));
        }
    };

    match serde_yaml::from_str(&config_content) {
        Ok(config) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            Ok(config)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}
