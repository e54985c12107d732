use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::flair::FlairPolicyTable;

/// Everything the intake pipeline needs to run one upload session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeConfig {
    #[serde(default = "FlairPolicyTable::builtin")]
    pub flair_policies: FlairPolicyTable,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub submission: SubmissionConfig,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            flair_policies: FlairPolicyTable::builtin(),
            validation: ValidationConfig::default(),
            submission: SubmissionConfig::default(),
        }
    }
}

impl IntakeConfig {
    pub fn trace_loaded(&self) {
        info!(
            policies = self.flair_policies.len(),
            latency_ms = self.submission.latency_ms,
            require_flair = self.validation.require_flair_for_policies,
            "Loaded IntakeConfig"
        );
        debug!(?self, "IntakeConfig loaded (full debug)");
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Also check rows without a flair against each destination's policy,
    /// so destinations that require a flair reject them.
    #[serde(default)]
    pub require_flair_for_policies: bool,
}

/// Settings for the simulated submission service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,
    /// Destinations the simulated service refuses, for rehearsing partial failures.
    #[serde(default)]
    pub reject_destinations: Vec<String>,
}

fn default_latency_ms() -> u64 {
    500
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            latency_ms: default_latency_ms(),
            reject_destinations: Vec::new(),
        }
    }
}

impl SubmissionConfig {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}
