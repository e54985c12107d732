//! In-process stand-in for the destination submission service.
//!
//! Each submission waits for the configured latency and then succeeds,
//! unless one of the post's destinations is on the reject list.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SubmissionConfig;
use crate::contract::{SubmissionReceipt, Submitter};
use crate::error::SubmissionError;
use crate::model::PostDraft;

pub struct SimulatedSubmitter {
    latency: Duration,
    reject_destinations: Vec<String>,
}

impl SimulatedSubmitter {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            reject_destinations: Vec::new(),
        }
    }

    pub fn from_config(config: &SubmissionConfig) -> Self {
        Self {
            latency: config.latency(),
            reject_destinations: config
                .reject_destinations
                .iter()
                .map(|d| d.trim().to_lowercase())
                .collect(),
        }
    }

    pub fn rejecting(mut self, destination: &str) -> Self {
        self.reject_destinations.push(destination.trim().to_lowercase());
        self
    }
}

#[async_trait]
impl Submitter for SimulatedSubmitter {
    async fn submit(&self, draft: &PostDraft) -> Result<SubmissionReceipt, SubmissionError> {
        tokio::time::sleep(self.latency).await;

        if let Some(destination) = draft
            .destinations
            .iter()
            .find(|d| self.reject_destinations.contains(&d.to_lowercase()))
        {
            warn!(destination = %destination, title = %draft.title, "[UPLOAD] Simulated rejection");
            return Err(SubmissionError::Rejected {
                destination: destination.clone(),
                reason: "destination is not accepting posts".to_string(),
            });
        }

        let receipt = SubmissionReceipt {
            external_id: Uuid::new_v4().to_string(),
        };
        info!(
            external_id = %receipt.external_id,
            destinations = ?draft.destinations,
            "[UPLOAD] Simulated submission accepted"
        );
        Ok(receipt)
    }
}
