#![doc = "bulkpost-core: core logic library for bulk post intake."]

//! Turns an uploaded spreadsheet of prospective posts into validated drafts
//! and submits them as one sequential batch.
//!
//! Data flow: bytes → [`ingest`] → [`validate`] (consulting [`flair`]) →
//! [`batch`] → [`contract::Submitter`].
//!
//! # Usage
//! Build a [`validate::RowValidator`] from an [`config::IntakeConfig`], hand it to a
//! [`batch::BatchOrchestrator`] together with a submitter, then select a file
//! and start the upload.

pub mod batch;
pub mod config;
pub mod contract;
pub mod error;
pub mod flair;
pub mod ingest;
pub mod model;
pub mod submitter;
pub mod template;
pub mod validate;

use std::sync::Arc;

use crate::batch::BatchOrchestrator;
use crate::config::IntakeConfig;
use crate::error::PolicyConfigError;
use crate::flair::FlairPolicyEngine;
use crate::submitter::SimulatedSubmitter;
use crate::validate::RowValidator;

/// Compiles the policy table and builds the validator described by `config`.
pub fn build_validator(config: &IntakeConfig) -> Result<RowValidator, PolicyConfigError> {
    let engine = FlairPolicyEngine::new(config.flair_policies.clone())?;
    Ok(RowValidator::new(engine, config.validation.clone()))
}

/// Orchestrator wired to the simulated submission service.
pub fn simulated_orchestrator(
    config: &IntakeConfig,
) -> Result<BatchOrchestrator<SimulatedSubmitter>, PolicyConfigError> {
    let validator = build_validator(config)?;
    let submitter = Arc::new(SimulatedSubmitter::from_config(&config.submission));
    Ok(BatchOrchestrator::new(validator, submitter))
}
