//! # contract: the submission service seen from the batch orchestrator
//!
//! The orchestrator hands each validated [`PostDraft`] to a [`Submitter`] and
//! only cares whether delivery succeeded. Transport, authentication and
//! retries belong to the implementor.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`, so tests get a `MockSubmitter`
//!   (exported behind the default `test-export-mocks` feature).
//! - [`crate::submitter::SimulatedSubmitter`] is the in-process implementation
//!   used by the CLI.

use async_trait::async_trait;
use serde::Serialize;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::SubmissionError;
use crate::model::PostDraft;

/// Acknowledgement returned for a delivered post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    /// Identifier assigned by the destination service.
    pub external_id: String,
}

/// Delivers one post to its destinations.
///
/// Called at most once at a time per batch, strictly in row order.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Submit a validated draft. A failure affects only this row.
    async fn submit(&self, draft: &PostDraft) -> Result<SubmissionReceipt, SubmissionError>;
}
