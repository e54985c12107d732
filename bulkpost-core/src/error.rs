//! Error taxonomy for the intake pipeline.
//!
//! Only ingestion and orchestrator misuse surface as `Err` to callers. Row
//! validation problems are collected into [`crate::validate::ValidationOutcome`]s
//! and per-row delivery failures into [`crate::batch::SubmissionResult`]s, so a
//! batch always yields a complete report.

use thiserror::Error;

use crate::batch::BatchStatus;

/// The upload could not be interpreted as a supported tabular format.
///
/// Fatal to the session: the operator has to select another file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed file: {reason}")]
pub struct MalformedFileError {
    pub reason: String,
}

impl MalformedFileError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Every structural and policy violation found on one row, in rule order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("row {row_index} failed validation: {}", errors.join("; "))]
pub struct RowValidationError {
    pub row_index: usize,
    pub errors: Vec<String>,
}

/// Delivery of a single row failed. Recorded against the row; never aborts a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("r/{destination} rejected the post: {reason}")]
    Rejected { destination: String, reason: String },
    #[error("submission service unavailable: {0}")]
    Unavailable(String),
}

/// A flair policy table that cannot be turned into a usable engine.
#[derive(Debug, Error)]
pub enum PolicyConfigError {
    #[error("invalid flair pattern for r/{destination}: {source}")]
    InvalidPattern {
        destination: String,
        #[source]
        source: regex::Error,
    },
}

/// Operator-facing misuse of the orchestrator.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("batch is not ready for upload (status: {status:?})")]
    NotReady { status: BatchStatus },
    #[error("failed to read upload {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("upload task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
