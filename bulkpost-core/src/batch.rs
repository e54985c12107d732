//! Batch lifecycle: file selection → ingestion → validation → sequential upload.
//!
//! [`BatchOrchestrator`] owns the single active [`BatchJob`] and is the only
//! writer to it. Observers (progress bars, validation tables) subscribe to a
//! `watch` channel and read snapshots.
//!
//! # Lifecycle
//! - `Idle → Validating`: a file is selected. Any previous job is discarded.
//! - `Validating → Ready`: every row validated.
//! - `Validating → Error`: the file is malformed, empty, or any row is invalid.
//!   Rows and outcomes are kept for inspection; upload stays blocked.
//! - `Ready → Uploading`: [`BatchOrchestrator::start_upload`]. Rows are submitted
//!   one at a time in row order. A failed row is recorded and the batch continues.
//! - `Uploading → Complete`: all rows attempted, whatever their individual result.
//!
//! # Supersession
//! Every job carries a generation number and a cancellation token. Selecting a
//! new file cancels the old token and bumps the generation; the upload task
//! checks both before each write, so a stale submission never lands in the
//! replacement job.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::contract::Submitter;
use crate::error::{BatchError, SubmissionError};
use crate::ingest;
use crate::model::{PostDraft, RawRow};
use crate::validate::{RowValidator, ValidationOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    Idle,
    Validating,
    Ready,
    Uploading,
    Complete,
    Error,
}

/// Delivery outcome of one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub row_index: usize,
    pub succeeded: bool,
    pub error: Option<String>,
}

impl SubmissionResult {
    fn from_submission<T>(row_index: usize, result: &Result<T, SubmissionError>) -> Self {
        match result {
            Ok(_) => Self {
                row_index,
                succeeded: true,
                error: None,
            },
            Err(e) => Self {
                row_index,
                succeeded: false,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Counts reported once a batch finishes uploading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<SubmissionResult>,
}

/// One upload session, from file selection to completion report.
#[derive(Debug, Clone, Serialize)]
pub struct BatchJob {
    pub id: Uuid,
    pub generation: u64,
    pub file_name: Option<String>,
    pub status: BatchStatus,
    pub rows: Vec<RawRow>,
    /// Typed drafts, filled only once every row is valid.
    pub drafts: Vec<PostDraft>,
    pub outcomes: Vec<ValidationOutcome>,
    pub progress: f64,
    pub results: Option<Vec<SubmissionResult>>,
    /// User-facing explanation for the current status.
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    cancel: CancellationToken,
}

impl BatchJob {
    fn new(generation: u64, status: BatchStatus, file_name: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            generation,
            file_name,
            status,
            rows: Vec::new(),
            drafts: Vec::new(),
            outcomes: Vec::new(),
            progress: 0.0,
            results: None,
            message: None,
            updated_at: Utc::now(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn valid_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.valid).count()
    }

    /// "N of M rows are valid".
    pub fn validation_summary(&self) -> String {
        format!(
            "{} of {} rows are valid",
            self.valid_count(),
            self.outcomes.len()
        )
    }

    /// Completion counts; `None` until the batch is `Complete`.
    pub fn summary(&self) -> Option<BatchSummary> {
        if self.status != BatchStatus::Complete {
            return None;
        }
        let results = self.results.as_deref().unwrap_or_default();
        let failures: Vec<SubmissionResult> =
            results.iter().filter(|r| !r.succeeded).cloned().collect();
        Some(BatchSummary {
            total: results.len(),
            succeeded: results.len() - failures.len(),
            failed: failures.len(),
            failures,
        })
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// An uploaded file, fully read into memory.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// MIME type or file name used for format detection.
    pub mime_hint: Option<String>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        Self {
            mime_hint: Some(file_name.clone()),
            file_name,
            bytes,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime_hint = Some(mime.into());
        self
    }
}

/// How an upload task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Complete(BatchSummary),
    /// A newer file replaced the job; nothing further was written to it.
    Superseded { attempted: usize },
}

/// Handle to a running upload task.
pub struct UploadHandle {
    pub generation: u64,
    task: JoinHandle<UploadOutcome>,
}

impl UploadHandle {
    pub async fn wait(self) -> Result<UploadOutcome, BatchError> {
        Ok(self.task.await?)
    }
}

/// Drives one batch job at a time through its lifecycle.
pub struct BatchOrchestrator<S: Submitter + ?Sized> {
    validator: RowValidator,
    submitter: Arc<S>,
    job: Arc<watch::Sender<BatchJob>>,
}

impl<S: Submitter + ?Sized + 'static> BatchOrchestrator<S> {
    pub fn new(validator: RowValidator, submitter: Arc<S>) -> Self {
        let (job, _) = watch::channel(BatchJob::new(0, BatchStatus::Idle, None));
        Self {
            validator,
            submitter,
            job: Arc::new(job),
        }
    }

    /// Read-only view of the job for presentation.
    pub fn subscribe(&self) -> watch::Receiver<BatchJob> {
        self.job.subscribe()
    }

    pub fn snapshot(&self) -> BatchJob {
        self.job.borrow().clone()
    }

    pub fn status(&self) -> BatchStatus {
        self.job.borrow().status
    }

    /// Discards the current job and returns to `Idle`.
    pub fn reset(&self) {
        self.replace_job(BatchStatus::Idle, None);
        info!("[BATCH] Reset to idle");
    }

    /// Reads `path` and runs it through ingestion and validation.
    ///
    /// The job enters `Validating` before the read starts, so a slow read can
    /// itself be superseded by another selection.
    pub async fn select_path(&self, path: impl AsRef<Path>) -> Result<BatchStatus, BatchError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let generation = self.replace_job(BatchStatus::Validating, Some(file_name.clone()));

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(source) => {
                error!(error = ?source, path = %path.display(), "[BATCH] Failed to read upload");
                self.apply(generation, |job| {
                    job.status = BatchStatus::Error;
                    job.message = Some(format!("Could not read {file_name}"));
                });
                return Err(BatchError::Read {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        Ok(self.ingest_and_validate(generation, Upload::new(file_name, bytes)))
    }

    /// Starts a new session from an in-memory upload.
    pub fn select_file(&self, upload: Upload) -> BatchStatus {
        let generation = self.replace_job(BatchStatus::Validating, Some(upload.file_name.clone()));
        self.ingest_and_validate(generation, upload)
    }

    /// Moves a `Ready` job to `Uploading` and spawns the sequential submission task.
    pub fn start_upload(&self) -> Result<UploadHandle, BatchError> {
        let mut prepared = None;
        self.job.send_if_modified(|job| {
            if job.status != BatchStatus::Ready {
                return false;
            }
            job.status = BatchStatus::Uploading;
            job.progress = 0.0;
            job.results = Some(Vec::with_capacity(job.drafts.len()));
            job.message = None;
            job.touch();
            prepared = Some((job.generation, job.drafts.clone(), job.cancel.clone()));
            true
        });

        let (generation, drafts, cancel) = prepared.ok_or_else(|| BatchError::NotReady {
            status: self.status(),
        })?;

        info!(generation, rows = drafts.len(), "[BATCH] Upload started");
        let task = tokio::spawn(run_submissions(
            generation,
            drafts,
            self.submitter.clone(),
            self.job.clone(),
            cancel,
        ));
        Ok(UploadHandle { generation, task })
    }

    /// Uploads the ready batch and waits for it to finish.
    pub async fn upload(&self) -> Result<UploadOutcome, BatchError> {
        self.start_upload()?.wait().await
    }

    /// Publishes a fresh job and cancels the one it replaces. The generation
    /// is derived under the channel lock so it follows publication order.
    fn replace_job(&self, status: BatchStatus, file_name: Option<String>) -> u64 {
        let mut generation = 0;
        let mut replaced = None;
        self.job.send_modify(|job| {
            generation = job.generation + 1;
            replaced = Some(std::mem::replace(
                job,
                BatchJob::new(generation, status, file_name),
            ));
        });
        if let Some(previous) = replaced {
            previous.cancel.cancel();
            if previous.status == BatchStatus::Uploading {
                warn!(
                    previous_generation = previous.generation,
                    generation, "[BATCH] Upload in progress abandoned for a new session"
                );
            }
        }
        debug!(generation, ?status, "[BATCH] New job generation");
        generation
    }

    /// Applies `update` only if `generation` is still the active job.
    fn apply(&self, generation: u64, update: impl FnOnce(&mut BatchJob)) -> bool {
        let applied = self.job.send_if_modified(|job| {
            if job.generation != generation {
                return false;
            }
            update(job);
            job.touch();
            true
        });
        if !applied {
            warn!(generation, "[BATCH] Dropping update for superseded job");
        }
        applied
    }

    fn ingest_and_validate(&self, generation: u64, upload: Upload) -> BatchStatus {
        info!(file = %upload.file_name, bytes = upload.bytes.len(), generation, "[BATCH] Validating upload");

        let rows = match ingest::parse(&upload.bytes, upload.mime_hint.as_deref()) {
            Ok(rows) => rows,
            Err(e) => {
                self.apply(generation, |job| {
                    job.status = BatchStatus::Error;
                    job.message = Some(format!(
                        "Error parsing file: {}. Please ensure the file follows the template format",
                        e.reason
                    ));
                });
                return self.status();
            }
        };

        if rows.is_empty() {
            warn!(file = %upload.file_name, "[BATCH] Upload contains no rows");
            self.apply(generation, |job| {
                job.status = BatchStatus::Error;
                job.message = Some("The file contains no posts".to_string());
            });
            return self.status();
        }

        let verdicts = self.validator.project_all(&rows, Utc::now());
        let outcomes: Vec<ValidationOutcome> = verdicts
            .iter()
            .enumerate()
            .map(|(index, verdict)| ValidationOutcome::from_verdict(index, verdict))
            .collect();
        let all_valid = outcomes.iter().all(|o| o.valid);
        let drafts: Vec<PostDraft> = if all_valid {
            verdicts.into_iter().filter_map(Result::ok).collect()
        } else {
            Vec::new()
        };

        self.apply(generation, |job| {
            job.rows = rows;
            job.outcomes = outcomes;
            job.drafts = drafts;
            if all_valid {
                job.status = BatchStatus::Ready;
                job.message = Some(format!(
                    "File validated successfully: {}",
                    job.validation_summary()
                ));
            } else {
                job.status = BatchStatus::Error;
                job.message = Some(format!(
                    "Validation errors found: {}",
                    job.validation_summary()
                ));
            }
            info!(
                generation,
                status = ?job.status,
                summary = %job.validation_summary(),
                "[BATCH] Validation finished"
            );
        });
        self.status()
    }
}

async fn run_submissions<S: Submitter + ?Sized>(
    generation: u64,
    drafts: Vec<PostDraft>,
    submitter: Arc<S>,
    job: Arc<watch::Sender<BatchJob>>,
    cancel: CancellationToken,
) -> UploadOutcome {
    let total = drafts.len();

    for (row_index, draft) in drafts.iter().enumerate() {
        debug!(generation, row_index, title = %draft.title, "[UPLOAD] Submitting row");
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(generation, row_index, "[UPLOAD] Upload cancelled, abandoning remaining rows");
                return UploadOutcome::Superseded { attempted: row_index };
            }
            result = submitter.submit(draft) => result,
        };

        match &result {
            Ok(receipt) => {
                info!(generation, row_index, external_id = %receipt.external_id, "[UPLOAD] Row submitted")
            }
            Err(e) => {
                warn!(generation, row_index, error = %e, "[UPLOAD] Row submission failed, continuing")
            }
        }

        let entry = SubmissionResult::from_submission(row_index, &result);
        let attempted = row_index + 1;
        let applied = job.send_if_modified(|job| {
            if job.generation != generation || cancel.is_cancelled() {
                return false;
            }
            job.results.get_or_insert_with(Vec::new).push(entry);
            job.progress = attempted as f64 / total as f64;
            job.touch();
            true
        });
        if !applied {
            warn!(generation, row_index, "[UPLOAD] Job superseded, discarding submission result");
            return UploadOutcome::Superseded { attempted: row_index };
        }
    }

    let mut summary = None;
    job.send_if_modified(|job| {
        if job.generation != generation || cancel.is_cancelled() {
            return false;
        }
        job.status = BatchStatus::Complete;
        job.progress = 1.0;
        job.touch();
        summary = job.summary();
        if let Some(summary) = &summary {
            job.message = Some(format!(
                "Bulk upload complete: {} of {} posts scheduled",
                summary.succeeded, summary.total
            ));
        }
        true
    });

    match summary {
        Some(summary) => {
            info!(
                generation,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "[BATCH] Upload complete"
            );
            UploadOutcome::Complete(summary)
        }
        None => UploadOutcome::Superseded { attempted: total },
    }
}
