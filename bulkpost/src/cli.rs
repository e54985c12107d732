//! Command-line surface for bulk post intake.
//!
//! Everything here is glue: argument parsing, config loading and printing.
//! Ingestion, validation and batch submission live in `bulkpost-core`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bulkpost_core::batch::{BatchOrchestrator, BatchStatus, UploadOutcome};
use bulkpost_core::submitter::SimulatedSubmitter;
use bulkpost_core::template::{generate_template, TEMPLATE_FILE_NAME};
use bulkpost_core::validate::parse_destinations;
use clap::{Parser, Subcommand};

use crate::load_config::load_config;

/// CLI for bulkpost: validate and schedule spreadsheets of posts.
#[derive(Parser)]
#[clap(
    name = "bulkpost",
    version,
    about = "Validate and submit spreadsheets of scheduled posts in one batch"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write the blank CSV template with one example row
    Template {
        /// Output path, defaults to the template file name in the working directory
        #[clap(long)]
        out: Option<PathBuf>,
    },
    /// Ingest and validate a file without submitting anything
    Validate {
        /// CSV, TSV or XLSX file of posts
        #[clap(long)]
        file: PathBuf,
        /// Path to the YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Validate a file and submit every row as one batch
    Submit {
        #[clap(long)]
        file: PathBuf,
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Show the flair policy for a destination
    Flairs {
        #[clap(long)]
        destination: String,
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Async entrypoint shared by `main` and the integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Template { out } => {
            let out = out.unwrap_or_else(|| PathBuf::from(TEMPLATE_FILE_NAME));
            let bytes = generate_template().context("Failed to render template")?;
            tokio::fs::write(&out, bytes)
                .await
                .with_context(|| format!("Failed to write template to {}", out.display()))?;
            tracing::info!(command = "template", path = %out.display(), "Template written");
            println!("{}", out.display());
            Ok(())
        }
        Commands::Validate { file, config } => {
            let orchestrator = orchestrator(config.as_deref())?;
            validate_file(&orchestrator, &file).await?;
            Ok(())
        }
        Commands::Submit { file, config } => {
            let orchestrator = orchestrator(config.as_deref())?;
            validate_file(&orchestrator, &file).await?;

            tracing::info!(command = "submit", file = %file.display(), "Starting batch upload");
            match orchestrator.upload().await? {
                UploadOutcome::Complete(summary) => {
                    if let Some(message) = orchestrator.snapshot().message {
                        println!("{message}");
                    }
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                    Ok(())
                }
                UploadOutcome::Superseded { attempted } => {
                    bail!("Upload was superseded after {attempted} rows")
                }
            }
        }
        Commands::Flairs {
            destination,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let validator = bulkpost_core::build_validator(&config)?;
            let engine = validator.engine();
            let Some(destination) = parse_destinations(&destination).into_iter().next() else {
                bail!("Destination is required");
            };
            let report = serde_json::json!({
                "destination": destination,
                "has_policy": engine.has_policy(&destination),
                "custom_allowed": engine.custom_flair_allowed(&destination),
                "flairs": engine.available_flairs(&destination),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

fn orchestrator(config: Option<&Path>) -> Result<BatchOrchestrator<SimulatedSubmitter>> {
    let config = load_config(config)?;
    Ok(bulkpost_core::simulated_orchestrator(&config)?)
}

/// Runs ingestion and validation, printing every rejected row.
/// Fails unless the batch ends up `Ready`.
async fn validate_file(
    orchestrator: &BatchOrchestrator<SimulatedSubmitter>,
    file: &Path,
) -> Result<()> {
    let status = orchestrator
        .select_path(file)
        .await
        .with_context(|| format!("Failed to load {}", file.display()))?;
    let job = orchestrator.snapshot();

    for outcome in job.outcomes.iter().filter(|o| !o.valid) {
        println!("Row {}: {}", outcome.row_index + 1, outcome.errors.join("; "));
    }
    let message = job.message.unwrap_or_default();
    if status != BatchStatus::Ready {
        tracing::error!(file = %file.display(), ?status, "Validation failed");
        bail!("{message}");
    }
    println!("{message}");
    Ok(())
}
