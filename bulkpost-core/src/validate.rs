//! Row validation: turns a loosely typed [`RawRow`] into either a checked
//! [`PostDraft`] or the complete list of problems found on it.
//!
//! Every rule runs on every row; errors accumulate in rule order so the
//! operator sees all problems of a row in one pass.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ValidationConfig;
use crate::error::RowValidationError;
use crate::flair::FlairPolicyEngine;
use crate::model::{columns, FlairSelection, PostDraft, RawRow};

pub const MAX_TITLE_CHARS: usize = 300;

/// Result of validating one row. Index-aligned with the ingested rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub row_index: usize,
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    pub fn from_verdict(row_index: usize, verdict: &Result<PostDraft, RowValidationError>) -> Self {
        match verdict {
            Ok(_) => Self {
                row_index,
                valid: true,
                errors: Vec::new(),
            },
            Err(rejection) => Self {
                row_index,
                valid: false,
                errors: rejection.errors.clone(),
            },
        }
    }
}

/// Applies the structural rules and the flair policy engine to rows.
#[derive(Debug, Clone)]
pub struct RowValidator {
    engine: FlairPolicyEngine,
    config: ValidationConfig,
}

impl RowValidator {
    pub fn new(engine: FlairPolicyEngine, config: ValidationConfig) -> Self {
        Self { engine, config }
    }

    pub fn engine(&self) -> &FlairPolicyEngine {
        &self.engine
    }

    /// Validates against the current wall clock.
    pub fn validate(&self, row: &RawRow, index: usize) -> ValidationOutcome {
        self.validate_at(row, index, Utc::now())
    }

    pub fn validate_at(&self, row: &RawRow, index: usize, now: DateTime<Utc>) -> ValidationOutcome {
        ValidationOutcome::from_verdict(index, &self.project(row, index, now))
    }

    /// Validates every row, keeping verdicts index-aligned with `rows`.
    pub fn project_all(
        &self,
        rows: &[RawRow],
        now: DateTime<Utc>,
    ) -> Vec<Result<PostDraft, RowValidationError>> {
        rows.iter()
            .enumerate()
            .map(|(index, row)| self.project(row, index, now))
            .collect()
    }

    /// Builds the typed draft for a row, or every error found on it.
    pub fn project(
        &self,
        row: &RawRow,
        index: usize,
        now: DateTime<Utc>,
    ) -> Result<PostDraft, RowValidationError> {
        let mut errors = Vec::new();

        let raw_title = row.text_of(&[columns::TITLE]).unwrap_or_default();
        let title = raw_title.trim().to_string();
        let destinations = row
            .text_of(columns::DESTINATION)
            .map(|field| parse_destinations(&field))
            .unwrap_or_default();

        if title.is_empty() {
            errors.push("Title is required".to_string());
        }
        if destinations.is_empty() {
            errors.push("Destination is required".to_string());
        }
        if raw_title.chars().count() > MAX_TITLE_CHARS {
            errors.push(format!("Title exceeds {MAX_TITLE_CHARS} characters"));
        }

        let mut scheduled_for = None;
        if let Some(raw) = row.text_of(columns::SCHEDULED_TIME) {
            match parse_scheduled_time(&raw) {
                Some(instant) => {
                    if instant <= now {
                        errors.push("Scheduled time must be in the future".to_string());
                    }
                    scheduled_for = Some(instant);
                }
                None => errors.push("Invalid scheduled time format".to_string()),
            }
        }

        let auto_delete_after_hours = match row.text_of(&[columns::AUTO_DELETE_HOURS]) {
            Some(raw) => match parse_number(&raw) {
                Some(hours) if hours < 0.0 => {
                    errors.push("Auto delete hours must not be negative".to_string());
                    None
                }
                Some(hours) => Some(hours),
                None => {
                    errors.push("Auto delete hours must be a number".to_string());
                    None
                }
            },
            None => None,
        };

        let auto_delete_below_score = match row.text_of(&[columns::AUTO_DELETE_SCORE]) {
            Some(raw) => {
                let score = parse_number(&raw);
                if score.is_none() {
                    errors.push("Auto delete score must be a number".to_string());
                }
                score
            }
            None => None,
        };

        let is_nsfw = parse_flag(row, columns::NSFW, "NSFW must be true or false", &mut errors);
        let is_spoiler = parse_flag(
            row,
            columns::SPOILER,
            "Spoiler must be true or false",
            &mut errors,
        );

        let flair_text = row
            .text_of(&[columns::FLAIR])
            .map(|text| text.trim().to_string());
        let mut flairs: Vec<FlairSelection> = Vec::new();
        for destination in &destinations {
            let selection = flair_text
                .as_deref()
                .map(|text| self.engine.resolve(destination, text));
            if selection.is_some() || self.config.require_flair_for_policies {
                if let Some(error) = self.engine.evaluate(destination, selection.as_ref()) {
                    errors.push(error);
                }
            }
            flairs.extend(selection);
        }

        if !errors.is_empty() {
            debug!(row_index = index, errors = ?errors, "[VALIDATE] Row rejected");
            return Err(RowValidationError {
                row_index: index,
                errors,
            });
        }

        debug!(row_index = index, destinations = ?destinations, "[VALIDATE] Row accepted");
        Ok(PostDraft {
            title,
            content: row.text_of(&[columns::CONTENT]).unwrap_or_default(),
            destinations,
            scheduled_for,
            flairs,
            is_nsfw,
            is_spoiler,
            auto_delete_after_hours,
            auto_delete_below_score,
        })
    }
}

/// Splits a comma separated destination field, dropping blanks, a leading
/// `r/` in any case and repeats. Repeats compare case-insensitively and the
/// first spelling is kept.
pub fn parse_destinations(field: &str) -> Vec<String> {
    let mut destinations: Vec<String> = Vec::new();
    for part in field.split(',') {
        let name = strip_subreddit_prefix(part.trim()).trim();
        let key = name.to_lowercase();
        if !name.is_empty() && !destinations.iter().any(|d| d.to_lowercase() == key) {
            destinations.push(name.to_string());
        }
    }
    destinations
}

fn strip_subreddit_prefix(name: &str) -> &str {
    for prefix in ["/r/", "r/"] {
        if name
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        {
            return &name[prefix.len()..];
        }
    }
    name
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// Parses the accepted scheduled time spellings. Times without an offset are UTC.
pub fn parse_scheduled_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_flag(row: &RawRow, column: &str, message: &str, errors: &mut Vec<String>) -> bool {
    match row.text_of(&[column]) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "true" => true,
            "false" => false,
            _ => {
                errors.push(message.to_string());
                false
            }
        },
        None => false,
    }
}
