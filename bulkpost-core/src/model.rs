//! Row and post data types shared by ingestion, validation and submission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single spreadsheet cell as read from the source sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// Builds a text cell, mapping blank strings to [`CellValue::Empty`].
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value)
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) | CellValue::Bool(_) => false,
        }
    }

    /// Renders the cell the way an operator typed it; `None` for empty cells.
    ///
    /// Whole numbers drop their fractional part so `24.0` reads back as `24`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) if s.trim().is_empty() => None,
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(format!("{}", *n as i64))
            }
            CellValue::Number(n) => Some(n.to_string()),
            CellValue::Bool(b) => Some(b.to_string()),
        }
    }
}

/// One ingested line: column name to raw cell, in source column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    cells: Vec<(String, CellValue)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a cell. A repeated column name keeps its first value.
    pub fn push(&mut self, column: impl Into<String>, value: CellValue) {
        let column = column.into();
        if self.get(&column).is_none() {
            self.cells.push((column, value));
        }
    }

    /// Builder that appends a text cell.
    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.push(column, CellValue::text(value));
        self
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// First non-empty text among the given column aliases.
    pub fn text_of(&self, columns: &[&str]) -> Option<String> {
        columns
            .iter()
            .filter_map(|column| self.get(column))
            .find_map(CellValue::as_text)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn cells(&self) -> &[(String, CellValue)] {
        &self.cells
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, value)| value.is_empty())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// An approved flair for a destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlairEntry {
    pub id: String,
    pub text: String,
    pub background_color: String,
    pub text_color: String,
}

impl FlairEntry {
    pub fn new(id: &str, text: &str, background_color: &str, text_color: &str) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
            background_color: background_color.to_string(),
            text_color: text_color.to_string(),
        }
    }
}

pub const DEFAULT_FLAIR_BACKGROUND: &str = "#e2e8f0";
pub const DEFAULT_FLAIR_TEXT_COLOR: &str = "#1e293b";

/// A flair chosen for a post on one destination. `id` is absent for custom flairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlairSelection {
    pub id: Option<String>,
    pub text: String,
    pub background_color: String,
    pub text_color: String,
    pub destination: String,
}

impl FlairSelection {
    /// A free-text flair with the default colours.
    pub fn custom(destination: &str, text: &str) -> Self {
        Self {
            id: None,
            text: text.to_string(),
            background_color: DEFAULT_FLAIR_BACKGROUND.to_string(),
            text_color: DEFAULT_FLAIR_TEXT_COLOR.to_string(),
            destination: destination.to_string(),
        }
    }

    pub fn from_entry(destination: &str, entry: &FlairEntry) -> Self {
        Self {
            id: Some(entry.id.clone()),
            text: entry.text.clone(),
            background_color: entry.background_color.clone(),
            text_color: entry.text_color.clone(),
            destination: destination.to_string(),
        }
    }
}

/// The validated projection of a [`RawRow`]. Only ever built from a row that
/// passed every rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub destinations: Vec<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Resolved flair per destination, in destination order.
    pub flairs: Vec<FlairSelection>,
    pub is_nsfw: bool,
    pub is_spoiler: bool,
    pub auto_delete_after_hours: Option<f64>,
    pub auto_delete_below_score: Option<f64>,
}

impl PostDraft {
    /// The flair as resolved against the first destination.
    pub fn flair(&self) -> Option<&FlairSelection> {
        self.flairs.first()
    }

    pub fn flair_for(&self, destination: &str) -> Option<&FlairSelection> {
        self.flairs.iter().find(|f| f.destination == destination)
    }
}

/// Recognised column names, after header normalisation.
pub mod columns {
    pub const TITLE: &str = "title";
    pub const CONTENT: &str = "content";
    /// Accepted spellings of the destination column; the first is canonical.
    pub const DESTINATION: &[&str] = &[
        "subreddit",
        "subreddits",
        "subreddit(s)",
        "destination",
        "destinations",
    ];
    pub const SCHEDULED_TIME: &[&str] = &["scheduled_time", "scheduled_for"];
    pub const FLAIR: &str = "flair";
    pub const NSFW: &str = "nsfw";
    pub const SPOILER: &str = "spoiler";
    pub const AUTO_DELETE_HOURS: &str = "auto_delete_hours";
    pub const AUTO_DELETE_SCORE: &str = "auto_delete_score";
}
