//! Tabular ingestion: uploaded bytes to ordered [`RawRow`]s.
//!
//! Supports xlsx workbooks (first sheet) and delimited text (comma or tab).
//! The first row supplies the column names; rows whose cells are all empty
//! are dropped. Parsing is all-or-nothing: callers get every row or a
//! [`MalformedFileError`].

use std::io::Cursor;

use calamine::{Data, DataType, Reader, Xlsx};
use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, error, info};

use crate::error::MalformedFileError;
use crate::model::{CellValue, RawRow};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Formats the ingester understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
    Workbook,
    Delimited(u8),
}

impl TabularFormat {
    /// Picks a format from a MIME type or file name hint, falling back to
    /// sniffing the content. A zip payload is always read as a workbook.
    pub fn detect(bytes: &[u8], hint: Option<&str>) -> Result<Self, MalformedFileError> {
        if bytes.starts_with(ZIP_MAGIC) {
            return Ok(TabularFormat::Workbook);
        }

        let hint = hint.map(|h| h.trim().to_lowercase()).unwrap_or_default();
        if hint == XLSX_MIME || hint.ends_with(".xlsx") {
            return Err(MalformedFileError::new(
                "expected an xlsx workbook but the content is not one",
            ));
        }
        if hint.contains("tab-separated") || hint.ends_with(".tsv") {
            return Ok(TabularFormat::Delimited(b'\t'));
        }
        if hint.contains("csv") || hint.ends_with(".csv") {
            return Ok(TabularFormat::Delimited(b','));
        }

        let text = std::str::from_utf8(strip_bom(bytes))
            .map_err(|_| MalformedFileError::new("unsupported file format"))?;
        let first_line = text.lines().next().unwrap_or_default();
        if first_line.contains('\t') && !first_line.contains(',') {
            Ok(TabularFormat::Delimited(b'\t'))
        } else {
            Ok(TabularFormat::Delimited(b','))
        }
    }
}

/// Normalises a header cell into a column key: trimmed, lowercase, inner
/// whitespace collapsed to `_`.
pub fn normalise_header(header: &str) -> String {
    header
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Parses an uploaded file into rows.
pub fn parse(bytes: &[u8], mime_hint: Option<&str>) -> Result<Vec<RawRow>, MalformedFileError> {
    if bytes.is_empty() {
        error!("[INGEST] Upload is empty");
        return Err(MalformedFileError::new("file is empty"));
    }

    let format = TabularFormat::detect(bytes, mime_hint).map_err(|e| {
        error!(error = %e, hint = ?mime_hint, "[INGEST] Could not determine file format");
        e
    })?;
    debug!(?format, hint = ?mime_hint, "[INGEST] Detected tabular format");

    let rows = match format {
        TabularFormat::Workbook => parse_workbook(bytes),
        TabularFormat::Delimited(delimiter) => parse_delimited(bytes, delimiter),
    }
    .map_err(|e| {
        error!(error = %e, ?format, "[INGEST] Failed to parse upload");
        e
    })?;

    info!(rows = rows.len(), ?format, "[INGEST] Parsed upload");
    Ok(rows)
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}

fn parse_delimited(bytes: &[u8], delimiter: u8) -> Result<Vec<RawRow>, MalformedFileError> {
    let text = std::str::from_utf8(strip_bom(bytes))
        .map_err(|e| MalformedFileError::new(format!("delimited text is not UTF-8: {e}")))?;

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| MalformedFileError::new(format!("failed to read header row: {e}")))?
        .iter()
        .map(normalise_header)
        .collect();
    ensure_headers(&headers)?;

    let mut rows = Vec::new();
    let mut record = StringRecord::new();
    let mut line = 1usize;
    loop {
        line += 1;
        let more = reader
            .read_record(&mut record)
            .map_err(|e| MalformedFileError::new(format!("failed to parse line {line}: {e}")))?;
        if !more {
            break;
        }
        let row = build_row(&headers, record.iter().map(CellValue::text));
        if !row.is_blank() {
            rows.push(row);
        }
    }
    Ok(rows)
}

fn parse_workbook(bytes: &[u8]) -> Result<Vec<RawRow>, MalformedFileError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| MalformedFileError::new(format!("failed to open workbook: {e}")))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| MalformedFileError::new("workbook has no sheets"))?
        .map_err(|e| MalformedFileError::new(format!("failed to read first sheet: {e}")))?;

    let mut lines = range.rows();
    let headers: Vec<String> = match lines.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| normalise_header(&cell.to_string()))
            .collect(),
        None => return Err(MalformedFileError::new("first sheet is empty")),
    };
    ensure_headers(&headers)?;

    Ok(lines
        .map(|cells| build_row(&headers, cells.iter().map(workbook_cell)))
        .filter(|row| !row.is_blank())
        .collect())
}

fn ensure_headers(headers: &[String]) -> Result<(), MalformedFileError> {
    if headers.iter().all(String::is_empty) {
        return Err(MalformedFileError::new("missing header row"));
    }
    Ok(())
}

fn build_row(headers: &[String], cells: impl Iterator<Item = CellValue>) -> RawRow {
    let mut row = RawRow::new();
    for (header, value) in headers.iter().zip(cells) {
        if !header.is_empty() {
            row.push(header.clone(), value);
        }
    }
    row
}

fn workbook_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_datetime() {
            Some(datetime) => CellValue::Text(datetime.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => CellValue::text(cell.to_string()),
        },
        other => CellValue::text(other.to_string()),
    }
}
