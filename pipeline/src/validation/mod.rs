//! Input validation shared by the filter and merge stages.
//!
//! - [`parse_cutoff`] - strict ISO 8601 cutoff parsing (fatal on failure)
//! - [`parse_timestamp`] - lenient response timestamp parsing (`None` on failure)
//! - [`require_columns`] - presence check for schema columns
//! - [`normalize_key_part`] - canonical form of a respondent key component

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ValidationError, ValidationResult};
use crate::models::{Side, Table};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parse a cutoff given as `YYYY-MM-DD` or an ISO 8601 date-time.
/// A bare date means midnight at the start of that day.
pub fn parse_cutoff(value: &str) -> ValidationResult<NaiveDateTime> {
    let trimmed = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0).unwrap_or_default());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt);
        }
    }
    Err(ValidationError::InvalidCutoff(value.to_string()))
}

/// Parse a recorded timestamp as exported by the platform. Unrecognized
/// values yield `None` and the row is dropped by the caller.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Fail on the first of `columns` missing from `table`.
pub fn require_columns(table: &Table, side: Side, columns: &[String]) -> ValidationResult<()> {
    match columns.iter().find(|c| table.column_index(c).is_none()) {
        Some(missing) => Err(ValidationError::MissingColumn {
            side,
            column: missing.clone(),
        }),
        None => Ok(()),
    }
}

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Lowercase, trim and collapse inner whitespace.
pub fn normalize_key_part(value: &str) -> String {
    WHITESPACE
        .replace_all(value.trim(), " ")
        .to_lowercase()
}
