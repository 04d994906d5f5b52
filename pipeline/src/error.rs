//! Error types for the survey report pipeline.
//!
//! One enum per stage, plus a top-level [`PipelineError`]:
//!
//! - [`ConfigError`] - missing or invalid environment configuration
//! - [`FetchError`] - export API and archive failures
//! - [`TableError`] - reading and writing CSV tables
//! - [`ValidationError`] - bad cutoff dates, missing columns, duplicate keys
//! - [`RenderError`] - PDF report generation
//! - [`PipelineError`] - end-to-end orchestration
//!
//! Conversion is automatic via `From` implementations, so `?` works across
//! stage boundaries.

use thiserror::Error;

use crate::models::Side;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while building a [`crate::config::Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required variable is unset or blank.
    #[error("Missing required environment variable {0}")]
    MissingVar(&'static str),

    /// Variable is set but cannot be used.
    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: &'static str, message: String },

    /// Schema override file could not be loaded.
    #[error("Invalid survey schema: {0}")]
    Schema(String),
}

// =============================================================================
// Fetch Errors
// =============================================================================

/// Errors from the survey export API.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Token rejected by the platform.
    #[error("Authentication rejected by survey platform (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    /// Export job did not finish in time.
    #[error("Export for survey {survey_id} did not complete within {seconds}s")]
    Timeout { survey_id: String, seconds: u64 },

    /// Transport failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Platform reported the export job as failed.
    #[error("Export failed for survey {0}")]
    ExportFailed(String),

    /// Any other non-success response.
    #[error("Survey API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Body did not have the expected shape.
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Downloaded archive is unreadable or has no CSV entry.
    #[error("Invalid export archive: {0}")]
    Archive(String),

    /// Failed to write the extracted file.
    #[error("Failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Network(err.to_string())
    }
}

impl From<zip::result::ZipError> for FetchError {
    fn from(err: zip::result::ZipError) -> Self {
        FetchError::Archive(err.to_string())
    }
}

// =============================================================================
// Table Errors
// =============================================================================

/// Errors while reading or writing CSV tables.
#[derive(Debug, Error)]
pub enum TableError {
    /// Failed to read or write the file.
    #[error("Table IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV.
    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    /// File has no content at all.
    #[error("CSV file is empty")]
    EmptyFile,

    /// Header row is missing or blank.
    #[error("No headers found in CSV")]
    NoHeaders,
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors that invalidate the filter or merge stage.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Cutoff date is not ISO 8601.
    #[error("Invalid cutoff date '{0}', expected YYYY-MM-DD")]
    InvalidCutoff(String),

    /// Required column is absent from a table.
    #[error("Missing column '{column}' in {side} data")]
    MissingColumn { side: Side, column: String },

    /// Key columns on both sides must line up.
    #[error("Key column count mismatch: {participant} participant vs {evaluator} evaluator")]
    KeyMismatch { participant: usize, evaluator: usize },

    /// Duplicate respondent key under the `error` duplicate policy.
    #[error("Duplicate key '{key}' in {side} data")]
    DuplicateKey { side: Side, key: String },
}

// =============================================================================
// Render Errors
// =============================================================================

/// Fatal errors while producing reports. Row-level problems are not errors;
/// they are collected as skipped rows.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Output path unwritable.
    #[error("Report IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Input CSV unreadable.
    #[error("Report input error: {0}")]
    Table(#[from] TableError),

    /// PDF serialization failed.
    #[error("PDF error: {0}")]
    Pdf(String),
}

impl From<lopdf::Error> for RenderError {
    fn from(err: lopdf::Error) -> Self {
        RenderError::Pdf(err.to_string())
    }
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level error returned by [`crate::transform::pipeline::run`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for export API operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Result type for table IO.
pub type TableResult<T> = Result<T, TableError>;

/// Result type for filter and merge validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type for report rendering.
pub type RenderResult<T> = Result<T, RenderError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let table_err = TableError::EmptyFile;
        let pipeline_err: PipelineError = table_err.into();
        assert!(pipeline_err.to_string().contains("empty"));

        let validation_err = ValidationError::MissingColumn {
            side: Side::Evaluator,
            column: "RecordedDate".into(),
        };
        let pipeline_err: PipelineError = validation_err.into();
        let msg = pipeline_err.to_string();
        assert!(msg.contains("RecordedDate"));
        assert!(msg.contains("evaluator"));
    }

    #[test]
    fn test_fetch_error_format() {
        let err = FetchError::Timeout {
            survey_id: "SV_123".into(),
            seconds: 30,
        };
        let msg = err.to_string();
        assert!(msg.contains("SV_123"));
        assert!(msg.contains("30s"));
    }

    #[test]
    fn test_render_error_wraps_table_error() {
        let err: RenderError = TableError::NoHeaders.into();
        assert!(err.to_string().contains("No headers"));
    }
}
