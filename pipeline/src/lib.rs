//! # Skillsurvey - intern / supervisor skill survey reports
//!
//! Skillsurvey downloads the responses of two related surveys (an intern's
//! self-assessment and their supervisor's evaluation) from Qualtrics,
//! pairs them per intern and renders one PDF report per intern.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌────────────┐   ┌──────────┐
//! │  Fetch   │──▶│  Filter  │──▶│  Merge   │──▶│ Categorize │──▶│  Report  │
//! │ (export) │   │ (cutoff) │   │ (outer)  │   │  (3 CSVs)  │   │  (PDFs)  │
//! └──────────┘   └──────────┘   └──────────┘   └────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use skillsurvey::{run, Config};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let config = Config::from_env().unwrap();
//!     let summary = run(&config).await.unwrap();
//!     println!("Wrote {} reports", summary.reports_written());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per stage
//! - [`config`] - Environment configuration and filesystem layout
//! - [`logs`] - Progress logging on top of `tracing`
//! - [`models`] - Tables, keys, merged records, survey schema
//! - [`parser`] - CSV reading and writing with auto-detection
//! - [`validation`] - Dates, required columns, key normalization
//! - [`fetch`] - Survey export API client
//! - [`transform`] - Filter, merge, categorize and the pipeline
//! - [`report`] - PDF report rendering

// Core modules
pub mod config;
pub mod error;
pub mod logs;
pub mod models;

// Parsing
pub mod parser;

// Validation
pub mod validation;

// Survey platform
pub mod fetch;

// Transformation
pub mod transform;

// Reports
pub mod report;

// =============================================================================
// Re-exports - Errors
// =============================================================================

pub use error::{
    ConfigError,
    FetchError,
    TableError,
    ValidationError,
    RenderError,
    PipelineError,
    PipelineResult,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{ApiConfig, Config, DataLayout};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Category,
    CategorizedRecord,
    JoinKey,
    MergedRecord,
    MergedTable,
    Side,
    SideSchema,
    SurveySchema,
    Table,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    parse_csv_file_auto,
    parse_bytes_auto,
    read_table,
    write_table,
    detect_encoding,
    detect_delimiter,
    decode_content,
    ParseResult,
};

// =============================================================================
// Re-exports - Stages
// =============================================================================

pub use fetch::SurveyClient;

pub use transform::{
    Categorized,
    Categorizer,
    DateFilter,
    DuplicatePolicy,
    FilteredTable,
    Merger,
};

pub use report::{RenderSummary, ReportRenderer, SkippedRow};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{process, run, RunSummary, Stages};
