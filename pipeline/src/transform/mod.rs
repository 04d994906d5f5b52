//! Table stages of the pipeline.
//!
//! - [`filter`] - cutoff-date filter per survey
//! - [`merge`] - outer join on the respondent key
//! - [`categorize`] - completeness split and processed CSVs
//! - [`pipeline`] - stage orchestration

pub mod categorize;
pub mod filter;
pub mod merge;
pub mod pipeline;

pub use categorize::{Categorized, Categorizer};
pub use filter::{DateFilter, FilterStats, FilteredTable};
pub use merge::{DuplicatePolicy, Merger};
pub use pipeline::{process, run, RunSummary, Stages};
