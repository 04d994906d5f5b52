//! End-to-end survey pipeline.
//!
//! Stages run strictly in order, each consuming the previous stage's value:
//!
//! ```text
//! fetch ─► filter ─► merge ─► categorize ─► render
//! (per side) (per side)        3 CSVs      3 report dirs
//! ```
//!
//! Every stage is also exposed on its own so the CLI can run one at a time.
//!
//! # Example
//!
//! ```rust,ignore
//! use skillsurvey::{config::Config, transform::pipeline::run};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let summary = run(&config).await?;
//!     println!("{} reports", summary.reports_written());
//!     Ok(())
//! }
//! ```

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::categorize::{Categorized, Categorizer};
use super::filter::{DateFilter, FilterStats, FilteredTable};
use super::merge::Merger;
use crate::config::Config;
use crate::error::PipelineResult;
use crate::fetch::SurveyClient;
use crate::logs::{log_info, log_success, log_warning};
use crate::models::{Category, MergedTable, Side, Table};
use crate::parser::read_table;
use crate::report::{RenderSummary, ReportRenderer};

/// Totals of one run, per stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub participant: FilterCounts,
    pub evaluator: FilterCounts,
    pub merged: usize,
    pub complete: usize,
    pub participant_only: usize,
    pub evaluator_only: usize,
    pub reconciled: usize,
    pub reports: Vec<ReportCounts>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FilterCounts {
    pub raw: usize,
    pub kept: usize,
}

impl From<FilterStats> for FilterCounts {
    fn from(stats: FilterStats) -> Self {
        Self {
            raw: stats.raw_rows,
            kept: stats.kept,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportCounts {
    pub category: Category,
    pub rendered: usize,
    pub skipped: usize,
}

impl From<&RenderSummary> for ReportCounts {
    fn from(summary: &RenderSummary) -> Self {
        Self {
            category: summary.category,
            rendered: summary.rendered.len(),
            skipped: summary.skipped.len(),
        }
    }
}

impl RunSummary {
    pub fn reports_written(&self) -> usize {
        self.reports.iter().map(|r| r.rendered).sum()
    }

    pub fn rows_skipped(&self) -> usize {
        self.reports.iter().map(|r| r.skipped).sum()
    }
}

/// Stage objects built from one [`Config`]. Building them validates the
/// cutoffs and key layout, so a bad configuration fails before any request.
pub struct Stages {
    pub participant_filter: DateFilter,
    pub evaluator_filter: DateFilter,
    pub merger: Merger,
    pub categorizer: Categorizer,
    pub renderer: ReportRenderer,
}

impl Stages {
    pub fn new(config: &Config) -> PipelineResult<Self> {
        let schema = &config.schema;
        Ok(Self {
            participant_filter: DateFilter::new(Side::Participant, config.cutoff(Side::Participant), schema)?,
            evaluator_filter: DateFilter::new(Side::Evaluator, config.cutoff(Side::Evaluator), schema)?,
            merger: Merger::new(schema, config.duplicate_policy)?,
            categorizer: Categorizer::new(schema.reconcile_key_len),
            renderer: ReportRenderer::new(schema.clone()),
        })
    }

    pub fn filter(&self, side: Side) -> &DateFilter {
        match side {
            Side::Participant => &self.participant_filter,
            Side::Evaluator => &self.evaluator_filter,
        }
    }
}

/// Download the export of one side into the raw data directory.
pub async fn fetch(config: &Config, side: Side) -> PipelineResult<PathBuf> {
    let client = SurveyClient::new(config.api.clone());
    let out_dir = config.layout.raw_dir().join(side.as_str());
    Ok(client.download_survey(config.survey_id(side), &out_dir).await?)
}

/// Filter one side's raw export into its intermediate CSV.
pub fn filter(config: &Config, stages: &Stages, side: Side, raw_path: &Path) -> PipelineResult<FilteredTable> {
    stages
        .filter(side)
        .run(raw_path, &config.layout.filtered_path(side))
}

/// Load both intermediate CSVs written by [`filter`].
pub fn load_filtered(config: &Config) -> PipelineResult<(Table, Table)> {
    Ok((
        read_table(config.layout.filtered_path(Side::Participant))?,
        read_table(config.layout.filtered_path(Side::Evaluator))?,
    ))
}

/// Join the filtered tables and write `merged_data.csv`.
pub fn merge(config: &Config, stages: &Stages, participant: &Table, evaluator: &Table) -> PipelineResult<MergedTable> {
    stages
        .merger
        .run(participant, evaluator, &config.layout.merged_path())
}

/// Split the merged records and write the processed CSVs.
pub fn categorize(config: &Config, stages: &Stages, merged: &MergedTable) -> PipelineResult<Categorized> {
    let (categorized, _) = stages.categorizer.run(merged, &config.layout)?;
    Ok(categorized)
}

/// Render the reports of one category from its processed CSV.
pub fn render(config: &Config, stages: &Stages, category: Category) -> PipelineResult<RenderSummary> {
    Ok(stages.renderer.render_csv(
        &config.layout.processed_path(category),
        &config.layout.report_dir(category),
        category,
    )?)
}

/// Everything after the download: filter both raw exports, merge,
/// categorize and render all three categories.
pub fn process(config: &Config, participant_raw: &Path, evaluator_raw: &Path) -> PipelineResult<RunSummary> {
    let stages = Stages::new(config)?;
    process_with(config, &stages, participant_raw, evaluator_raw)
}

fn process_with(
    config: &Config,
    stages: &Stages,
    participant_raw: &Path,
    evaluator_raw: &Path,
) -> PipelineResult<RunSummary> {
    log_info("🔎 Filtering by date...");
    let participant = filter(config, stages, Side::Participant, participant_raw)?;
    let evaluator = filter(config, stages, Side::Evaluator, evaluator_raw)?;

    log_info("🔗 Merging surveys...");
    let merged = merge(config, stages, &participant.table, &evaluator.table)?;

    log_info("🗂️  Categorizing records...");
    let categorized = categorize(config, stages, &merged)?;

    log_info("📄 Generating reports...");
    let mut reports = Vec::with_capacity(Category::ALL.len());
    for category in Category::ALL {
        let summary = render(config, stages, category)?;
        reports.push(ReportCounts::from(&summary));
    }

    let summary = RunSummary {
        participant: participant.stats.into(),
        evaluator: evaluator.stats.into(),
        merged: merged.len(),
        complete: categorized.complete.len(),
        participant_only: categorized.participant_only.len(),
        evaluator_only: categorized.evaluator_only.len(),
        reconciled: categorized.reconciled,
        reports,
    };
    if summary.rows_skipped() > 0 {
        log_warning(format!("{} row(s) could not be rendered", summary.rows_skipped()));
    }
    log_success(format!("Done: {} reports written", summary.reports_written()));
    Ok(summary)
}

/// Full run: download both surveys, then [`process`].
pub async fn run(config: &Config) -> PipelineResult<RunSummary> {
    let stages = Stages::new(config)?;

    log_info("📥 Downloading survey exports...");
    let participant_raw = fetch(config, Side::Participant).await?;
    let evaluator_raw = fetch(config, Side::Evaluator).await?;

    process_with(config, &stages, &participant_raw, &evaluator_raw)
}
