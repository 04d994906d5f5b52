//! Per-respondent PDF reports.
//!
//! [`ReportRenderer::render_csv`] reads one processed CSV and writes one PDF
//! per row into the category's report directory:
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │  Intern - Supervisor Skill Survey Report   │
//! │               Ada Lovelace                 │
//! │ Respondent: Ada | Lovelace | Grace | Hopper│
//! │ Category: Complete                         │
//! │ ▇▇▇▇▇▇▇▇▇▇▇▇   Skill 1     +2 Supervisor   │
//! │ ...                                        │
//! │ Supervisor's Written Feedback              │
//! └────────────────────────────────────────────┘
//! ```
//!
//! Rows that cannot be rendered (no name, bad rating) are skipped and listed
//! in the returned [`RenderSummary`]; only IO and PDF failures abort.

pub mod chart;
pub mod pdf;

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RenderResult;
use crate::logs::{log_info, log_success, log_warning};
use crate::models::{cell, Category, Side, SurveySchema, Table};
use crate::parser::read_table;

pub use chart::{difference_label, BarChart, SkillBar};
pub use pdf::{Font, PdfWriter};

use pdf::{MARGIN, PAGE_WIDTH};

static UNSAFE_FILE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{Alphabetic}\p{Nd}_-]+").expect("valid regex"));

/// A row that was not rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    /// Zero-based data row in the input CSV.
    pub row: usize,
    pub reason: String,
}

/// Outcome of rendering one category.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSummary {
    pub category: Category,
    pub rendered: Vec<PathBuf>,
    pub skipped: Vec<SkippedRow>,
}

impl RenderSummary {
    pub fn summary(&self) -> String {
        format!(
            "{}: {} report(s), {} skipped",
            self.category,
            self.rendered.len(),
            self.skipped.len()
        )
    }
}

/// Everything printed on one report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportData {
    pub first_name: String,
    pub last_name: String,
    /// Raw key values of the side the name came from, ` | ` separated.
    pub respondent_key: String,
    pub bars: Vec<SkillBar>,
    pub strengths: Option<String>,
    pub improvements: Option<String>,
}

impl ReportData {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Title-case each word: a letter is upper-cased when the previous
/// character is not a letter, lower-cased otherwise.
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_alpha = false;
    for c in value.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// `{First}_{Last}` restricted to letters, digits, `_` and `-`. Accented
/// letters are kept.
pub fn report_stem(first: &str, last: &str) -> String {
    let joined = format!("{}_{}", first, last);
    UNSAFE_FILE_CHARS
        .replace_all(&joined, "_")
        .trim_matches('_')
        .to_string()
}

/// Blank or the literal `nan` count as absent.
fn feedback(value: Option<&str>) -> Option<String> {
    value
        .filter(|v| !v.eq_ignore_ascii_case("nan"))
        .map(str::to_string)
}

/// Renders processed CSVs to PDF.
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    schema: SurveySchema,
}

impl ReportRenderer {
    pub fn new(schema: SurveySchema) -> Self {
        Self { schema }
    }

    /// Column of `side` in a processed table. Names shared by both surveys
    /// carry the side's suffix there.
    fn column(table: &Table, side: Side, name: &str) -> Option<usize> {
        table
            .column_index(&format!("{}{}", name, side.column_suffix()))
            .or_else(|| table.column_index(name))
    }

    fn value<'a>(table: &Table, row: &'a [String], side: Side, name: &str) -> Option<&'a str> {
        Self::column(table, side, name).and_then(|i| cell(row, i))
    }

    fn ratings(&self, table: &Table, row: &[String], side: Side) -> Result<Vec<Option<f64>>, String> {
        let columns = &self.schema.side(side).rating_columns;
        let mut values = Vec::with_capacity(columns.len());
        for column in columns {
            let value = match Self::value(table, row, side, column) {
                None => None,
                Some(raw) => {
                    let v: f64 = raw
                        .parse()
                        .ok()
                        .filter(|v: &f64| v.is_finite())
                        .ok_or_else(|| format!("non-numeric rating '{}' in {}", raw, column))?;
                    if v < 0.0 || v > self.schema.rating_max {
                        return Err(format!(
                            "rating {} in {} outside 0-{}",
                            raw, column, self.schema.rating_max
                        ));
                    }
                    Some(v)
                }
            };
            values.push(value);
        }
        Ok(values)
    }

    /// Collect report content from one processed row, or the reason it
    /// cannot be rendered.
    pub fn extract(&self, table: &Table, row: &[String], category: Category) -> Result<ReportData, String> {
        let sides = category.sides();

        let named = sides.iter().find_map(|&side| {
            let names = &self.schema.side(side).name_columns;
            let first = names.first().and_then(|c| Self::value(table, row, side, c));
            let last = names.get(1).and_then(|c| Self::value(table, row, side, c));
            if first.is_none() && last.is_none() {
                None
            } else {
                Some((side, first.unwrap_or_default(), last.unwrap_or_default()))
            }
        });
        let (name_side, first, last) = named.ok_or_else(|| "no respondent name".to_string())?;

        let respondent_key = self
            .schema
            .side(name_side)
            .key_columns
            .iter()
            .map(|c| Self::value(table, row, name_side, c).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(" | ");

        let participant = if sides.contains(&Side::Participant) {
            self.ratings(table, row, Side::Participant)?
        } else {
            Vec::new()
        };
        let evaluator = if sides.contains(&Side::Evaluator) {
            self.ratings(table, row, Side::Evaluator)?
        } else {
            Vec::new()
        };
        let bars = (0..self.schema.skill_count())
            .map(|i| SkillBar {
                label: self.schema.skill_label(i),
                participant: participant.get(i).copied().flatten(),
                evaluator: evaluator.get(i).copied().flatten(),
            })
            .collect();

        let (strengths, improvements) = if sides.contains(&Side::Evaluator) {
            let e = &self.schema.evaluator;
            (
                feedback(e.strengths_column.as_deref().and_then(|c| Self::value(table, row, Side::Evaluator, c))),
                feedback(e.improvements_column.as_deref().and_then(|c| Self::value(table, row, Side::Evaluator, c))),
            )
        } else {
            (None, None)
        };

        Ok(ReportData {
            first_name: title_case(first),
            last_name: title_case(last),
            respondent_key,
            bars,
            strengths,
            improvements,
        })
    }

    fn chart_title(&self, category: Category) -> String {
        let (p, e) = (&self.schema.participant.label, &self.schema.evaluator.label);
        match category {
            Category::Complete => format!("Comparison of {} and {} Skill Ratings", p, e),
            Category::ParticipantOnly => format!("{} Ratings", p),
            Category::EvaluatorOnly => format!("{} Ratings", e),
        }
    }

    /// Serialize one report.
    pub fn render_pdf(&self, data: &ReportData, category: Category) -> RenderResult<Vec<u8>> {
        self.layout(data, category).to_bytes()
    }

    fn layout(&self, data: &ReportData, category: Category) -> PdfWriter {
        let (p_label, e_label) = (&self.schema.participant.label, &self.schema.evaluator.label);
        let mut doc = PdfWriter::new();

        doc.centered_line(Font::Bold, 16.0, &self.schema.report_title);
        doc.centered_line(Font::Bold, 14.0, &data.display_name());
        doc.advance(6.0);
        doc.line(MARGIN, Font::Regular, 10.0, &format!("Respondent: {}", data.respondent_key));
        doc.line(MARGIN, Font::Regular, 10.0, &format!("Category: {}", category.label()));
        doc.advance(8.0);

        BarChart {
            title: self.chart_title(category),
            bars: data.bars.clone(),
            max: self.schema.rating_max,
            participant_label: p_label.clone(),
            evaluator_label: e_label.clone(),
        }
        .draw(&mut doc);

        doc.advance(12.0);
        let width = PAGE_WIDTH - 2.0 * MARGIN;
        doc.line(MARGIN, Font::Bold, 11.0, &format!("{}'s Written Feedback", e_label));

        let (strengths, improvements) = if category == Category::ParticipantOnly {
            let missing = format!("No {} report provided.", e_label.to_lowercase());
            (missing.clone(), missing)
        } else {
            let default = format!("No feedback provided by the {}.", e_label.to_lowercase());
            (
                data.strengths.clone().unwrap_or_else(|| default.clone()),
                data.improvements.clone().unwrap_or(default),
            )
        };
        doc.line(MARGIN, Font::Bold, 9.0, "Strengths:");
        doc.paragraph(MARGIN, width, Font::Regular, 9.0, &strengths);
        doc.line(MARGIN, Font::Bold, 9.0, "Areas for Improvement:");
        doc.paragraph(MARGIN, width, Font::Regular, 9.0, &improvements);

        if category == Category::EvaluatorOnly {
            doc.advance(6.0);
            doc.line(
                MARGIN,
                Font::Regular,
                9.0,
                &format!("No {} report provided.", p_label.to_lowercase()),
            );
        }

        doc
    }

    /// Render every row of an already loaded processed table.
    pub fn render_table(&self, table: &Table, out_dir: &Path, category: Category) -> RenderResult<RenderSummary> {
        fs::create_dir_all(out_dir)?;

        let mut summary = RenderSummary {
            category,
            rendered: Vec::new(),
            skipped: Vec::new(),
        };
        let mut used: HashSet<String> = HashSet::new();

        for (i, row) in table.rows.iter().enumerate() {
            let data = match self.extract(table, row, category) {
                Ok(data) => data,
                Err(reason) => {
                    log_warning(format!("Skipping row {} of {}: {}", i + 1, category, reason));
                    summary.skipped.push(SkippedRow { row: i, reason });
                    continue;
                }
            };

            let mut stem = report_stem(&data.first_name, &data.last_name);
            if stem.is_empty() {
                stem = format!("respondent_{}", i + 1);
            }
            let mut candidate = stem.clone();
            let mut n = 2;
            while !used.insert(candidate.to_lowercase()) {
                candidate = format!("{}_{}", stem, n);
                n += 1;
            }

            let path = out_dir.join(format!("{}.pdf", candidate));
            self.layout(&data, category).save(&path)?;
            summary.rendered.push(path);
        }

        Ok(summary)
    }

    /// Render every row of the processed CSV at `csv_path` into `out_dir`.
    pub fn render_csv(&self, csv_path: &Path, out_dir: &Path, category: Category) -> RenderResult<RenderSummary> {
        log_info(format!("Generating {} reports from {}", category, csv_path.display()));
        let table = read_table(csv_path)?;
        let summary = self.render_table(&table, out_dir, category)?;
        log_success(summary.summary());
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JoinKey, MergedRecord, MergedTable};
    use crate::error::RenderError;

    fn schema() -> SurveySchema {
        let mut schema = SurveySchema::default();
        schema.participant.rating_columns = vec!["ssSelf_1".into(), "ssSelf_2".into()];
        schema.evaluator.rating_columns = vec!["ssSup_1".into(), "ssSup_2".into()];
        schema.participant.extra_columns = vec![];
        schema
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    /// Processed table built the same way the categorizer writes it.
    fn processed(category: Category, rows: Vec<(Option<Vec<String>>, Option<Vec<String>>)>) -> Table {
        let s = schema();
        let merged = MergedTable {
            participant_headers: s.participant.projected_columns(&s.timestamp_column),
            evaluator_headers: s.evaluator.projected_columns(&s.timestamp_column),
            records: rows
                .into_iter()
                .enumerate()
                .map(|(idx, (participant, evaluator))| MergedRecord {
                    idx,
                    key: JoinKey(vec![]),
                    participant,
                    evaluator,
                })
                .collect(),
        };
        merged.flatten(&merged.records, category.sides(), Some(category))
    }

    // RecordedDate, stuFirst, stuLast, supLinkFirst, supLinkLast, ssSelf_1, ssSelf_2
    fn participant(first: &str, last: &str, r1: &str, r2: &str) -> Option<Vec<String>> {
        Some(strings(&["2024-01-05", first, last, "Grace", "Hopper", r1, r2]))
    }

    // RecordedDate, firstNameIntern, lastNameIntern, supFirst, supLast, ssSup_1, ssSup_2, improveText, strengthText
    fn evaluator(first: &str, last: &str, r1: &str, r2: &str, strengths: &str) -> Option<Vec<String>> {
        Some(strings(&[
            "2024-01-06", first, last, "Grace", "Hopper", r1, r2, "Ask more questions", strengths,
        ]))
    }

    #[test]
    fn test_title_case_and_stem() {
        assert_eq!(title_case("ada LOVELACE"), "Ada Lovelace");
        assert_eq!(title_case("o'brien"), "O'Brien");
        assert_eq!(report_stem("Mary Ann", "O'Brien"), "Mary_Ann_O_Brien");
        assert_eq!(report_stem("", ""), "");
        assert_eq!(report_stem("José", "García"), "José_García");
        assert_eq!(report_stem("Łukasz", "Nguyễn"), "Łukasz_Nguyễn");
    }

    #[test]
    fn test_extract_complete_row() {
        let table = processed(
            Category::Complete,
            vec![(participant("ada", "lovelace", "3", "6"), evaluator("Ada", "Lovelace", "5", "6", "Curious"))],
        );
        let renderer = ReportRenderer::new(schema());
        let data = renderer.extract(&table, &table.rows[0], Category::Complete).unwrap();

        assert_eq!(data.display_name(), "Ada Lovelace");
        assert_eq!(data.respondent_key, "ada | lovelace | Grace | Hopper");
        assert_eq!(data.bars[0].difference(), Some(2.0));
        assert_eq!(data.bars[1].difference(), Some(0.0));
        assert_eq!(data.strengths.as_deref(), Some("Curious"));
        assert_eq!(data.improvements.as_deref(), Some("Ask more questions"));
    }

    #[test]
    fn test_malformed_rows_are_reported() {
        let renderer = ReportRenderer::new(schema());
        let table = processed(
            Category::ParticipantOnly,
            vec![
                (participant("", "", "3", "4"), None),
                (participant("Bo", "Li", "high", "4"), None),
                (participant("Cy", "Ng", "9", "4"), None),
                (participant("Di", "Ro", "", "4"), None),
            ],
        );
        let dir = tempfile::tempdir().unwrap();
        let summary = renderer
            .render_table(&table, dir.path(), Category::ParticipantOnly)
            .unwrap();

        assert_eq!(summary.rendered, vec![dir.path().join("Di_Ro.pdf")]);
        let skipped: Vec<usize> = summary.skipped.iter().map(|s| s.row).collect();
        assert_eq!(skipped, vec![0, 1, 2]);
        assert_eq!(summary.skipped[0].reason, "no respondent name");
        assert!(summary.skipped[1].reason.contains("non-numeric"));
        assert!(summary.skipped[2].reason.contains("outside"));
    }

    #[test]
    fn test_rendered_pdf_contains_key_and_category() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("processed_completed_data.csv");
        let table = processed(
            Category::Complete,
            vec![(participant("Ada", "Lovelace", "3", "6"), evaluator("Ada", "Lovelace", "5", "6", ""))],
        );
        crate::parser::write_table(&table, &csv).unwrap();

        let out = dir.path().join("complete_reports");
        let summary = ReportRenderer::new(schema())
            .render_csv(&csv, &out, Category::Complete)
            .unwrap();
        assert_eq!(summary.rendered, vec![out.join("Ada_Lovelace.pdf")]);

        let bytes = fs::read(&summary.rendered[0]).unwrap();
        let text = pdf::extract_all_text(&bytes);
        assert!(text.contains("Ada Lovelace"));
        assert!(text.contains("Respondent: Ada | Lovelace | Grace | Hopper"));
        assert!(text.contains("Category: Complete"));
        assert!(text.contains("+2 Supervisor"));
        assert!(text.contains("No feedback provided by the supervisor."));
    }

    #[test]
    fn test_names_outside_win_ansi_are_readable() {
        let table = processed(
            Category::ParticipantOnly,
            vec![(
                Some(strings(&["2024-01-05", "Łukasz", "Nguyễn", "José", "Müller", "3", "4"])),
                None,
            )],
        );
        let dir = tempfile::tempdir().unwrap();
        let summary = ReportRenderer::new(schema())
            .render_table(&table, dir.path(), Category::ParticipantOnly)
            .unwrap();
        assert_eq!(summary.rendered, vec![dir.path().join("Łukasz_Nguyễn.pdf")]);

        let text = pdf::extract_all_text(&fs::read(&summary.rendered[0]).unwrap());
        assert!(text.contains("Lukasz Nguyen"));
        assert!(text.contains("Respondent: Lukasz | Nguyen | José | Müller"));
        assert!(!text.contains("&#"));
    }

    #[test]
    fn test_unwritable_output_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("complete_reports");
        fs::write(&blocker, "not a directory").unwrap();
        let table = processed(
            Category::Complete,
            vec![(participant("Ada", "Lovelace", "3", "6"), evaluator("Ada", "Lovelace", "5", "6", ""))],
        );

        let err = ReportRenderer::new(schema())
            .render_table(&table, &blocker, Category::Complete)
            .unwrap_err();
        assert!(matches!(err, RenderError::Io(_)));

        let err = ReportRenderer::new(schema())
            .render_table(&table, &blocker.join("nested"), Category::Complete)
            .unwrap_err();
        assert!(matches!(err, RenderError::Io(_)));
    }

    #[test]
    fn test_evaluator_only_report() {
        let table = processed(
            Category::EvaluatorOnly,
            vec![(None, evaluator("Eve", "Park", "4", "4", "Reliable"))],
        );
        let renderer = ReportRenderer::new(schema());
        let data = renderer.extract(&table, &table.rows[0], Category::EvaluatorOnly).unwrap();
        assert!(data.bars.iter().all(|b| b.participant.is_none()));

        let text = pdf::extract_all_text(&renderer.render_pdf(&data, Category::EvaluatorOnly).unwrap());
        assert!(text.contains("Category: Evaluator only"));
        assert!(text.contains("Reliable"));
        assert!(text.contains("No student report provided."));
    }

    #[test]
    fn test_name_collisions_get_suffix() {
        let table = processed(
            Category::ParticipantOnly,
            vec![
                (participant("Ada", "Lovelace", "1", "2"), None),
                (participant("ADA", "lovelace", "3", "4"), None),
            ],
        );
        let dir = tempfile::tempdir().unwrap();
        let summary = ReportRenderer::new(schema())
            .render_table(&table, dir.path(), Category::ParticipantOnly)
            .unwrap();
        assert_eq!(
            summary.rendered,
            vec![dir.path().join("Ada_Lovelace.pdf"), dir.path().join("Ada_Lovelace_2.pdf")]
        );
    }

    #[test]
    fn test_missing_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReportRenderer::new(schema())
            .render_csv(&dir.path().join("nope.csv"), dir.path(), Category::Complete)
            .unwrap_err();
        assert!(matches!(err, RenderError::Table(_)));
    }
}
