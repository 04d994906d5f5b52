//! Domain models for the survey pipeline.
//!
//! - [`Table`] - header + string rows, the shape of every CSV the pipeline touches
//! - [`Side`] - which survey a row came from
//! - [`JoinKey`] - normalized composite respondent key
//! - [`MergedRecord`] / [`MergedTable`] - output of the outer join
//! - [`Category`] / [`CategorizedRecord`] - completeness partition
//! - [`SurveySchema`] - column layout of both surveys

pub mod schema;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub use schema::{SideSchema, SurveySchema};

// =============================================================================
// Side
// =============================================================================

/// Which of the two related surveys a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The respondent rating themselves (the intern survey).
    Participant,
    /// Someone rating the participant (the supervisor survey).
    Evaluator,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Participant, Side::Evaluator];

    /// Suffix appended to a column name present on both sides.
    pub fn column_suffix(self) -> &'static str {
        match self {
            Side::Participant => "_participant",
            Side::Evaluator => "_evaluator",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Participant => "participant",
            Side::Evaluator => "evaluator",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "participant" | "student" | "intern" => Ok(Side::Participant),
            "evaluator" | "supervisor" => Ok(Side::Evaluator),
            other => Err(format!("unknown survey side '{}'", other)),
        }
    }
}

// =============================================================================
// Category
// =============================================================================

/// Data completeness of a respondent pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    /// Both surveys present.
    Complete,
    /// Only the participant answered.
    ParticipantOnly,
    /// Only the evaluator answered.
    EvaluatorOnly,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::Complete,
        Category::ParticipantOnly,
        Category::EvaluatorOnly,
    ];

    /// Human-readable label, printed on reports and stored in the `category` column.
    pub fn label(self) -> &'static str {
        match self {
            Category::Complete => "Complete",
            Category::ParticipantOnly => "Participant only",
            Category::EvaluatorOnly => "Evaluator only",
        }
    }

    /// File name of the processed CSV for this category.
    pub fn processed_file_name(self) -> &'static str {
        match self {
            Category::Complete => "processed_completed_data.csv",
            Category::ParticipantOnly => "processed_only_participant_data.csv",
            Category::EvaluatorOnly => "processed_only_evaluator_data.csv",
        }
    }

    /// Directory name (under the reports root) for this category's PDFs.
    pub fn report_dir_name(self) -> &'static str {
        match self {
            Category::Complete => "complete_reports",
            Category::ParticipantOnly => "only_participant_reports",
            Category::EvaluatorOnly => "only_evaluator_reports",
        }
    }

    /// Sides whose columns are carried by records of this category.
    pub fn sides(self) -> &'static [Side] {
        match self {
            Category::Complete => &Side::ALL,
            Category::ParticipantOnly => &[Side::Participant],
            Category::EvaluatorOnly => &[Side::Evaluator],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        match normalized.as_str() {
            "complete" => Ok(Category::Complete),
            "participantonly" | "onlyparticipant" => Ok(Category::ParticipantOnly),
            "evaluatoronly" | "onlyevaluator" => Ok(Category::EvaluatorOnly),
            _ => Err(format!("unknown category '{}'", s)),
        }
    }
}

// =============================================================================
// Table
// =============================================================================

/// A CSV table held in memory. Every row has exactly `headers.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding or truncating it to the header width.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Non-blank value of `name` in `row`.
    pub fn value<'a>(&self, row: &'a [String], name: &str) -> Option<&'a str> {
        self.column_index(name).and_then(|i| cell(row, i))
    }

    /// Keep only `columns`, in that order. Unknown columns become blank.
    pub fn project(&self, columns: &[String]) -> Table {
        let indices: Vec<Option<usize>> = columns.iter().map(|c| self.column_index(c)).collect();
        let mut projected = Table::new(columns.to_vec());
        for row in &self.rows {
            let cells = indices
                .iter()
                .map(|i| i.and_then(|i| row.get(i).cloned()).unwrap_or_default())
                .collect();
            projected.rows.push(cells);
        }
        projected
    }

    /// Rows as JSON objects, blank cells as `null`.
    pub fn to_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let mut obj = Map::new();
                for (i, header) in self.headers.iter().enumerate() {
                    let value = cell(row, i).map(Value::from).unwrap_or(Value::Null);
                    obj.insert(header.clone(), value);
                }
                Value::Object(obj)
            })
            .collect()
    }
}

/// Trimmed cell value, `None` when blank or out of range.
pub fn cell(row: &[String], index: usize) -> Option<&str> {
    row.get(index).map(|s| s.trim()).filter(|s| !s.is_empty())
}

// =============================================================================
// Join Key
// =============================================================================

/// Normalized composite respondent key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JoinKey(pub Vec<String>);

impl JoinKey {
    /// True when no part is blank. Incomplete keys never match.
    pub fn is_complete(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|p| !p.is_empty())
    }

    /// Leading `len` parts, used for name-only reconciliation.
    pub fn prefix(&self, len: usize) -> JoinKey {
        JoinKey(self.0.iter().take(len).cloned().collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for JoinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" | "))
    }
}

// =============================================================================
// Merged Records
// =============================================================================

/// One row of the outer join. At least one side is always present.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord {
    /// Position in the merged table.
    pub idx: usize,
    pub key: JoinKey,
    pub participant: Option<Vec<String>>,
    pub evaluator: Option<Vec<String>>,
}

impl MergedRecord {
    pub fn side(&self, side: Side) -> Option<&[String]> {
        match side {
            Side::Participant => self.participant.as_deref(),
            Side::Evaluator => self.evaluator.as_deref(),
        }
    }

    /// Category implied by which sides are present.
    pub fn category(&self) -> Category {
        match (&self.participant, &self.evaluator) {
            (Some(_), Some(_)) => Category::Complete,
            (Some(_), None) => Category::ParticipantOnly,
            (None, _) => Category::EvaluatorOnly,
        }
    }
}

/// Output of the merge stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedTable {
    pub participant_headers: Vec<String>,
    pub evaluator_headers: Vec<String>,
    pub records: Vec<MergedRecord>,
}

impl MergedTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn headers(&self, side: Side) -> &[String] {
        match side {
            Side::Participant => &self.participant_headers,
            Side::Evaluator => &self.evaluator_headers,
        }
    }

    /// Column names of `side` in flattened output. Names present on both
    /// sides get the side's suffix.
    pub fn column_names(&self, side: Side) -> Vec<String> {
        let other = match side {
            Side::Participant => &self.evaluator_headers,
            Side::Evaluator => &self.participant_headers,
        };
        self.headers(side)
            .iter()
            .map(|h| {
                if other.contains(h) {
                    format!("{}{}", h, side.column_suffix())
                } else {
                    h.clone()
                }
            })
            .collect()
    }

    /// Flatten the whole join: participant columns then evaluator columns,
    /// blanks for a missing side.
    pub fn to_table(&self) -> Table {
        self.flatten(self.records.iter(), &Side::ALL, None)
    }

    /// Flatten `records` keeping only `sides`. When `category` is given, a
    /// leading `category` column and the merged `idx` are added.
    pub fn flatten<'a>(
        &self,
        records: impl IntoIterator<Item = &'a MergedRecord>,
        sides: &[Side],
        category: Option<Category>,
    ) -> Table {
        let mut headers = Vec::new();
        if category.is_some() {
            headers.push(CATEGORY_COLUMN.to_string());
            headers.push(IDX_COLUMN.to_string());
        }
        for side in sides {
            headers.extend(self.column_names(*side));
        }

        let mut table = Table::new(headers);
        for record in records {
            let mut row = Vec::with_capacity(table.headers.len());
            if let Some(category) = category {
                row.push(category.label().to_string());
                row.push(record.idx.to_string());
            }
            for side in sides {
                let width = self.headers(*side).len();
                match record.side(*side) {
                    Some(values) => row.extend(values.iter().cloned()),
                    None => row.extend(std::iter::repeat(String::new()).take(width)),
                }
            }
            table.push_row(row);
        }
        table
    }
}

/// Leading column of processed CSVs holding the category label.
pub const CATEGORY_COLUMN: &str = "category";

/// Column holding a record's position in the merged table.
pub const IDX_COLUMN: &str = "idx";

/// A merged record tagged with its final category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorizedRecord {
    pub category: Category,
    pub record: MergedRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merged() -> MergedTable {
        MergedTable {
            participant_headers: vec!["RecordedDate".into(), "stuFirst".into()],
            evaluator_headers: vec!["RecordedDate".into(), "supFirst".into()],
            records: vec![
                MergedRecord {
                    idx: 0,
                    key: JoinKey(vec!["ada".into()]),
                    participant: Some(vec!["2024-01-05".into(), "ada".into()]),
                    evaluator: None,
                },
                MergedRecord {
                    idx: 1,
                    key: JoinKey(vec!["bob".into()]),
                    participant: None,
                    evaluator: Some(vec!["2024-01-06".into(), "eve".into()]),
                },
            ],
        }
    }

    #[test]
    fn test_colliding_columns_are_suffixed() {
        let table = merged().to_table();
        assert_eq!(
            table.headers,
            vec![
                "RecordedDate_participant",
                "stuFirst",
                "RecordedDate_evaluator",
                "supFirst"
            ]
        );
        assert_eq!(table.rows[0], vec!["2024-01-05", "ada", "", ""]);
        assert_eq!(table.rows[1], vec!["", "", "2024-01-06", "eve"]);
    }

    #[test]
    fn test_flatten_with_category_columns() {
        let m = merged();
        let table = m.flatten(&m.records[1..], &[Side::Evaluator], Some(Category::EvaluatorOnly));
        assert_eq!(table.headers[0], CATEGORY_COLUMN);
        assert_eq!(table.headers[1], IDX_COLUMN);
        assert_eq!(table.rows[0][0], "Evaluator only");
        assert_eq!(table.rows[0][1], "1");
    }

    #[test]
    fn test_record_category() {
        let m = merged();
        assert_eq!(m.records[0].category(), Category::ParticipantOnly);
        assert_eq!(m.records[1].category(), Category::EvaluatorOnly);
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("Complete".parse::<Category>(), Ok(Category::Complete));
        assert_eq!("participant only".parse::<Category>(), Ok(Category::ParticipantOnly));
        assert_eq!("only_evaluator".parse::<Category>(), Ok(Category::EvaluatorOnly));
        assert!("partial".parse::<Category>().is_err());
    }

    #[test]
    fn test_join_key_completeness() {
        assert!(JoinKey(vec!["a".into(), "b".into()]).is_complete());
        assert!(!JoinKey(vec!["a".into(), "".into()]).is_complete());
        assert!(!JoinKey(vec![]).is_complete());
    }

    #[test]
    fn test_table_project_and_records() {
        let mut table = Table::new(vec!["a".into(), "b".into()]);
        table.push_row(vec!["1".into()]);
        let projected = table.project(&["b".to_string(), "a".to_string()]);
        assert_eq!(projected.rows[0], vec!["", "1"]);

        let records = table.to_records();
        assert_eq!(records[0]["a"], "1");
        assert!(records[0]["b"].is_null());
    }
}
