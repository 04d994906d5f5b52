//! Cutoff-date filter for raw survey exports.

use chrono::NaiveDateTime;
use std::path::Path;

use crate::error::{PipelineResult, ValidationResult};
use crate::logs::{log_info, log_info_indent, log_success};
use crate::models::{cell, Side, SurveySchema, Table};
use crate::parser::{parse_csv_file_auto, write_table};
use crate::validation::{parse_cutoff, parse_timestamp, require_columns};

/// Value of the finished column for completed responses.
const FINISHED: &str = "1";

/// Counters for one filter pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub raw_rows: usize,
    pub kept: usize,
    pub before_cutoff: usize,
    pub unfinished: usize,
    pub bad_timestamp: usize,
}

/// Filtered rows of one side.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredTable {
    pub side: Side,
    pub table: Table,
    pub stats: FilterStats,
}

/// Keeps responses recorded at or after a cutoff, projected onto the
/// columns the later stages read.
#[derive(Debug, Clone)]
pub struct DateFilter {
    side: Side,
    cutoff: NaiveDateTime,
    timestamp_column: String,
    finished_column: Option<String>,
    metadata_rows: usize,
    columns: Vec<String>,
}

impl DateFilter {
    /// Fails if `cutoff` is not an ISO 8601 date or date-time.
    pub fn new(side: Side, cutoff: &str, schema: &SurveySchema) -> ValidationResult<Self> {
        Ok(Self {
            side,
            cutoff: parse_cutoff(cutoff)?,
            timestamp_column: schema.timestamp_column.clone(),
            finished_column: schema.finished_column.clone(),
            metadata_rows: schema.metadata_rows,
            columns: schema.side(side).projected_columns(&schema.timestamp_column),
        })
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn cutoff(&self) -> NaiveDateTime {
        self.cutoff
    }

    /// Filter a raw table. Output is sorted by timestamp, oldest first.
    pub fn filter(&self, raw: &Table) -> ValidationResult<FilteredTable> {
        let mut required = self.columns.clone();
        required.extend(self.finished_column.iter().cloned());
        require_columns(raw, self.side, &required)?;

        let ts_index = raw.column_index(&self.timestamp_column);
        let finished_index = self.finished_column.as_deref().and_then(|c| raw.column_index(c));

        let mut stats = FilterStats {
            raw_rows: raw.len(),
            ..FilterStats::default()
        };
        let mut kept: Vec<(NaiveDateTime, &Vec<String>)> = Vec::new();

        for row in &raw.rows {
            if let Some(i) = finished_index {
                if cell(row, i) != Some(FINISHED) {
                    stats.unfinished += 1;
                    continue;
                }
            }
            let recorded = ts_index
                .and_then(|i| cell(row, i))
                .and_then(parse_timestamp);
            match recorded {
                None => stats.bad_timestamp += 1,
                Some(ts) if ts < self.cutoff => stats.before_cutoff += 1,
                Some(ts) => kept.push((ts, row)),
            }
        }

        kept.sort_by_key(|(ts, _)| *ts);
        stats.kept = kept.len();

        let mut selected = Table::new(raw.headers.clone());
        selected.rows = kept.into_iter().map(|(_, row)| row.clone()).collect();

        Ok(FilteredTable {
            side: self.side,
            table: selected.project(&self.columns),
            stats,
        })
    }

    /// Load a raw export, skipping the metadata rows under its header.
    pub fn load(&self, raw_path: &Path) -> PipelineResult<Table> {
        let parsed = parse_csv_file_auto(raw_path, self.metadata_rows)?;
        log_info_indent(
            format!(
                "Loaded {} rows ({}, delimiter '{}')",
                parsed.table.len(),
                parsed.encoding,
                parsed.delimiter.escape_default()
            ),
            1,
        );
        Ok(parsed.table)
    }

    /// Load, filter and write the intermediate CSV for this side.
    pub fn run(&self, raw_path: &Path, out_path: &Path) -> PipelineResult<FilteredTable> {
        log_info(format!(
            "Filtering {} responses recorded since {}",
            self.side, self.cutoff
        ));
        let raw = self.load(raw_path)?;
        let filtered = self.filter(&raw)?;
        write_table(&filtered.table, out_path)?;

        let s = filtered.stats;
        log_info_indent(
            format!(
                "{} before cutoff, {} unfinished, {} unreadable timestamps",
                s.before_cutoff, s.unfinished, s.bad_timestamp
            ),
            1,
        );
        log_success(format!("Kept {} of {} {} responses", s.kept, s.raw_rows, self.side));
        Ok(filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::parser::read_table;

    fn schema() -> SurveySchema {
        let mut schema = SurveySchema::default();
        schema.participant.key_columns = vec!["stuFirst".into(), "stuLast".into()];
        schema.participant.name_columns = vec!["stuFirst".into(), "stuLast".into()];
        schema.participant.rating_columns = vec!["ssSelf_1".into()];
        schema.participant.extra_columns = vec![];
        schema.reconcile_key_len = 1;
        schema
    }

    fn raw() -> Table {
        let mut table = Table::new(
            ["RecordedDate", "Finished", "stuFirst", "stuLast", "ssSelf_1", "Q99"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        for row in [
            ["2024-01-20 08:00:00", "1", "Bob", "Stone", "4", "x"],
            ["2024-01-05 10:00:00", "1", "A", "Smith", "6", "x"],
            ["2023-12-31 23:59:59", "1", "Old", "Timer", "5", "x"],
            ["2024-01-06 10:00:00", "0", "Half", "Done", "", "x"],
            ["not a date", "1", "Bad", "Date", "3", "x"],
        ] {
            table.push_row(row.iter().map(|s| s.to_string()).collect());
        }
        table
    }

    fn first_names(filtered: &FilteredTable) -> Vec<&str> {
        let t = &filtered.table;
        t.rows.iter().filter_map(|r| t.value(r, "stuFirst")).collect()
    }

    #[test]
    fn test_cutoff_keeps_row_on_or_after() {
        let filter = DateFilter::new(Side::Participant, "2024-01-01", &schema()).unwrap();
        let filtered = filter.filter(&raw()).unwrap();
        assert_eq!(first_names(&filtered), vec!["A", "Bob"]);
        assert_eq!(
            filtered.stats,
            FilterStats {
                raw_rows: 5,
                kept: 2,
                before_cutoff: 1,
                unfinished: 1,
                bad_timestamp: 1,
            }
        );
    }

    #[test]
    fn test_later_cutoff_drops_row() {
        let filter = DateFilter::new(Side::Participant, "2024-02-01", &schema()).unwrap();
        let filtered = filter.filter(&raw()).unwrap();
        assert!(filtered.table.is_empty());
        assert_eq!(filtered.stats.before_cutoff, 3);
    }

    #[test]
    fn test_filtered_rows_all_after_cutoff() {
        let filter = DateFilter::new(Side::Participant, "2024-01-06", &schema()).unwrap();
        let filtered = filter.filter(&raw()).unwrap();
        for row in &filtered.table.rows {
            let ts = parse_timestamp(&row[0]).unwrap();
            assert!(ts >= filter.cutoff());
        }
        assert_eq!(first_names(&filtered), vec!["Bob"]);
    }

    #[test]
    fn test_projection_drops_unused_columns() {
        let filter = DateFilter::new(Side::Participant, "2024-01-01", &schema()).unwrap();
        let filtered = filter.filter(&raw()).unwrap();
        assert_eq!(
            filtered.table.headers,
            vec!["RecordedDate", "stuFirst", "stuLast", "ssSelf_1"]
        );
    }

    #[test]
    fn test_invalid_cutoff_rejected() {
        let err = DateFilter::new(Side::Participant, "01/01/2024", &schema()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidCutoff(_)));
    }

    #[test]
    fn test_missing_timestamp_column_is_fatal() {
        let filter = DateFilter::new(Side::Participant, "2024-01-01", &schema()).unwrap();
        let table = raw().project(&["Finished".to_string(), "stuFirst".to_string()]);
        let err = filter.filter(&table).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MissingColumn { side: Side::Participant, ref column } if column == "RecordedDate"
        ));
    }

    #[test]
    fn test_run_skips_metadata_rows_and_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let raw_path = dir.path().join("raw.csv");
        let out_path = dir.path().join("out/participant_data_filtered_by_date.csv");
        std::fs::write(
            &raw_path,
            concat!(
                "RecordedDate,Finished,stuFirst,stuLast,ssSelf_1\n",
                "Recorded Date,Finished,First name,Last name,Skill 1\n",
                "\"{\"\"ImportId\"\":\"\"recordedDate\"\"}\",x,x,x,x\n",
                "2024-01-05 10:00:00,1,A,Smith,6\n",
            ),
        )
        .unwrap();

        let filter = DateFilter::new(Side::Participant, "2024-01-01", &schema()).unwrap();
        let filtered = filter.run(&raw_path, &out_path).unwrap();
        assert_eq!(filtered.stats.raw_rows, 1);
        assert_eq!(read_table(&out_path).unwrap(), filtered.table);
    }
}
