//! Full outer join of the participant and evaluator tables.
//!
//! Rows are matched on their normalized composite key. A key with any blank
//! part never matches, so such rows always come out unpaired. Output order is
//! the participant table's order followed by the unmatched evaluator rows.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{PipelineResult, ValidationError, ValidationResult};
use crate::logs::{log_info, log_success, log_warning};
use crate::models::{cell, JoinKey, MergedRecord, MergedTable, Side, SurveySchema, Table};
use crate::parser::write_table;
use crate::validation::{normalize_key_part, require_columns};

/// How to resolve several rows with the same key on one side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    KeepFirst,
    /// Most recent response wins (inputs are sorted by timestamp).
    #[default]
    KeepLast,
    Error,
}

impl DuplicatePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            DuplicatePolicy::KeepFirst => "keep-first",
            DuplicatePolicy::KeepLast => "keep-last",
            DuplicatePolicy::Error => "error",
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "keep-first" | "first" => Ok(DuplicatePolicy::KeepFirst),
            "keep-last" | "last" => Ok(DuplicatePolicy::KeepLast),
            "error" => Ok(DuplicatePolicy::Error),
            other => Err(format!(
                "'{}' is not one of keep-first, keep-last, error",
                other
            )),
        }
    }
}

/// Rows of one side after duplicate resolution, with their keys.
struct KeyedRows {
    rows: Vec<(JoinKey, Vec<String>)>,
    dropped: usize,
}

/// Joins the filtered tables of both sides.
#[derive(Debug, Clone)]
pub struct Merger {
    participant_keys: Vec<String>,
    evaluator_keys: Vec<String>,
    policy: DuplicatePolicy,
}

impl Merger {
    pub fn new(schema: &SurveySchema, policy: DuplicatePolicy) -> ValidationResult<Self> {
        Self::with_keys(
            schema.participant.key_columns.clone(),
            schema.evaluator.key_columns.clone(),
            policy,
        )
    }

    /// Key columns are aligned by position and must have the same length.
    pub fn with_keys(
        participant_keys: Vec<String>,
        evaluator_keys: Vec<String>,
        policy: DuplicatePolicy,
    ) -> ValidationResult<Self> {
        if participant_keys.is_empty() || participant_keys.len() != evaluator_keys.len() {
            return Err(ValidationError::KeyMismatch {
                participant: participant_keys.len(),
                evaluator: evaluator_keys.len(),
            });
        }
        Ok(Self {
            participant_keys,
            evaluator_keys,
            policy,
        })
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    fn key_columns(&self, side: Side) -> &[String] {
        match side {
            Side::Participant => &self.participant_keys,
            Side::Evaluator => &self.evaluator_keys,
        }
    }

    /// Normalized key of `row`. Missing or blank parts stay empty.
    fn key_of(indices: &[usize], row: &[String]) -> JoinKey {
        JoinKey(
            indices
                .iter()
                .map(|&i| cell(row, i).map(normalize_key_part).unwrap_or_default())
                .collect(),
        )
    }

    fn keyed_rows(&self, table: &Table, side: Side) -> ValidationResult<KeyedRows> {
        let columns = self.key_columns(side);
        require_columns(table, side, columns)?;
        let indices: Vec<usize> = columns
            .iter()
            .filter_map(|c| table.column_index(c))
            .collect();

        let keyed: Vec<(JoinKey, &Vec<String>)> = table
            .rows
            .iter()
            .map(|row| (Self::key_of(&indices, row), row))
            .collect();

        let keep: Vec<bool> = match self.policy {
            DuplicatePolicy::KeepFirst => {
                let mut seen = HashSet::new();
                keyed
                    .iter()
                    .map(|(key, _)| !key.is_complete() || seen.insert(key))
                    .collect()
            }
            DuplicatePolicy::KeepLast => {
                let last: HashMap<&JoinKey, usize> = keyed
                    .iter()
                    .enumerate()
                    .map(|(i, (key, _))| (key, i))
                    .collect();
                keyed
                    .iter()
                    .enumerate()
                    .map(|(i, (key, _))| !key.is_complete() || last.get(key) == Some(&i))
                    .collect()
            }
            DuplicatePolicy::Error => {
                let mut seen = HashSet::new();
                for (key, _) in &keyed {
                    if key.is_complete() && !seen.insert(key) {
                        return Err(ValidationError::DuplicateKey {
                            side,
                            key: key.to_string(),
                        });
                    }
                }
                vec![true; keyed.len()]
            }
        };

        let dropped = keep.iter().filter(|k| !**k).count();
        let rows = keyed
            .into_iter()
            .zip(keep)
            .filter(|(_, keep)| *keep)
            .map(|((key, row), _)| (key, row.clone()))
            .collect();

        Ok(KeyedRows { rows, dropped })
    }

    /// Outer join. Every deduplicated row of both inputs appears in exactly
    /// one record.
    pub fn merge(&self, participant: &Table, evaluator: &Table) -> ValidationResult<MergedTable> {
        let participants = self.keyed_rows(participant, Side::Participant)?;
        let evaluators = self.keyed_rows(evaluator, Side::Evaluator)?;

        for (side, keyed) in [(Side::Participant, &participants), (Side::Evaluator, &evaluators)] {
            if keyed.dropped > 0 {
                log_warning(format!(
                    "Dropped {} duplicate {} row(s) ({})",
                    keyed.dropped, side, self.policy
                ));
            }
        }

        let mut evaluator_by_key: HashMap<&JoinKey, usize> = HashMap::new();
        for (i, (key, _)) in evaluators.rows.iter().enumerate() {
            if key.is_complete() {
                evaluator_by_key.insert(key, i);
            }
        }

        let mut matched = vec![false; evaluators.rows.len()];
        let mut records = Vec::with_capacity(participants.rows.len() + evaluators.rows.len());

        for (key, row) in &participants.rows {
            let partner = if key.is_complete() {
                evaluator_by_key.get(key).copied()
            } else {
                None
            };
            if let Some(i) = partner {
                matched[i] = true;
            }
            records.push(MergedRecord {
                idx: records.len(),
                key: key.clone(),
                participant: Some(row.clone()),
                evaluator: partner.map(|i| evaluators.rows[i].1.clone()),
            });
        }

        for (i, (key, row)) in evaluators.rows.iter().enumerate() {
            if matched[i] {
                continue;
            }
            records.push(MergedRecord {
                idx: records.len(),
                key: key.clone(),
                participant: None,
                evaluator: Some(row.clone()),
            });
        }

        Ok(MergedTable {
            participant_headers: participant.headers.clone(),
            evaluator_headers: evaluator.headers.clone(),
            records,
        })
    }

    /// Merge and write the flattened join to `out_path`.
    pub fn run(&self, participant: &Table, evaluator: &Table, out_path: &Path) -> PipelineResult<MergedTable> {
        log_info(format!(
            "Merging {} participant and {} evaluator rows",
            participant.len(),
            evaluator.len()
        ));
        let merged = self.merge(participant, evaluator)?;
        write_table(&merged.to_table(), out_path)?;

        let paired = merged
            .records
            .iter()
            .filter(|r| r.participant.is_some() && r.evaluator.is_some())
            .count();
        log_success(format!("Merged into {} records ({} paired)", merged.len(), paired));
        Ok(merged)
    }
}
