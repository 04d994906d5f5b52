//! Column layout of the participant and evaluator surveys.
//!
//! Defaults describe the intern self-assessment and supervisor evaluation
//! surveys: 27 skills rated on a 1-7 scale, the respondent identified by
//! intern name plus supervisor name. A JSON file with the same shape
//! (camelCase keys, any subset) overrides them; inside `participant` and
//! `evaluator`, fields left out keep that side's default.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::Path;

use super::Side;
use crate::error::{ConfigError, ConfigResult};

/// Columns read from one survey.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SideSchema {
    /// Who answered this survey, as printed on reports.
    pub label: String,
    /// Composite respondent key. Aligned position by position with the other side.
    pub key_columns: Vec<String>,
    /// First and last name of the participant, as entered in this survey.
    pub name_columns: Vec<String>,
    /// Numeric ratings, one per skill.
    pub rating_columns: Vec<String>,
    pub strengths_column: Option<String>,
    pub improvements_column: Option<String>,
    /// Carried through to the processed CSVs but not used for reporting.
    pub extra_columns: Vec<String>,
}

impl SideSchema {
    /// The intern self-assessment.
    pub fn participant() -> Self {
        Self {
            label: "Student".to_string(),
            key_columns: strings(&["stuFirst", "stuLast", "supLinkFirst", "supLinkLast"]),
            name_columns: strings(&["stuFirst", "stuLast"]),
            rating_columns: numbered("ssSelf_", SKILL_COUNT),
            strengths_column: None,
            improvements_column: None,
            extra_columns: strings(&["intTitle"]),
        }
    }

    /// The supervisor evaluation.
    pub fn evaluator() -> Self {
        Self {
            label: "Supervisor".to_string(),
            key_columns: strings(&["firstNameIntern", "lastNameIntern", "supFirst", "supLast"]),
            name_columns: strings(&["firstNameIntern", "lastNameIntern"]),
            rating_columns: numbered("ssSup_", SKILL_COUNT),
            strengths_column: Some("strengthText".to_string()),
            improvements_column: Some("improveText".to_string()),
            extra_columns: Vec::new(),
        }
    }

    /// Deserialize `deserializer` as a partial object laid over `base`.
    fn patch<'de, D>(deserializer: D, base: SideSchema) -> Result<SideSchema, D::Error>
    where
        D: Deserializer<'de>,
    {
        let fields = match Value::deserialize(deserializer)? {
            Value::Object(fields) => fields,
            other => {
                return Err(D::Error::custom(format!(
                    "survey side must be an object, found {}",
                    other
                )))
            }
        };
        let mut merged = match serde_json::to_value(base).map_err(D::Error::custom)? {
            Value::Object(map) => map,
            _ => return Err(D::Error::custom("survey side defaults are not an object")),
        };
        merged.extend(fields);
        serde_json::from_value(Value::Object(merged)).map_err(D::Error::custom)
    }

    fn check(&self, side: Side) -> ConfigResult<()> {
        if self.name_columns.is_empty() {
            return Err(ConfigError::Schema(format!("{} nameColumns is empty", side)));
        }
        if self.rating_columns.is_empty() {
            return Err(ConfigError::Schema(format!("{} ratingColumns is empty", side)));
        }
        Ok(())
    }

    /// Columns kept by the date filter, in output order, without duplicates.
    pub fn projected_columns(&self, timestamp_column: &str) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        let candidates = std::iter::once(timestamp_column.to_string())
            .chain(self.extra_columns.iter().cloned())
            .chain(self.key_columns.iter().cloned())
            .chain(self.name_columns.iter().cloned())
            .chain(self.rating_columns.iter().cloned())
            .chain(self.improvements_column.iter().cloned())
            .chain(self.strengths_column.iter().cloned());
        for column in candidates {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
        columns
    }
}

/// Full description of both surveys and how they relate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SurveySchema {
    /// Response timestamp, compared against the cutoff.
    pub timestamp_column: String,
    /// Completion flag; rows where it is not `"1"` are dropped.
    pub finished_column: Option<String>,
    /// Rows between the header and the first response in raw exports.
    pub metadata_rows: usize,
    /// Upper bound of the rating scale.
    pub rating_max: f64,
    /// Leading key parts identifying the participant alone, used to pair
    /// leftovers evaluated by a different evaluator. Zero disables.
    pub reconcile_key_len: usize,
    pub report_title: String,
    /// Chart labels. Missing entries fall back to `Skill {n}`.
    pub skill_labels: Vec<String>,
    #[serde(deserialize_with = "patch_participant")]
    pub participant: SideSchema,
    #[serde(deserialize_with = "patch_evaluator")]
    pub evaluator: SideSchema,
}

fn patch_participant<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SideSchema, D::Error> {
    SideSchema::patch(deserializer, SideSchema::participant())
}

fn patch_evaluator<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SideSchema, D::Error> {
    SideSchema::patch(deserializer, SideSchema::evaluator())
}

const SKILL_COUNT: usize = 27;

fn numbered(prefix: &str, count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("{}{}", prefix, i)).collect()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl Default for SurveySchema {
    fn default() -> Self {
        Self {
            timestamp_column: "RecordedDate".to_string(),
            finished_column: Some("Finished".to_string()),
            metadata_rows: 2,
            rating_max: 7.0,
            reconcile_key_len: 2,
            report_title: "Intern - Supervisor Skill Survey Report".to_string(),
            skill_labels: Vec::new(),
            participant: SideSchema::participant(),
            evaluator: SideSchema::evaluator(),
        }
    }
}

impl SurveySchema {
    pub fn side(&self, side: Side) -> &SideSchema {
        match side {
            Side::Participant => &self.participant,
            Side::Evaluator => &self.evaluator,
        }
    }

    /// Label of the `index`-th (zero-based) skill.
    pub fn skill_label(&self, index: usize) -> String {
        self.skill_labels
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("Skill {}", index + 1))
    }

    /// Number of chart rows: the longer of the two rating lists.
    pub fn skill_count(&self) -> usize {
        self.participant
            .rating_columns
            .len()
            .max(self.evaluator.rating_columns.len())
    }

    /// Load a schema override from a JSON file and validate it.
    pub fn from_json_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Schema(format!("{}: {}", path.display(), e)))?;
        let schema: SurveySchema = serde_json::from_str(&content)
            .map_err(|e| ConfigError::Schema(format!("{}: {}", path.display(), e)))?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let (p, e) = (&self.participant, &self.evaluator);
        if p.key_columns.is_empty() || p.key_columns.len() != e.key_columns.len() {
            return Err(ConfigError::Schema(format!(
                "key columns must be non-empty and aligned ({} participant vs {} evaluator)",
                p.key_columns.len(),
                e.key_columns.len()
            )));
        }
        if self.reconcile_key_len > p.key_columns.len() {
            return Err(ConfigError::Schema(format!(
                "reconcileKeyLen {} exceeds key length {}",
                self.reconcile_key_len,
                p.key_columns.len()
            )));
        }
        p.check(Side::Participant)?;
        e.check(Side::Evaluator)?;
        if self.timestamp_column.trim().is_empty() {
            return Err(ConfigError::Schema("timestampColumn is empty".to_string()));
        }
        if self.rating_max.is_nan() || self.rating_max <= 0.0 {
            return Err(ConfigError::Schema("ratingMax must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_schema_is_valid() {
        let schema = SurveySchema::default();
        assert!(schema.validate().is_ok());
        assert_eq!(schema.skill_count(), 27);
        assert_eq!(schema.participant.rating_columns[26], "ssSelf_27");
        assert_eq!(schema.skill_label(0), "Skill 1");
    }

    #[test]
    fn test_projected_columns_are_unique() {
        let schema = SurveySchema::default();
        let columns = schema.participant.projected_columns(&schema.timestamp_column);
        assert_eq!(columns[0], "RecordedDate");
        assert_eq!(columns.iter().filter(|c| *c == "stuFirst").count(), 1);
        assert!(columns.contains(&"intTitle".to_string()));
    }

    #[test]
    fn test_partial_override_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"ratingMax": 5, "skillLabels": ["Communication"], "reconcileKeyLen": 0}}"#
        )
        .unwrap();

        let schema = SurveySchema::from_json_file(file.path()).unwrap();
        assert_eq!(schema.rating_max, 5.0);
        assert_eq!(schema.skill_label(0), "Communication");
        assert_eq!(schema.skill_label(1), "Skill 2");
        assert_eq!(schema.timestamp_column, "RecordedDate");
    }

    #[test]
    fn test_partial_side_keeps_side_defaults() {
        let schema: SurveySchema = serde_json::from_str(
            r#"{"participant": {"label": "Intern", "keyColumns": ["a", "b", "c", "d"]},
                "evaluator": {"strengthsColumn": null}}"#,
        )
        .unwrap();
        assert!(schema.validate().is_ok());

        assert_eq!(schema.participant.label, "Intern");
        assert_eq!(schema.participant.key_columns, strings(&["a", "b", "c", "d"]));
        assert_eq!(schema.participant.rating_columns.len(), 27);
        assert_eq!(schema.participant.name_columns, strings(&["stuFirst", "stuLast"]));

        assert_eq!(schema.evaluator.strengths_column, None);
        assert_eq!(schema.evaluator.improvements_column.as_deref(), Some("improveText"));
        assert_eq!(schema.evaluator.rating_columns[0], "ssSup_1");
    }

    #[test]
    fn test_side_must_be_an_object() {
        let result = serde_json::from_str::<SurveySchema>(r#"{"evaluator": ["ssSup_1"]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_name_or_rating_columns_rejected() {
        let mut schema = SurveySchema::default();
        schema.participant.name_columns.clear();
        assert!(matches!(schema.validate(), Err(ConfigError::Schema(m)) if m.contains("nameColumns")));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"evaluator": {{"ratingColumns": []}}}}"#).unwrap();
        let err = SurveySchema::from_json_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("evaluator ratingColumns is empty"));
    }

    #[test]
    fn test_misaligned_keys_rejected() {
        let mut schema = SurveySchema::default();
        schema.evaluator.key_columns.pop();
        assert!(matches!(schema.validate(), Err(ConfigError::Schema(_))));
    }
}
