//! Run configuration.
//!
//! Everything a run needs is read once into a [`Config`] and handed to each
//! stage's constructor. Values come from the process environment (a `.env`
//! file is honoured) through [`Config::from_env`], or from any lookup
//! function through [`Config::from_lookup`].
//!
//! | Variable                  | Required | Default                                 |
//! |---------------------------|----------|-----------------------------------------|
//! | `SURVEY_API_TOKEN`        | yes      |                                         |
//! | `SURVEY_DATACENTER`       | yes      |                                         |
//! | `PARTICIPANT_SURVEY_ID`   | yes      |                                         |
//! | `EVALUATOR_SURVEY_ID`     | yes      |                                         |
//! | `CUTOFF_DATE`             | yes*     | (*unless both per-side cutoffs are set) |
//! | `PARTICIPANT_CUTOFF_DATE` | no       | `CUTOFF_DATE`                           |
//! | `EVALUATOR_CUTOFF_DATE`   | no       | `CUTOFF_DATE`                           |
//! | `SURVEY_API_BASE_URL`     | no       | `https://{datacenter}.qualtrics.com/API/v3` |
//! | `SURVEY_DATA_DIR`         | no       | `MySurveys`                             |
//! | `SURVEY_REPORTS_DIR`      | no       | `Reports`                               |
//! | `EXPORT_TIMEOUT_SECS`     | no       | `300`                                   |
//! | `EXPORT_POLL_INTERVAL_MS` | no       | `1000`                                  |
//! | `DUPLICATE_POLICY`        | no       | `keep-last`                             |
//! | `SURVEY_SCHEMA_FILE`      | no       | built-in intern/supervisor schema       |

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::models::{Category, Side, SurveySchema};
use crate::transform::merge::DuplicatePolicy;

const DEFAULT_DATA_DIR: &str = "MySurveys";
const DEFAULT_REPORTS_DIR: &str = "Reports";
const DEFAULT_EXPORT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

// =============================================================================
// API
// =============================================================================

/// Connection settings for the survey platform.
#[derive(Clone)]
pub struct ApiConfig {
    pub api_token: String,
    pub datacenter_id: String,
    /// API root without trailing slash.
    pub base_url: String,
    pub poll_interval: Duration,
    /// Upper bound on waiting for an export job.
    pub export_timeout: Duration,
}

impl ApiConfig {
    pub fn new(api_token: impl Into<String>, datacenter_id: impl Into<String>) -> Self {
        let datacenter_id = datacenter_id.into();
        Self {
            api_token: api_token.into(),
            base_url: default_base_url(&datacenter_id),
            datacenter_id,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            export_timeout: Duration::from_secs(DEFAULT_EXPORT_TIMEOUT_SECS),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_export_timeout(mut self, timeout: Duration) -> Self {
        self.export_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_token", &"<redacted>")
            .field("datacenter_id", &self.datacenter_id)
            .field("base_url", &self.base_url)
            .field("poll_interval", &self.poll_interval)
            .field("export_timeout", &self.export_timeout)
            .finish()
    }
}

fn default_base_url(datacenter_id: &str) -> String {
    format!("https://{}.qualtrics.com/API/v3", datacenter_id)
}

// =============================================================================
// Filesystem Layout
// =============================================================================

/// Fixed directory layout under the data and reports roots.
#[derive(Debug, Clone, PartialEq)]
pub struct DataLayout {
    pub data_dir: PathBuf,
    pub reports_dir: PathBuf,
}

impl DataLayout {
    pub fn new(data_dir: impl Into<PathBuf>, reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            reports_dir: reports_dir.into(),
        }
    }

    /// Extracted platform exports.
    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw_data")
    }

    pub fn intermediate_dir(&self) -> PathBuf {
        self.data_dir.join("intermediate_results")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed_data")
    }

    pub fn filtered_path(&self, side: Side) -> PathBuf {
        self.intermediate_dir()
            .join(format!("{}_data_filtered_by_date.csv", side))
    }

    pub fn merged_path(&self) -> PathBuf {
        self.intermediate_dir().join("merged_data.csv")
    }

    pub fn processed_path(&self, category: Category) -> PathBuf {
        self.processed_dir().join(category.processed_file_name())
    }

    pub fn report_dir(&self, category: Category) -> PathBuf {
        self.reports_dir.join(category.report_dir_name())
    }
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR, DEFAULT_REPORTS_DIR)
    }
}

// =============================================================================
// Config
// =============================================================================

/// Everything one pipeline run needs.
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub participant_survey_id: String,
    pub evaluator_survey_id: String,
    /// Raw cutoff strings; parsed (and rejected) by the date filter.
    pub participant_cutoff: String,
    pub evaluator_cutoff: String,
    pub layout: DataLayout,
    pub schema: SurveySchema,
    pub duplicate_policy: DuplicatePolicy,
}

impl Config {
    /// Read configuration from the process environment, loading `.env` first.
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |name: &'static str| get(name).ok_or(ConfigError::MissingVar(name));

        let api_token = require("SURVEY_API_TOKEN")?;
        let datacenter_id = require("SURVEY_DATACENTER")?;
        validate_datacenter(&datacenter_id)?;
        let participant_survey_id = require("PARTICIPANT_SURVEY_ID")?;
        let evaluator_survey_id = require("EVALUATOR_SURVEY_ID")?;

        let shared_cutoff = get("CUTOFF_DATE");
        let participant_cutoff = get("PARTICIPANT_CUTOFF_DATE")
            .or_else(|| shared_cutoff.clone())
            .ok_or(ConfigError::MissingVar("CUTOFF_DATE"))?;
        let evaluator_cutoff = get("EVALUATOR_CUTOFF_DATE")
            .or(shared_cutoff)
            .ok_or(ConfigError::MissingVar("CUTOFF_DATE"))?;

        let mut api = ApiConfig::new(api_token, datacenter_id)
            .with_export_timeout(Duration::from_secs(parse_number(
                "EXPORT_TIMEOUT_SECS",
                get("EXPORT_TIMEOUT_SECS"),
                DEFAULT_EXPORT_TIMEOUT_SECS,
            )?))
            .with_poll_interval(Duration::from_millis(parse_number(
                "EXPORT_POLL_INTERVAL_MS",
                get("EXPORT_POLL_INTERVAL_MS"),
                DEFAULT_POLL_INTERVAL_MS,
            )?));
        if let Some(base_url) = get("SURVEY_API_BASE_URL") {
            api = api.with_base_url(base_url);
        }

        let layout = DataLayout::new(
            get("SURVEY_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
            get("SURVEY_REPORTS_DIR").unwrap_or_else(|| DEFAULT_REPORTS_DIR.to_string()),
        );

        let schema = match get("SURVEY_SCHEMA_FILE") {
            Some(path) => SurveySchema::from_json_file(Path::new(&path))?,
            None => SurveySchema::default(),
        };

        let duplicate_policy = match get("DUPLICATE_POLICY") {
            Some(value) => value.parse().map_err(|message| ConfigError::InvalidValue {
                var: "DUPLICATE_POLICY",
                message,
            })?,
            None => DuplicatePolicy::default(),
        };

        Ok(Self {
            api,
            participant_survey_id,
            evaluator_survey_id,
            participant_cutoff,
            evaluator_cutoff,
            layout,
            schema,
            duplicate_policy,
        })
    }

    pub fn survey_id(&self, side: Side) -> &str {
        match side {
            Side::Participant => &self.participant_survey_id,
            Side::Evaluator => &self.evaluator_survey_id,
        }
    }

    pub fn cutoff(&self, side: Side) -> &str {
        match side {
            Side::Participant => &self.participant_cutoff,
            Side::Evaluator => &self.evaluator_cutoff,
        }
    }
}

/// Datacenter ids end up in a host name.
fn validate_datacenter(datacenter_id: &str) -> ConfigResult<()> {
    let valid = datacenter_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            var: "SURVEY_DATACENTER",
            message: format!("'{}' is not a valid host label", datacenter_id),
        })
    }
}

fn parse_number(var: &'static str, value: Option<String>, default: u64) -> ConfigResult<u64> {
    match value {
        Some(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
            var,
            message: format!("'{}' is not a non-negative integer", v),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("SURVEY_API_TOKEN", "secret"),
        ("SURVEY_DATACENTER", "sdsu.iad1"),
        ("PARTICIPANT_SURVEY_ID", "SV_student"),
        ("EVALUATOR_SURVEY_ID", "SV_supervisor"),
        ("CUTOFF_DATE", "2024-01-01"),
    ];

    #[test]
    fn test_minimal_config() {
        let config = Config::from_lookup(lookup(BASE)).unwrap();
        assert_eq!(config.api.base_url, "https://sdsu.iad1.qualtrics.com/API/v3");
        assert_eq!(config.survey_id(Side::Evaluator), "SV_supervisor");
        assert_eq!(config.cutoff(Side::Participant), "2024-01-01");
        assert_eq!(config.cutoff(Side::Evaluator), "2024-01-01");
        assert_eq!(config.layout, DataLayout::default());
        assert_eq!(config.duplicate_policy, DuplicatePolicy::KeepLast);
        assert_eq!(config.api.export_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let pairs: Vec<_> = BASE
            .iter()
            .copied()
            .filter(|(k, _)| *k != "SURVEY_API_TOKEN")
            .collect();
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("SURVEY_API_TOKEN")));
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        // later pairs win in the lookup map
        let mut pairs = BASE.to_vec();
        pairs.push(("SURVEY_API_TOKEN", "   "));
        assert!(matches!(
            Config::from_lookup(lookup(&pairs)),
            Err(ConfigError::MissingVar("SURVEY_API_TOKEN"))
        ));
    }

    #[test]
    fn test_per_side_cutoffs_override_shared() {
        let mut pairs = BASE.to_vec();
        pairs.push(("EVALUATOR_CUTOFF_DATE", "2024-03-01"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.cutoff(Side::Participant), "2024-01-01");
        assert_eq!(config.cutoff(Side::Evaluator), "2024-03-01");
    }

    #[test]
    fn test_overrides() {
        let mut pairs = BASE.to_vec();
        pairs.extend_from_slice(&[
            ("SURVEY_API_BASE_URL", "http://127.0.0.1:9000/"),
            ("SURVEY_DATA_DIR", "/tmp/data"),
            ("EXPORT_POLL_INTERVAL_MS", "10"),
            ("DUPLICATE_POLICY", "error"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.api.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.api.poll_interval, Duration::from_millis(10));
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Error);
        assert_eq!(
            config.layout.processed_path(Category::Complete),
            PathBuf::from("/tmp/data/processed_data/processed_completed_data.csv")
        );
    }

    #[test]
    fn test_invalid_values() {
        let mut pairs = BASE.to_vec();
        pairs.push(("EXPORT_TIMEOUT_SECS", "soon"));
        assert!(matches!(
            Config::from_lookup(lookup(&pairs)),
            Err(ConfigError::InvalidValue { var: "EXPORT_TIMEOUT_SECS", .. })
        ));

        let mut pairs: Vec<_> = BASE
            .iter()
            .copied()
            .filter(|(k, _)| *k != "SURVEY_DATACENTER")
            .collect();
        pairs.push(("SURVEY_DATACENTER", "evil.com/x?"));
        assert!(matches!(
            Config::from_lookup(lookup(&pairs)),
            Err(ConfigError::InvalidValue { var: "SURVEY_DATACENTER", .. })
        ));
    }

    #[test]
    fn test_layout_paths() {
        let layout = DataLayout::new("data", "out");
        assert_eq!(
            layout.filtered_path(Side::Participant),
            PathBuf::from("data/intermediate_results/participant_data_filtered_by_date.csv")
        );
        assert_eq!(
            layout.report_dir(Category::EvaluatorOnly),
            PathBuf::from("out/only_evaluator_reports")
        );
    }
}
