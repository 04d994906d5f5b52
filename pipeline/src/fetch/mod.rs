//! Survey platform export client.
//!
//! An export is a three-step job against the Qualtrics v3 API:
//!
//! ```text
//! POST {base}/surveys/{id}/export-responses            -> progressId
//! GET  {base}/surveys/{id}/export-responses/{progress} -> status, fileId
//! GET  {base}/surveys/{id}/export-responses/{file}/file -> zip
//! ```
//!
//! The job is polled at a fixed interval until it completes, fails, or the
//! configured timeout elapses. Nothing is retried.
//!
//! ```rust,ignore
//! let client = SurveyClient::new(config.api.clone());
//! let raw_csv = client.download_survey("SV_abc123", &layout.raw_dir()).await?;
//! ```

pub mod archive;

use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::time::{sleep, Instant};

use crate::config::ApiConfig;
use crate::error::{FetchError, FetchResult};
use crate::logs::{log_info, log_info_indent, log_success};

pub use archive::{extract_archive, extract_csv};

const TOKEN_HEADER: &str = "X-API-TOKEN";

/// Body of the export request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportRequest {
    format: &'static str,
    seen_unanswered_recode: i64,
}

/// Every API response wraps its payload in `result` and errors in `meta`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: Option<T>,
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartResult {
    progress_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressResult {
    status: Option<String>,
    file_id: Option<String>,
    #[serde(default)]
    percent_complete: f64,
}

/// State of an export job as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStatus {
    InProgress,
    Complete,
    Failed,
}

impl ExportStatus {
    fn parse(status: &str) -> Self {
        match status {
            "complete" => ExportStatus::Complete,
            "failed" => ExportStatus::Failed,
            _ => ExportStatus::InProgress,
        }
    }
}

/// Client for response exports of one platform account.
#[derive(Debug, Clone)]
pub struct SurveyClient {
    config: ApiConfig,
    http: reqwest::Client,
}

impl SurveyClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn export_url(&self, survey_id: &str) -> String {
        format!("{}/surveys/{}/export-responses", self.config.base_url, survey_id)
    }

    /// Run a full export of `survey_id` and extract it into `output_dir`.
    /// Returns the path of the extracted CSV.
    pub async fn download_survey(&self, survey_id: &str, output_dir: &Path) -> FetchResult<PathBuf> {
        log_info(format!("Requesting export for survey {}...", survey_id));
        let progress_id = self.start_export(survey_id).await?;
        let file_id = self.wait_for_export(survey_id, &progress_id).await?;
        let bytes = self.download_file(survey_id, &file_id).await?;
        log_info_indent(format!("Downloaded {} bytes", bytes.len()), 1);

        let path = extract_csv(&bytes, output_dir)?;
        log_success(format!("Extracted {}", path.display()));
        Ok(path)
    }

    /// Create the export job and return its progress id.
    pub async fn start_export(&self, survey_id: &str) -> FetchResult<String> {
        let body = ExportRequest {
            format: "csv",
            seen_unanswered_recode: 0,
        };
        let response = self
            .http
            .post(self.export_url(survey_id))
            .header(TOKEN_HEADER, &self.config.api_token)
            .json(&body)
            .send()
            .await?;
        let envelope: Envelope<StartResult> = parse_envelope(response).await?;

        envelope
            .result
            .and_then(|r| r.progress_id)
            .ok_or_else(|| FetchError::InvalidResponse("export request returned no progressId".to_string()))
    }

    /// Poll the job until it completes and return its file id.
    pub async fn wait_for_export(&self, survey_id: &str, progress_id: &str) -> FetchResult<String> {
        let deadline = Instant::now() + self.config.export_timeout;
        let url = format!("{}/{}", self.export_url(survey_id), progress_id);

        loop {
            let response = self
                .http
                .get(&url)
                .header(TOKEN_HEADER, &self.config.api_token)
                .send()
                .await?;
            let envelope: Envelope<ProgressResult> = parse_envelope(response).await?;
            let progress = envelope
                .result
                .ok_or_else(|| FetchError::InvalidResponse("progress response has no result".to_string()))?;

            let status = progress
                .status
                .as_deref()
                .map(ExportStatus::parse)
                .unwrap_or(ExportStatus::InProgress);
            log_info_indent(format!("Export progress: {:.0}%", progress.percent_complete), 1);

            match (status, progress.file_id) {
                (ExportStatus::Failed, _) => return Err(FetchError::ExportFailed(survey_id.to_string())),
                (_, Some(file_id)) => return Ok(file_id),
                (ExportStatus::Complete, None) => {
                    return Err(FetchError::InvalidResponse(
                        "export complete but no fileId".to_string(),
                    ))
                }
                (ExportStatus::InProgress, None) => {}
            }

            if Instant::now() + self.config.poll_interval > deadline {
                return Err(FetchError::Timeout {
                    survey_id: survey_id.to_string(),
                    seconds: self.config.export_timeout.as_secs(),
                });
            }
            sleep(self.config.poll_interval).await;
        }
    }

    /// Download the finished export archive.
    pub async fn download_file(&self, survey_id: &str, file_id: &str) -> FetchResult<Vec<u8>> {
        let url = format!("{}/{}/file", self.export_url(survey_id), file_id);
        let response = self
            .http
            .get(url)
            .header(TOKEN_HEADER, &self.config.api_token)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Map non-success statuses to errors, passing successful responses through.
async fn check_status(response: Response) -> FetchResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Envelope<serde_json::Value>>(&body)
        .ok()
        .and_then(|e| e.meta)
        .and_then(|m| m.error)
        .and_then(|e| e.error_message)
        .unwrap_or_else(|| body.chars().take(200).collect());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(FetchError::Auth {
            status: status.as_u16(),
            message,
        }),
        _ => Err(FetchError::Api {
            status: status.as_u16(),
            message,
        }),
    }
}

async fn parse_envelope<T: for<'de> Deserialize<'de>>(response: Response) -> FetchResult<Envelope<T>> {
    let response = check_status(response).await?;
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| FetchError::InvalidResponse(e.to_string()))
}
