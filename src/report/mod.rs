use crate::config::ReportConfig;
use crate::error::{ApiError, Result};
use crate::metrics;
use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Downstream report producer: sector in, Markdown out.
///
/// The service never looks inside a failure from this collaborator; callers
/// get a generic downstream error while the detail goes to the log.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn generate_report(&self, sector: &str) -> Result<String>;
}

/// Client for the Google Gemini `generateContent` REST endpoint
pub struct GeminiReportGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Secret<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiReportGenerator {
    pub fn new(config: &ReportConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ApiError::Config("Report API key is not configured".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: Secret::new(api_key),
        })
    }

    fn build_prompt(sector: &str) -> String {
        format!(
            "You are a market analyst covering the Indian market. Write a \
             structured Markdown report on current trade opportunities in the \
             {sector} sector.\n\n\
             The report must contain these sections:\n\
             # {sector} Sector Analysis\n\
             ## Market Overview\n\
             ## Key Trends\n\
             ## Trade Opportunities\n\
             ## Risks\n\
             ## Outlook\n\n\
             Be specific and concise; cite figures where you are confident of \
             them and avoid speculation elsewhere."
        )
    }
}

#[async_trait]
impl ReportGenerator for GeminiReportGenerator {
    async fn generate_report(&self, sector: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url,
            self.model,
            self.api_key.expose_secret()
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": Self::build_prompt(sector) }] }]
        });

        debug!(sector, model = %self.model, "requesting market report");
        let started = Instant::now();

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            error!(sector, error = %e, "report backend request failed");
            metrics::record_report_request("error", started.elapsed().as_secs_f64());
            ApiError::Downstream
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!(sector, %status, detail, "report backend returned an error");
            metrics::record_report_request("error", started.elapsed().as_secs_f64());
            return Err(ApiError::Downstream);
        }

        let payload: GenerateContentResponse = response.json().await.map_err(|e| {
            error!(sector, error = %e, "report backend returned an unparseable payload");
            metrics::record_report_request("error", started.elapsed().as_secs_f64());
            ApiError::Downstream
        })?;

        let report = payload
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                error!(sector, "report backend returned no candidates");
                metrics::record_report_request("empty", started.elapsed().as_secs_f64());
                ApiError::Downstream
            })?;

        metrics::record_report_request("ok", started.elapsed().as_secs_f64());
        info!(sector, "market report generated");
        Ok(report)
    }
}

/// Placeholder used when no API key is configured; every call fails with a
/// configuration error, mirroring a missing `GEMINI_API_KEY`.
pub struct UnconfiguredReportGenerator;

#[async_trait]
impl ReportGenerator for UnconfiguredReportGenerator {
    async fn generate_report(&self, _sector: &str) -> Result<String> {
        Err(ApiError::Internal(
            "Report backend is not configured. Please check GEMINI_API_KEY.".to_string(),
        ))
    }
}
