// HTTP client for the fragment analysis API

use crate::retry::RetryPolicy;
use anyhow::{bail, Context};
use lossteach_core::PredictionResponse;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const PREDICT_TIMEOUT: Duration = Duration::from_secs(30);

/// The service refused the request itself; sending it again cannot help.
#[derive(Debug, Error)]
#[error("Prediction failed with {status}: {message}")]
pub struct Rejected {
    pub status: reqwest::StatusCode,
    pub message: String,
}

/// Connection failures and 5xx answers are worth another attempt.
pub fn is_transient(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Rejected>().is_none()
}

/// Query options for one prediction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictRequest {
    pub score_threshold: Option<f32>,
    pub include_mask: bool,
    pub include_metrics: bool,
}

impl PredictRequest {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("include_mask", self.include_mask.to_string()),
            ("include_metrics", self.include_metrics.to_string()),
        ];
        if let Some(threshold) = self.score_threshold {
            query.push(("score_threshold", threshold.to_string()));
        }
        query
    }
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(base_url: &str, retry: RetryPolicy) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        }
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    /// Poll `/health` with retries. Returns the health body on 200.
    pub async fn health(&self) -> anyhow::Result<Value> {
        self.retry
            .run("Health check", || async {
                let response = self
                    .http
                    .get(self.url("/health"))
                    .timeout(HEALTH_TIMEOUT)
                    .send()
                    .await
                    .with_context(|| format!("Cannot connect to {}", self.base_url))?;
                let status = response.status();
                let body: Value = response.json().await.unwrap_or(Value::Null);
                if !status.is_success() {
                    bail!("Service reported {}: {}", status, body);
                }
                Ok(body)
            })
            .await
    }

    /// Upload an image and decode the prediction.
    /// The service must pass a health check first.
    pub async fn predict(
        &self,
        image: &Path,
        request: &PredictRequest,
    ) -> anyhow::Result<PredictionResponse> {
        self.health().await?;

        let bytes = tokio::fs::read(image)
            .await
            .with_context(|| format!("Failed to read {}", image.display()))?;
        let file_name = image
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        info!("Uploading {} ({} bytes)", file_name, bytes.len());

        self.retry
            .run_if("Prediction", is_transient, || {
                let bytes = bytes.clone();
                let file_name = file_name.clone();
                async move {
                    let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));
                    let response = self
                        .http
                        .post(self.url("/predict"))
                        .query(&request.query())
                        .multipart(form)
                        .timeout(PREDICT_TIMEOUT)
                        .send()
                        .await
                        .with_context(|| format!("Cannot connect to {}", self.base_url))?;

                    let status = response.status();
                    if !status.is_success() {
                        let body: Value = response.json().await.unwrap_or(Value::Null);
                        let message = body
                            .get("error")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown error")
                            .to_string();
                        if status.is_client_error() {
                            return Err(Rejected { status, message }.into());
                        }
                        bail!("Prediction failed with {}: {}", status, message);
                    }
                    let prediction: PredictionResponse = response
                        .json()
                        .await
                        .context("Malformed prediction response")?;
                    debug!("Received {} fragments", prediction.fragment_count());
                    Ok(prediction)
                }
            })
            .await
    }
}
