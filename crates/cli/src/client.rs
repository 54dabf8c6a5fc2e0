//! API client for the orchestrator's HTTP surface

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request expecting JSON
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, api_error(&body));
        }

        response.json().await.context("Failed to parse response")
    }

    /// Make a GET request expecting a plain text body
    pub async fn get_text(&self, path: &str) -> Result<String> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, api_error(&body));
        }

        response.text().await.context("Failed to read response")
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, api_error(&body));
        }

        response.json().await.context("Failed to parse response")
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<()> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .delete(url)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, api_error(&body));
        }

        Ok(())
    }
}

/// Pull the `error` field out of an API error body, falling back to the
/// raw text
fn api_error(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.to_string())
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRun {
    pub id: String,
    pub kind: String,
    pub cluster: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    pub started_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<TestResults>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_latency_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p95_latency_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p99_latency_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_requests: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_bogo_ops: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_bogo_ops: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<ScalingMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingMeta {
    pub test_start: i64,
    pub test_end: i64,
    pub cooldown_end: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_up_latency_ms: Option<i64>,
    pub peak_replicas: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_down_started_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_rps_per_replica: Option<f64>,
    #[serde(default)]
    pub target_deployments: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingPoint {
    pub timestamp: i64,
    pub hpas: Vec<HpaState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HpaState {
    pub name: String,
    pub namespace: String,
    pub deployment: String,
    pub current_replicas: u32,
    pub desired_replicas: u32,
    pub min_replicas: u32,
    pub max_replicas: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_cpu_percent: Option<u32>,
    pub target_cpu_percent: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTestRequest {
    pub kind: String,
    pub cluster: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
