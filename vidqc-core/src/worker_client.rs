//! Worker Client (§4.8): optional remote-analysis HTTP client, probed for
//! health before every request rather than retried after failure.
//!
//! Teacher grounding: this workspace has no existing HTTP client code to
//! imitate, so the shape (health-probe-then-request, no retry, distinct
//! timeouts per call) is modeled directly on §4.8's contract; `reqwest` is
//! already the workspace's HTTP crate (see `vidqc-core`'s Cargo.toml).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WorkerClientError;
use crate::prober::ProbeOptions;
use crate::report::AnalysisReport;

const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(30);
const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// `POST /analyze` request body (§6 Surface C).
#[derive(Debug, Clone, Serialize)]
struct AnalyzeRequest<'a> {
    file_path: &'a str,
    options: &'a ProbeOptions,
}

/// `POST /analyze` response envelope (§6 Surface C): `data` is present iff
/// `success` is true, `error` iff it isn't.
#[derive(Debug, Clone, Deserialize)]
struct AnalyzeResponse {
    success: bool,
    #[serde(default)]
    data: Option<AnalysisReport>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    processing_time: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    healthy: bool,
}

/// `None` when unconfigured; every method returns
/// [`WorkerClientError::NotConfigured`] in that state so callers can treat
/// "no remote worker" as a normal, checked outcome rather than a panic.
pub struct WorkerClient {
    base_url: Option<String>,
    client: reqwest::Client,
}

impl WorkerClient {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn unconfigured() -> Self {
        Self::new(None)
    }

    /// `GET /health` with a 30s timeout (§6 Surface C).
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn health(&self) -> Result<bool, WorkerClientError> {
        let base = self.base_url.as_deref().ok_or(WorkerClientError::NotConfigured)?;
        let response = self
            .client
            .get(format!("{base}/health"))
            .timeout(HEALTH_PROBE_TIMEOUT)
            .send()
            .await
            .map_err(WorkerClientError::HealthCheckFailed)?;

        if !response.status().is_success() {
            return Ok(false);
        }
        let body: HealthResponse = response
            .json()
            .await
            .map_err(WorkerClientError::HealthCheckFailed)?;
        Ok(body.healthy)
    }

    /// `POST /analyze` with a 5 minute timeout, no retry (§6 Surface C).
    /// Callers that want fallback-to-local behavior should probe
    /// [`Self::health`] first and decide there; this method never retries
    /// or falls back on its own.
    #[tracing::instrument(level = "info", skip(self, options))]
    pub async fn analyze(
        &self,
        file_path: &str,
        options: &ProbeOptions,
    ) -> Result<AnalysisReport, WorkerClientError> {
        let base = self.base_url.as_deref().ok_or(WorkerClientError::NotConfigured)?;
        let response = self
            .client
            .post(format!("{base}/analyze"))
            .timeout(ANALYSIS_TIMEOUT)
            .json(&AnalyzeRequest { file_path, options })
            .send()
            .await
            .map_err(WorkerClientError::Request)?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerClientError::RemoteError(body));
        }

        let envelope: AnalyzeResponse = response.json().await.map_err(WorkerClientError::Request)?;
        match (envelope.success, envelope.data) {
            (true, Some(report)) => Ok(report),
            (true, None) => Err(WorkerClientError::RemoteError(
                "remote worker reported success with no data".to_owned(),
            )),
            (false, _) => Err(WorkerClientError::RemoteError(
                envelope.error.unwrap_or_else(|| "remote worker reported failure".to_owned()),
            )),
        }
    }
}

impl Default for WorkerClient {
    fn default() -> Self {
        Self::unconfigured()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_client_rejects_health_checks() {
        let client = WorkerClient::unconfigured();
        assert!(matches!(client.health().await, Err(WorkerClientError::NotConfigured)));
    }

    #[tokio::test]
    async fn unconfigured_client_rejects_analysis_requests() {
        let client = WorkerClient::unconfigured();
        let options = ProbeOptions::for_input("in.mp4");
        assert!(matches!(
            client.analyze("in.mp4", &options).await,
            Err(WorkerClientError::NotConfigured)
        ));
    }
}
