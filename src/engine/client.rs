//! External workflow engine client — thin request/response wrapper around
//! the engine's HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{ConfigError, EngineError};
use crate::template::WorkflowDefinition;

use super::types::{CreatedWorkflow, Envelope, ExecutionSample, ExecutionStarted, WorkflowInfo};

/// Header carrying the static engine API key.
pub const API_KEY_HEADER: &str = "X-API-KEY";

/// Async interface to the engine HTTP API.
///
/// All operations are blocking network calls bounded by the client's own
/// timeout, independent of any caller-side retry delays.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Liveness probe (`GET /workflows`).
    async fn ping(&self) -> Result<(), EngineError>;

    async fn create_workflow(
        &self,
        definition: &WorkflowDefinition,
    ) -> Result<CreatedWorkflow, EngineError>;

    async fn activate_workflow(&self, id: &str) -> Result<(), EngineError>;

    async fn deactivate_workflow(&self, id: &str) -> Result<(), EngineError>;

    async fn delete_workflow(&self, id: &str) -> Result<(), EngineError>;

    async fn get_workflow(&self, id: &str) -> Result<WorkflowInfo, EngineError>;

    /// Submit a payload through the workflow's execution entry point.
    async fn execute_workflow(
        &self,
        id: &str,
        payload: &serde_json::Value,
    ) -> Result<ExecutionStarted, EngineError>;

    async fn get_execution(&self, id: &str) -> Result<ExecutionSample, EngineError>;

    /// Most recent executions for a workflow, newest first.
    async fn list_executions(
        &self,
        workflow_id: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionSample>, EngineError>;
}

/// Engine connection settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub timeout: Duration,
}

impl EngineConfig {
    /// Build config from environment variables.
    ///
    /// `ENGINE_BASE_URL` and `ENGINE_API_KEY` are required;
    /// `ENGINE_TIMEOUT_SECS` defaults to 30.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("ENGINE_BASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("ENGINE_BASE_URL".into()))?;
        let api_key = std::env::var("ENGINE_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("ENGINE_API_KEY".into()))?;
        let timeout_secs: u64 = std::env::var("ENGINE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            base_url,
            api_key: SecretString::from(api_key),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// reqwest-backed implementation of [`EngineClient`].
pub struct HttpEngineClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    timeout_secs: u64,
}

impl HttpEngineClient {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EngineError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            timeout_secs: config.timeout.as_secs(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send a request, mapping transport and HTTP-level failures into the
    /// engine error taxonomy.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, EngineError> {
        let response = request
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::Timeout {
                        seconds: self.timeout_secs,
                    }
                } else {
                    EngineError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        let message = truncate(&message, 200);
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(EngineError::Auth { message });
        }
        Err(EngineError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, EngineError> {
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| EngineError::Decode(e.to_string()))?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl EngineClient for HttpEngineClient {
    async fn ping(&self) -> Result<(), EngineError> {
        self.send(self.http.get(self.url("/workflows"))).await?;
        Ok(())
    }

    async fn create_workflow(
        &self,
        definition: &WorkflowDefinition,
    ) -> Result<CreatedWorkflow, EngineError> {
        let response = self
            .send(self.http.post(self.url("/workflows")).json(definition))
            .await?;
        Self::decode(response).await
    }

    async fn activate_workflow(&self, id: &str) -> Result<(), EngineError> {
        self.send(self.http.post(self.url(&format!("/workflows/{id}/activate"))))
            .await?;
        Ok(())
    }

    async fn deactivate_workflow(&self, id: &str) -> Result<(), EngineError> {
        self.send(self.http.post(self.url(&format!("/workflows/{id}/deactivate"))))
            .await?;
        Ok(())
    }

    async fn delete_workflow(&self, id: &str) -> Result<(), EngineError> {
        self.send(self.http.delete(self.url(&format!("/workflows/{id}"))))
            .await?;
        Ok(())
    }

    async fn get_workflow(&self, id: &str) -> Result<WorkflowInfo, EngineError> {
        let response = self
            .send(self.http.get(self.url(&format!("/workflows/{id}"))))
            .await?;
        Self::decode(response).await
    }

    async fn execute_workflow(
        &self,
        id: &str,
        payload: &serde_json::Value,
    ) -> Result<ExecutionStarted, EngineError> {
        let response = self
            .send(
                self.http
                    .post(self.url(&format!("/workflows/{id}/execute")))
                    .json(payload),
            )
            .await?;
        Self::decode(response).await
    }

    async fn get_execution(&self, id: &str) -> Result<ExecutionSample, EngineError> {
        let response = self
            .send(self.http.get(self.url(&format!("/executions/{id}"))))
            .await?;
        Self::decode(response).await
    }

    async fn list_executions(
        &self,
        workflow_id: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionSample>, EngineError> {
        let limit = limit.to_string();
        let response = self
            .send(
                self.http
                    .get(self.url("/executions"))
                    .query(&[("workflowId", workflow_id), ("limit", limit.as_str())]),
            )
            .await?;
        Self::decode(response).await
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
