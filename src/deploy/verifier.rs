//! Post-deploy verification — prove a freshly created workflow actually
//! executes.
//!
//! Creation can succeed structurally while the generated logic is
//! unexecutable, so creation success alone is not trusted. One synthetic
//! representative email is pushed through the execution entry point and
//! the resulting execution polled to a terminal status.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use crate::engine::EngineClient;

/// Verification runner configuration.
#[derive(Debug, Clone)]
pub struct VerifyConfig {
    /// Delay between execution status polls.
    pub poll_interval: Duration,
    /// Maximum polls before giving up on a terminal status.
    pub max_polls: u32,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_polls: 10,
        }
    }
}

/// Outcome of a verification run.
///
/// `error` carries the engine's raw status string for diagnostics; it is
/// classified before crossing the orchestrator boundary.
#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub success: bool,
    pub execution_id: Option<String>,
    pub error: Option<String>,
}

impl VerifyReport {
    fn passed(execution_id: String) -> Self {
        Self {
            success: true,
            execution_id: Some(execution_id),
            error: None,
        }
    }

    fn failed(execution_id: Option<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            execution_id,
            error: Some(error.into()),
        }
    }
}

/// Submits a synthetic event and inspects the resulting execution.
pub struct Verifier {
    engine: Arc<dyn EngineClient>,
    config: VerifyConfig,
}

impl Verifier {
    pub fn new(engine: Arc<dyn EngineClient>, config: VerifyConfig) -> Self {
        Self { engine, config }
    }

    /// A representative email payload for the synthetic test run.
    pub fn synthetic_event() -> serde_json::Value {
        json!({
            "id": Uuid::new_v4().to_string(),
            "from": "prospect@example.com",
            "subject": "Quote request for spring project",
            "body": "Hi — could you send over a price quote? We're interested \
                     in getting started next month.",
            "receivedAt": chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Run one synthetic execution through the workflow.
    ///
    /// An outcome of "success" or "completed" passes; any other outcome or
    /// a transport error fails with the raw status captured.
    pub async fn verify(&self, workflow_id: &str) -> VerifyReport {
        let payload = Self::synthetic_event();

        let started = match self.engine.execute_workflow(workflow_id, &payload).await {
            Ok(started) => started,
            Err(e) => {
                return VerifyReport::failed(None, format!("synthetic execution rejected: {e}"));
            }
        };

        let execution_id = started.execution_id.clone();
        let mut last_status = started.status;

        for _ in 0..self.config.max_polls {
            match self.engine.get_execution(&execution_id).await {
                Ok(sample) if sample.is_finished() => {
                    if sample.succeeded() {
                        tracing::debug!(workflow_id, execution_id = %execution_id, "Verification passed");
                        return VerifyReport::passed(execution_id);
                    }
                    return VerifyReport::failed(
                        Some(execution_id),
                        format!("execution finished with status \"{}\"", sample.status),
                    );
                }
                Ok(sample) => last_status = sample.status,
                Err(e) => {
                    return VerifyReport::failed(
                        Some(execution_id),
                        format!("execution status unavailable: {e}"),
                    );
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }

        VerifyReport::failed(
            Some(execution_id),
            format!("execution did not finish within the poll budget (last status \"{last_status}\")"),
        )
    }
}
