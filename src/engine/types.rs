//! Wire types for the external workflow engine API.
//!
//! Every engine response arrives wrapped in a `{data: ...}` envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The `{data: ...}` envelope the engine wraps every response in.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: T,
}

/// Response to a workflow creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedWorkflow {
    pub id: String,
    pub name: String,
}

/// Summary returned when querying one workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInfo {
    pub id: String,
    pub name: String,
    pub active: bool,
}

/// Response to submitting an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStarted {
    pub execution_id: String,
    pub status: String,
}

/// One execution sampled from the engine. Read on demand, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSample {
    pub id: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExecutionSample {
    /// Whether the engine reports this execution as finished.
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some() || self.succeeded() || self.failed()
    }

    /// Engine outcomes that count as a pass.
    pub fn succeeded(&self) -> bool {
        matches!(
            self.status.to_ascii_lowercase().as_str(),
            "success" | "completed"
        )
    }

    fn failed(&self) -> bool {
        matches!(
            self.status.to_ascii_lowercase().as_str(),
            "error" | "failed" | "crashed" | "canceled" | "cancelled"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(status: &str, finished: bool) -> ExecutionSample {
        ExecutionSample {
            id: "ex-1".into(),
            status: status.into(),
            started_at: Utc::now(),
            finished_at: finished.then(Utc::now),
        }
    }

    #[test]
    fn success_and_completed_pass() {
        assert!(sample("success", true).succeeded());
        assert!(sample("Completed", true).succeeded());
        assert!(!sample("error", true).succeeded());
        assert!(!sample("running", false).succeeded());
    }

    #[test]
    fn terminal_statuses_count_as_finished() {
        assert!(sample("error", false).is_finished());
        assert!(sample("success", false).is_finished());
        assert!(!sample("running", false).is_finished());
        assert!(sample("running", true).is_finished());
    }

    #[test]
    fn envelope_unwraps_data() {
        let raw = r#"{"data": {"id": "wf-1", "name": "Email Automation"}}"#;
        let envelope: Envelope<CreatedWorkflow> = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.data.id, "wf-1");
    }

    #[test]
    fn execution_wire_format_is_camel_case() {
        let raw = r#"{"data": [{"id": "ex-1", "status": "success",
            "startedAt": "2026-01-05T10:00:00Z", "finishedAt": "2026-01-05T10:00:03Z"}]}"#;
        let envelope: Envelope<Vec<ExecutionSample>> = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.data.len(), 1);
        assert!(envelope.data[0].succeeded());
    }
}
