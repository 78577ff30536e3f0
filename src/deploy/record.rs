//! Deployment lifecycle record and status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::automation::AutomationConfig;

/// Status of a user's deployment on the external engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    /// Creation in progress (or being retried).
    Deploying,
    /// Created on the engine, synthetic verification pending.
    Testing,
    /// Verified and running.
    Active,
    /// Engine reports the workflow deactivated.
    Inactive,
    /// All attempts exhausted; operator paged.
    Failed,
    /// Paused pending mailbox re-authorization.
    NeedsReauth,
}

impl DeploymentStatus {
    /// Check if a transition from `self` to `target` is valid.
    ///
    /// Status only moves forward along the deployment lifecycle — in
    /// particular, nothing reaches `Active` without passing `Testing`.
    pub fn can_transition_to(&self, target: DeploymentStatus) -> bool {
        use DeploymentStatus::*;

        matches!(
            (self, target),
            // Deploy path
            (Deploying, Testing) | (Testing, Active) |
            // Verification failure sends the attempt back
            (Testing, Deploying) |
            // Exhausted retries
            (Deploying, Failed) | (Testing, Failed) |
            // Supervision
            (Active, Inactive) | (Inactive, Active) |
            (Active, NeedsReauth) | (Inactive, NeedsReauth) |
            // Credentials restored, sweep reactivated
            (NeedsReauth, Active)
        )
    }

    /// Whether this is a terminal state requiring manual intervention.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Whether the deployment is verified and running.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Deploying => "deploying",
            Self::Testing => "testing",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Failed => "failed",
            Self::NeedsReauth => "needs_reauth",
        };
        write!(f, "{s}")
    }
}

/// The lifecycle record tracking one user's single workflow instance.
///
/// Upserted keyed by `user_id`; a redeploy replaces the previous record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub user_id: String,
    pub workflow_id: String,
    pub name: String,
    pub status: DeploymentStatus,
    /// The config actually deployed — not the latest config, to avoid
    /// drift if the config changes mid-deployment.
    pub config_snapshot: AutomationConfig,
    pub last_error: Option<String>,
    pub deployed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeploymentRecord {
    /// Record created on first successful external creation, verification
    /// still pending.
    pub fn new(
        user_id: impl Into<String>,
        workflow_id: impl Into<String>,
        name: impl Into<String>,
        config_snapshot: AutomationConfig,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            workflow_id: workflow_id.into(),
            name: name.into(),
            status: DeploymentStatus::Testing,
            config_snapshot,
            last_error: None,
            deployed_at: now,
            updated_at: now,
        }
    }

    /// Transition to a new status, rejecting moves the lifecycle does not
    /// allow.
    pub fn transition_to(&mut self, status: DeploymentStatus) -> Result<(), String> {
        if !self.status.can_transition_to(status) {
            return Err(format!(
                "Cannot transition deployment from {} to {}",
                self.status, status
            ));
        }
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }
}
