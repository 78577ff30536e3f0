//! Unified `Database` trait — the persistence seam for deployments, users
//! and automation configs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::automation::AutomationConfig;
use crate::deploy::record::{DeploymentRecord, DeploymentStatus};
use crate::error::DatabaseError;

/// OAuth credential status for a user's mailbox connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OauthStatus {
    Valid,
    Expired,
    Disconnected,
}

impl std::fmt::Display for OauthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Valid => "valid",
            Self::Expired => "expired",
            Self::Disconnected => "disconnected",
        };
        write!(f, "{s}")
    }
}

/// A user record as the onboarding and recovery flows see it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub email_verified: bool,
    pub business_type: Option<String>,
    pub oauth_status: OauthStatus,
    pub onboarding_completed: bool,
    pub onboarding_completed_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            email_verified: false,
            business_type: None,
            oauth_status: OauthStatus::Disconnected,
            onboarding_completed: false,
            onboarding_completed_at: None,
        }
    }
}

/// Backend-agnostic database trait covering deployments, users and
/// automation configs.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Deployments ─────────────────────────────────────────────────

    /// Insert or replace the deployment record for a user.
    async fn upsert_deployment(&self, record: &DeploymentRecord) -> Result<(), DatabaseError>;

    /// Get a user's deployment record, if any.
    async fn get_deployment(
        &self,
        user_id: &str,
    ) -> Result<Option<DeploymentRecord>, DatabaseError>;

    /// Update only the status and last error of a user's deployment.
    async fn update_deployment_status(
        &self,
        user_id: &str,
        status: DeploymentStatus,
        last_error: Option<&str>,
    ) -> Result<(), DatabaseError>;

    /// Remove a user's deployment record.
    async fn delete_deployment(&self, user_id: &str) -> Result<(), DatabaseError>;

    /// All user ids that currently have a deployment record.
    async fn list_deployment_user_ids(&self) -> Result<Vec<String>, DatabaseError>;

    // ── Users ───────────────────────────────────────────────────────

    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, DatabaseError>;

    async fn upsert_user(&self, user: &UserRecord) -> Result<(), DatabaseError>;

    async fn set_oauth_status(
        &self,
        user_id: &str,
        status: OauthStatus,
    ) -> Result<(), DatabaseError>;

    /// Mark onboarding completed, only if not already set.
    ///
    /// Compare-and-set: returns `true` when this call performed the
    /// transition, `false` when the flag was already set. Callers use this
    /// to make the completion side effect exactly-once under concurrent
    /// polls.
    async fn try_complete_onboarding(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError>;

    // ── Automation configs ──────────────────────────────────────────

    async fn get_automation_config(
        &self,
        user_id: &str,
    ) -> Result<Option<AutomationConfig>, DatabaseError>;

    async fn save_automation_config(
        &self,
        user_id: &str,
        config: &AutomationConfig,
    ) -> Result<(), DatabaseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oauth_status_display_matches_serde() {
        for status in [
            OauthStatus::Valid,
            OauthStatus::Expired,
            OauthStatus::Disconnected,
        ] {
            let display = format!("{status}");
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(format!("\"{display}\""), json);
        }
    }

    #[test]
    fn new_user_starts_unverified_and_disconnected() {
        let user = UserRecord::new("u1", "u1@example.com");
        assert!(!user.email_verified);
        assert!(!user.onboarding_completed);
        assert_eq!(user.oauth_status, OauthStatus::Disconnected);
    }
}
