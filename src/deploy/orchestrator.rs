//! Deployment orchestrator — drives create → verify → record with bounded
//! retries.
//!
//! Create and verify are retried as one unit: a workflow that was created
//! but failed verification is deleted (best effort) and rebuilt on the
//! next attempt. After the attempt budget is spent the deployment is
//! marked `Failed` and an operator is paged.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::automation::AutomationConfig;
use crate::config::DeployConfig;
use crate::engine::EngineClient;
use crate::error::{DeployError, Error};
use crate::notify::{dispatch_best_effort, Notification, Notifier, Template};
use crate::store::Database;
use crate::template::{customize, master_template, WorkflowDefinition};

use super::locks::UserLocks;
use super::record::{DeploymentRecord, DeploymentStatus};
use super::verifier::{Verifier, VerifyConfig};

/// Result of a successful deployment.
#[derive(Debug, Clone)]
pub struct DeployOutcome {
    pub workflow_id: String,
    pub status: DeploymentStatus,
}

/// Collaborators the orchestrator drives.
pub struct OrchestratorDeps {
    pub engine: Arc<dyn EngineClient>,
    pub db: Arc<dyn Database>,
    pub notifier: Arc<dyn Notifier>,
    pub locks: Arc<UserLocks>,
}

/// Drives one user's deployment lifecycle.
pub struct Orchestrator {
    config: DeployConfig,
    engine: Arc<dyn EngineClient>,
    db: Arc<dyn Database>,
    notifier: Arc<dyn Notifier>,
    locks: Arc<UserLocks>,
    verifier: Verifier,
}

impl Orchestrator {
    pub fn new(config: DeployConfig, verify: VerifyConfig, deps: OrchestratorDeps) -> Self {
        let verifier = Verifier::new(Arc::clone(&deps.engine), verify);
        Self {
            config,
            engine: deps.engine,
            db: deps.db,
            notifier: deps.notifier,
            locks: deps.locks,
            verifier,
        }
    }

    /// Deploy a user's automation and verify it runs.
    ///
    /// The config is snapshotted into the deployment record exactly as
    /// deployed, so later config edits cannot drift under a live workflow.
    pub async fn deploy(
        &self,
        user_id: &str,
        config: &AutomationConfig,
    ) -> Result<DeployOutcome, DeployError> {
        config.validate()?;

        let _guard = self.locks.acquire(user_id).await;

        let mut master = master_template();
        master.name = self.config.name_prefix.clone();
        let definition = customize(&master, user_id, config);

        let mut last_error = String::from("no attempt made");
        for attempt in 1..=self.config.max_attempts {
            if let Some(delay) = self.config.backoff_before_attempt(attempt) {
                info!(
                    user_id,
                    attempt,
                    delay_secs = delay.as_secs(),
                    "Backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }

            match self.attempt(user_id, &definition, config).await {
                Ok(workflow_id) => {
                    self.persist_status(user_id, DeploymentStatus::Active, None)
                        .await?;
                    info!(user_id, workflow_id = %workflow_id, "Deployment verified and active");
                    return Ok(DeployOutcome {
                        workflow_id,
                        status: DeploymentStatus::Active,
                    });
                }
                Err(e) => {
                    warn!(user_id, attempt, error = %e, "Deployment attempt failed");
                    last_error = e.to_string();
                }
            }
        }

        error!(user_id, error = %last_error, "Deployment attempts exhausted, escalating");
        if let Err(e) = self
            .persist_status(user_id, DeploymentStatus::Failed, Some(&last_error))
            .await
        {
            warn!(user_id, error = %e, "Failed to persist failed deployment status");
        }
        dispatch_best_effort(
            self.notifier.as_ref(),
            Notification::new(
                &self.config.operator_email,
                Template::ManualIntervention,
                json!({"user_id": user_id, "error": last_error}),
            ),
        )
        .await;

        Err(DeployError::Exhausted {
            attempts: self.config.max_attempts,
            last_error,
        })
    }

    /// One create → activate → verify attempt.
    async fn attempt(
        &self,
        user_id: &str,
        definition: &WorkflowDefinition,
        config: &AutomationConfig,
    ) -> Result<String, DeployError> {
        self.engine.ping().await?;

        let created = self.engine.create_workflow(definition).await?;
        debug!(user_id, workflow_id = %created.id, "Workflow created on engine");

        let record =
            DeploymentRecord::new(user_id, &created.id, &definition.name, config.clone());
        if let Err(e) = self.db.upsert_deployment(&record).await {
            self.cleanup_workflow(&created.id).await;
            return Err(DeployError::Transient {
                reason: format!("persist deployment record: {e}"),
            });
        }

        if let Err(e) = self.engine.activate_workflow(&created.id).await {
            self.mark_retrying(user_id).await;
            self.cleanup_workflow(&created.id).await;
            return Err(e.into());
        }

        let report = self.verifier.verify(&created.id).await;
        if !report.success {
            let outcome = report.error.unwrap_or_else(|| "unknown".into());
            self.mark_retrying(user_id).await;
            self.cleanup_workflow(&created.id).await;
            return Err(DeployError::Verification { outcome });
        }

        Ok(created.id)
    }

    /// Tear down a user's automation: deactivate and delete the external
    /// workflow, then drop the record.
    pub async fn teardown(&self, user_id: &str) -> Result<(), Error> {
        let _guard = self.locks.acquire(user_id).await;

        let Some(record) = self.db.get_deployment(user_id).await.map_err(Error::Database)?
        else {
            return Ok(());
        };

        if let Err(e) = self.engine.deactivate_workflow(&record.workflow_id).await {
            debug!(user_id, error = %e, "Deactivate during teardown failed");
        }
        if let Err(e) = self.engine.delete_workflow(&record.workflow_id).await {
            debug!(user_id, error = %e, "Delete during teardown failed");
        }
        self.db
            .delete_deployment(user_id)
            .await
            .map_err(Error::Database)?;
        info!(user_id, workflow_id = %record.workflow_id, "Deployment torn down");
        Ok(())
    }

    /// Send the record back to `Deploying` for the next attempt.
    async fn mark_retrying(&self, user_id: &str) {
        if let Err(e) = self
            .db
            .update_deployment_status(user_id, DeploymentStatus::Deploying, None)
            .await
        {
            warn!(user_id, error = %e, "Failed to persist retry status");
        }
    }

    /// Delete a half-deployed workflow so the retry starts clean.
    async fn cleanup_workflow(&self, workflow_id: &str) {
        if let Err(e) = self.engine.delete_workflow(workflow_id).await {
            debug!(workflow_id, error = %e, "Cleanup delete failed");
        }
    }

    /// Load, transition, and re-persist the record. A deployment that never
    /// reached the engine has no record; that is not an error here.
    async fn persist_status(
        &self,
        user_id: &str,
        status: DeploymentStatus,
        last_error: Option<&str>,
    ) -> Result<(), DeployError> {
        let record = self
            .db
            .get_deployment(user_id)
            .await
            .map_err(|e| DeployError::Transient {
                reason: format!("load deployment record: {e}"),
            })?;

        let Some(mut record) = record else {
            return Ok(());
        };
        if record.status == status {
            return Ok(());
        }

        record
            .transition_to(status)
            .map_err(|reason| DeployError::Transient { reason })?;
        record.last_error = last_error.map(String::from);
        self.db
            .upsert_deployment(&record)
            .await
            .map_err(|e| DeployError::Transient {
                reason: format!("persist deployment record: {e}"),
            })
    }
}
