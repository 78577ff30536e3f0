//! Recovery sweep — reactivates inactive workflows, detects staleness, and
//! routes credential problems to the re-auth flow.
//!
//! A reactivation failure after a successful deployment usually means a
//! revoked or expired mailbox credential, not a transient blip, so it
//! escalates straight to re-auth instead of retrying with backoff.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use rand::Rng;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::deploy::locks::UserLocks;
use crate::deploy::record::{DeploymentRecord, DeploymentStatus};
use crate::engine::EngineClient;
use crate::error::{DatabaseError, Error};
use crate::notify::{dispatch_best_effort, Notification, Notifier, Template};
use crate::store::{Database, OauthStatus};

/// One action taken (or observation made) during a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepAction {
    /// Inactive workflow was brought back up.
    Reactivated { workflow_id: String },
    /// Credential problem detected; re-auth flow dispatched.
    ReauthTriggered { workflow_id: String },
    /// Re-auth already pending; nothing re-sent.
    ReauthPending,
    /// Healthy but no execution inside the first-execution window.
    AwaitingFirstExecution { workflow_id: String },
    /// Recent execution observed.
    Healthy { workflow_id: String },
}

/// Result of sweeping one user.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub user_id: String,
    pub workflows_checked: usize,
    pub actions: Vec<SweepAction>,
}

impl SweepReport {
    fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.into(),
            workflows_checked: 0,
            actions: Vec::new(),
        }
    }
}

/// Collaborators the monitor drives.
pub struct MonitorDeps {
    pub engine: Arc<dyn EngineClient>,
    pub db: Arc<dyn Database>,
    pub notifier: Arc<dyn Notifier>,
    pub locks: Arc<UserLocks>,
}

/// Periodic supervisor for deployed workflows.
pub struct RecoveryMonitor {
    config: MonitorConfig,
    engine: Arc<dyn EngineClient>,
    db: Arc<dyn Database>,
    notifier: Arc<dyn Notifier>,
    locks: Arc<UserLocks>,
}

impl RecoveryMonitor {
    pub fn new(config: MonitorConfig, deps: MonitorDeps) -> Self {
        Self {
            config,
            engine: deps.engine,
            db: deps.db,
            notifier: deps.notifier,
            locks: deps.locks,
        }
    }

    /// Sweep one user's deployment.
    pub async fn sweep(&self, user_id: &str) -> Result<SweepReport, Error> {
        let _guard = self.locks.acquire(user_id).await;

        let Some(mut record) = self.db.get_deployment(user_id).await.map_err(Error::Database)?
        else {
            return Ok(SweepReport::empty(user_id));
        };

        let mut report = SweepReport {
            user_id: user_id.into(),
            workflows_checked: 1,
            actions: Vec::new(),
        };

        if record.status.is_terminal() {
            debug!(user_id, "Deployment failed earlier; awaiting manual intervention");
            return Ok(report);
        }

        // External status first: an inactive workflow gets one reactivation
        // try; failure routes to re-auth.
        match self.engine.get_workflow(&record.workflow_id).await {
            Ok(info) if !info.active => {
                match self.engine.activate_workflow(&record.workflow_id).await {
                    Ok(()) => {
                        info!(user_id, workflow_id = %record.workflow_id, "Workflow reactivated");
                        self.persist_record_status(&mut record, DeploymentStatus::Active)
                            .await?;
                        report.actions.push(SweepAction::Reactivated {
                            workflow_id: record.workflow_id.clone(),
                        });
                    }
                    Err(e) => {
                        warn!(
                            user_id,
                            workflow_id = %record.workflow_id,
                            error = %e,
                            "Reactivation failed, routing to re-auth"
                        );
                        let action = self
                            .trigger_reauth(user_id, &mut record, &e.to_string())
                            .await?;
                        report.actions.push(action);
                        return Ok(report);
                    }
                }
            }
            Ok(_) => {
                // Engine reports the workflow running; realign a paused record.
                if matches!(
                    record.status,
                    DeploymentStatus::Inactive | DeploymentStatus::NeedsReauth
                ) {
                    info!(user_id, "Workflow healthy again on engine, resuming record");
                    self.persist_record_status(&mut record, DeploymentStatus::Active)
                        .await?;
                }
            }
            Err(e) if e.is_auth() => {
                let action = self
                    .trigger_reauth(user_id, &mut record, &e.to_string())
                    .await?;
                report.actions.push(action);
                return Ok(report);
            }
            Err(e) => {
                warn!(user_id, error = %e, "Workflow status query failed, will retry next sweep");
                return Ok(report);
            }
        }

        // Execution recency. Zero recent executions on a healthy deployment
        // is logged, not alarmed — the mailbox may simply be quiet.
        match self
            .engine
            .list_executions(&record.workflow_id, self.config.execution_sample_limit)
            .await
        {
            Ok(samples) => {
                let now = Utc::now();
                let first_window = chrono::Duration::from_std(self.config.first_execution_window)
                    .unwrap_or_else(|_| chrono::Duration::minutes(10));
                let health_window = chrono::Duration::from_std(self.config.health_lookback)
                    .unwrap_or_else(|_| chrono::Duration::hours(24));

                let within_first = samples.iter().any(|s| s.started_at > now - first_window);
                let within_health = samples.iter().any(|s| s.started_at > now - health_window);

                if within_first {
                    report.actions.push(SweepAction::Healthy {
                        workflow_id: record.workflow_id.clone(),
                    });
                } else {
                    info!(
                        user_id,
                        workflow_id = %record.workflow_id,
                        "No execution in the first-execution window; waiting for mail"
                    );
                    if !within_health {
                        debug!(user_id, "No executions within the health lookback either");
                    }
                    report.actions.push(SweepAction::AwaitingFirstExecution {
                        workflow_id: record.workflow_id.clone(),
                    });
                }
            }
            Err(e) if e.is_auth() => {
                let action = self
                    .trigger_reauth(user_id, &mut record, &e.to_string())
                    .await?;
                report.actions.push(action);
            }
            Err(e) => {
                warn!(user_id, error = %e, "Execution listing failed, will retry next sweep");
            }
        }

        Ok(report)
    }

    /// Sweep a batch of independent users concurrently, bounded by the
    /// configured cap so the engine API is not overwhelmed.
    pub async fn sweep_batch(&self, user_ids: Vec<String>) -> Vec<SweepReport> {
        stream::iter(user_ids)
            .map(|user_id| async move {
                match self.sweep(&user_id).await {
                    Ok(report) => Some(report),
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "Sweep failed");
                        None
                    }
                }
            })
            .buffer_unordered(self.config.sweep_concurrency)
            .filter_map(|report| async move { report })
            .collect()
            .await
    }

    /// Mark credentials expired, pause the deployment, and prompt the user.
    ///
    /// Idempotent: a still-unresolved re-auth is not re-sent.
    async fn trigger_reauth(
        &self,
        user_id: &str,
        record: &mut DeploymentRecord,
        reason: &str,
    ) -> Result<SweepAction, Error> {
        let user = self.db.get_user(user_id).await.map_err(Error::Database)?;

        let already_pending = record.status == DeploymentStatus::NeedsReauth
            && user
                .as_ref()
                .map(|u| u.oauth_status == OauthStatus::Expired)
                .unwrap_or(false);
        if already_pending {
            debug!(user_id, "Re-auth already pending, not re-sending");
            return Ok(SweepAction::ReauthPending);
        }

        match self.db.set_oauth_status(user_id, OauthStatus::Expired).await {
            Ok(()) => {}
            Err(DatabaseError::NotFound { .. }) => {
                warn!(user_id, "No user record while triggering re-auth");
            }
            Err(e) => return Err(Error::Database(e)),
        }

        self.persist_record_status(record, DeploymentStatus::NeedsReauth)
            .await?;

        if let Some(user) = user {
            let reauth_url = format!(
                "{}/reauth?user={user_id}",
                self.config.reauth_link_base.trim_end_matches('/')
            );
            dispatch_best_effort(
                self.notifier.as_ref(),
                Notification::new(
                    user.email,
                    Template::ReauthRequired,
                    json!({"user_id": user_id, "reauth_url": reauth_url, "reason": reason}),
                ),
            )
            .await;
        }

        warn!(user_id, reason, "Re-auth flow triggered");
        Ok(SweepAction::ReauthTriggered {
            workflow_id: record.workflow_id.clone(),
        })
    }

    /// Walk the record's state machine to `target` and persist the result.
    async fn persist_record_status(
        &self,
        record: &mut DeploymentRecord,
        target: DeploymentStatus,
    ) -> Result<(), Error> {
        if record.status == target {
            return Ok(());
        }
        record.transition_to(target).map_err(|reason| {
            Error::Recovery(crate::error::RecoveryError::SweepFailed {
                user_id: record.user_id.clone(),
                reason,
            })
        })?;
        self.db
            .upsert_deployment(record)
            .await
            .map_err(Error::Database)
    }
}

/// Spawn the periodic sweep task. Stops when `shutdown` is set.
///
/// The first pass is jittered so a restarting fleet does not stampede the
/// engine API.
pub fn spawn_sweep_ticker(
    monitor: Arc<RecoveryMonitor>,
    shutdown: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let interval = monitor.config.sweep_interval;
        let jitter_ms = rand::thread_rng().gen_range(0..(interval.as_millis() as u64 / 10).max(1));
        tokio::time::sleep(Duration::from_millis(jitter_ms)).await;

        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if shutdown.load(Ordering::Relaxed) {
                info!("Sweep loop shutting down");
                return;
            }

            let user_ids = match monitor.db.list_deployment_user_ids().await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(error = %e, "Could not list deployments for sweep");
                    continue;
                }
            };
            if user_ids.is_empty() {
                continue;
            }

            let users = user_ids.len();
            let reports = monitor.sweep_batch(user_ids).await;
            let actions: usize = reports.iter().map(|r| r.actions.len()).sum();
            info!(users, actions, "Sweep pass complete");
        }
    })
}
