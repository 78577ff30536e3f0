//! Onboarding completion aggregator — AND-gate over the seven readiness
//! checks.
//!
//! All checks are recomputed on every call (no short-circuit) because
//! partial progress feeds the dashboard. The one-time completion side
//! effect rides on a store-level compare-and-set, so the aggregator is
//! safely callable from concurrent polls.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use crate::deploy::record::DeploymentStatus;
use crate::engine::EngineClient;
use crate::error::Error;
use crate::notify::{dispatch_best_effort, Notification, Notifier, Template};
use crate::store::{Database, OauthStatus};

use super::steps::{CompletionReport, OnboardingStep, StepResult};

/// How many recent executions to ask the engine for when looking for the
/// first one.
const EXECUTION_SAMPLE_LIMIT: usize = 20;

/// Collaborators the validator reads from.
pub struct ValidatorDeps {
    pub engine: Arc<dyn EngineClient>,
    pub db: Arc<dyn Database>,
    pub notifier: Arc<dyn Notifier>,
}

/// Recomputes onboarding readiness for a user.
pub struct CompletionValidator {
    engine: Arc<dyn EngineClient>,
    db: Arc<dyn Database>,
    notifier: Arc<dyn Notifier>,
}

impl CompletionValidator {
    pub fn new(deps: ValidatorDeps) -> Self {
        Self {
            engine: deps.engine,
            db: deps.db,
            notifier: deps.notifier,
        }
    }

    /// Run all seven checks and fire the one-time completion side effect if
    /// this call is the first to see everything done.
    pub async fn validate(&self, user_id: &str) -> Result<CompletionReport, Error> {
        let user = self.db.get_user(user_id).await.map_err(Error::Database)?;
        let config = self
            .db
            .get_automation_config(user_id)
            .await
            .map_err(Error::Database)?;
        let deployment = self
            .db
            .get_deployment(user_id)
            .await
            .map_err(Error::Database)?;

        let mut steps = Vec::with_capacity(OnboardingStep::ALL.len());

        steps.push(match &user {
            Some(u) if u.email_verified => {
                StepResult::complete(OnboardingStep::EmailVerified, "Email address verified")
            }
            _ => StepResult::incomplete(
                OnboardingStep::EmailVerified,
                "Email address not yet verified",
            ),
        });

        steps.push(match user.as_ref().and_then(|u| u.business_type.as_deref()) {
            Some(business_type) => {
                StepResult::complete(OnboardingStep::BusinessTypeSelected, "Business type selected")
                    .with_detail(business_type)
            }
            None => StepResult::incomplete(
                OnboardingStep::BusinessTypeSelected,
                "No business type selected",
            ),
        });

        steps.push(match &user {
            Some(u) if u.oauth_status == OauthStatus::Valid => {
                StepResult::complete(OnboardingStep::MailboxConnected, "Mailbox connected")
            }
            Some(u) => StepResult::incomplete(
                OnboardingStep::MailboxConnected,
                format!("Mailbox not connected (status: {})", u.oauth_status),
            ),
            None => {
                StepResult::incomplete(OnboardingStep::MailboxConnected, "Mailbox not connected")
            }
        });

        steps.push(match &config {
            Some(c) if !c.business_categories.is_empty() => StepResult::complete(
                OnboardingStep::BusinessInfoProvided,
                "Business categories configured",
            )
            .with_detail(format!("{} categories", c.business_categories.len())),
            _ => StepResult::incomplete(
                OnboardingStep::BusinessInfoProvided,
                "Business categories not yet configured",
            ),
        });

        steps.push(match &deployment {
            Some(d) if !d.workflow_id.is_empty() => {
                StepResult::complete(OnboardingStep::WorkflowDeployed, "Workflow deployed")
                    .with_detail(d.workflow_id.clone())
            }
            _ => StepResult::incomplete(
                OnboardingStep::WorkflowDeployed,
                "Automation not yet deployed",
            ),
        });

        // The only path to `Active` goes through the synthetic test, so an
        // active deployment is a verified one.
        steps.push(match &deployment {
            Some(d) if d.status == DeploymentStatus::Active => {
                StepResult::complete(OnboardingStep::WorkflowVerified, "Automation tested")
            }
            Some(d) => StepResult::incomplete(
                OnboardingStep::WorkflowVerified,
                format!("Automation not verified (status: {})", d.status),
            ),
            None => {
                StepResult::incomplete(OnboardingStep::WorkflowVerified, "Automation not deployed")
            }
        });

        steps.push(self.first_execution_step(deployment.as_ref()).await);

        let completed = steps.iter().filter(|s| s.completed).count();
        let complete = completed == steps.len();
        let completion_rate = completed as f32 / steps.len() as f32 * 100.0;

        if complete {
            let already_done = user
                .as_ref()
                .map(|u| u.onboarding_completed)
                .unwrap_or(false);
            if !already_done {
                // Compare-and-set — only the winning poll sends the announcement.
                let won = self
                    .db
                    .try_complete_onboarding(user_id, Utc::now())
                    .await
                    .map_err(Error::Database)?;
                if won {
                    info!(user_id, "Onboarding complete, automation live");
                    if let Some(user) = &user {
                        dispatch_best_effort(
                            self.notifier.as_ref(),
                            Notification::new(
                                user.email.clone(),
                                Template::AutomationLive,
                                json!({"user_id": user_id}),
                            ),
                        )
                        .await;
                    }
                }
            }
        } else {
            debug!(user_id, completed, "Onboarding incomplete");
        }

        Ok(CompletionReport {
            steps,
            completion_rate,
            complete,
        })
    }

    /// Check whether the deployed workflow has executed at least once.
    ///
    /// An engine error makes the check incomplete with a message rather
    /// than failing the whole validation — partial progress is still
    /// useful to the dashboard.
    async fn first_execution_step(
        &self,
        deployment: Option<&crate::deploy::record::DeploymentRecord>,
    ) -> StepResult {
        let Some(deployment) = deployment else {
            return StepResult::incomplete(
                OnboardingStep::FirstExecutionObserved,
                "Automation not deployed",
            );
        };
        if deployment.status != DeploymentStatus::Active {
            return StepResult::incomplete(
                OnboardingStep::FirstExecutionObserved,
                "Automation not yet running",
            );
        }

        match self
            .engine
            .list_executions(&deployment.workflow_id, EXECUTION_SAMPLE_LIMIT)
            .await
        {
            Ok(samples) if !samples.is_empty() => StepResult::complete(
                OnboardingStep::FirstExecutionObserved,
                "First execution observed",
            )
            .with_detail(samples[0].id.clone()),
            Ok(_) => StepResult::incomplete(
                OnboardingStep::FirstExecutionObserved,
                "Waiting for the first execution",
            ),
            Err(e) => StepResult::incomplete(
                OnboardingStep::FirstExecutionObserved,
                "Could not query executions",
            )
            .with_detail(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::{AutomationConfig, BusinessCategory};
    use crate::deploy::record::DeploymentRecord;
    use crate::engine::testing::{execution_at, ScriptedEngine};
    use crate::notify::testing::RecordingNotifier;
    use crate::store::{MemoryBackend, UserRecord};

    struct Harness {
        engine: Arc<ScriptedEngine>,
        db: Arc<MemoryBackend>,
        notifier: Arc<RecordingNotifier>,
        validator: CompletionValidator,
    }

    fn harness() -> Harness {
        let engine = Arc::new(ScriptedEngine::new());
        let db = Arc::new(MemoryBackend::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let validator = CompletionValidator::new(ValidatorDeps {
            engine: Arc::clone(&engine) as Arc<dyn EngineClient>,
            db: Arc::clone(&db) as Arc<dyn Database>,
            notifier: Arc::clone(&notifier) as Arc<dyn Notifier>,
        });
        Harness {
            engine,
            db,
            notifier,
            validator,
        }
    }

    async fn seed_ready_user(h: &Harness) {
        let mut user = UserRecord::new("u1", "u1@example.com");
        user.email_verified = true;
        user.business_type = Some("contractor".into());
        user.oauth_status = OauthStatus::Valid;
        h.db.upsert_user(&user).await.unwrap();

        let config = AutomationConfig {
            business_categories: vec![BusinessCategory {
                name: "New Leads".into(),
                description: String::new(),
            }],
            ..Default::default()
        };
        h.db.save_automation_config("u1", &config).await.unwrap();

        let mut record =
            DeploymentRecord::new("u1", "wf-1", "Email Automation (u1)", config);
        record.transition_to(DeploymentStatus::Active).unwrap();
        h.db.upsert_deployment(&record).await.unwrap();

        h.engine.state().executions = vec![execution_at(3, "success")];
    }

    #[tokio::test]
    async fn all_checks_pass_and_side_effect_fires_once() {
        let h = harness();
        seed_ready_user(&h).await;

        let report = h.validator.validate("u1").await.unwrap();
        assert!(report.complete);
        assert_eq!(report.steps.len(), 7);
        assert!((report.completion_rate - 100.0).abs() < f32::EPSILON);
        assert_eq!(h.notifier.count(Template::AutomationLive), 1);

        let user = h.db.get_user("u1").await.unwrap().unwrap();
        assert!(user.onboarding_completed);

        // Re-entrant: second poll neither re-sets the flag nor re-notifies.
        let report = h.validator.validate("u1").await.unwrap();
        assert!(report.complete);
        assert_eq!(h.notifier.count(Template::AutomationLive), 1);
    }

    #[tokio::test]
    async fn any_missing_check_blocks_completion() {
        let h = harness();
        seed_ready_user(&h).await;

        let mut user = h.db.get_user("u1").await.unwrap().unwrap();
        user.email_verified = false;
        h.db.upsert_user(&user).await.unwrap();

        let report = h.validator.validate("u1").await.unwrap();
        assert!(!report.complete);
        assert!(!report.step(OnboardingStep::EmailVerified).unwrap().completed);
        // The remaining checks are still computed — no short-circuit.
        assert!(report.step(OnboardingStep::WorkflowVerified).unwrap().completed);
        assert_eq!(report.steps.len(), 7);
        assert!((report.completion_rate - (6.0 / 7.0 * 100.0)).abs() < 0.01);
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn unverified_deployment_blocks_two_checks() {
        let h = harness();
        seed_ready_user(&h).await;
        h.db.update_deployment_status("u1", DeploymentStatus::NeedsReauth, None)
            .await
            .unwrap();

        let report = h.validator.validate("u1").await.unwrap();
        assert!(!report.complete);
        assert!(report.step(OnboardingStep::WorkflowDeployed).unwrap().completed);
        assert!(!report.step(OnboardingStep::WorkflowVerified).unwrap().completed);
        assert!(
            !report
                .step(OnboardingStep::FirstExecutionObserved)
                .unwrap()
                .completed
        );
    }

    #[tokio::test]
    async fn engine_failure_degrades_first_execution_check() {
        let h = harness();
        seed_ready_user(&h).await;
        h.engine.state().auth_fail_list = true;

        let report = h.validator.validate("u1").await.unwrap();
        assert!(!report.complete);
        let step = report
            .step(OnboardingStep::FirstExecutionObserved)
            .unwrap();
        assert!(!step.completed);
        assert!(step.message.contains("Could not query"));
    }

    #[tokio::test]
    async fn unknown_user_gets_a_full_zero_report() {
        let h = harness();
        let report = h.validator.validate("ghost").await.unwrap();
        assert!(!report.complete);
        assert_eq!(report.steps.len(), 7);
        assert_eq!(report.completion_rate, 0.0);
        assert!(h.notifier.sent().is_empty());
    }
}
