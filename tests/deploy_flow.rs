//! End-to-end scenarios: deploy with a scripted engine, supervise, and
//! gate onboarding completion.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use tokio::time::Instant;

use mailflow::automation::{AutomationConfig, BusinessCategory, TeamMember};
use mailflow::config::{DeployConfig, MonitorConfig};
use mailflow::deploy::{
    DeploymentStatus, Orchestrator, OrchestratorDeps, UserLocks, VerifyConfig,
};
use mailflow::engine::{
    CreatedWorkflow, EngineClient, ExecutionSample, ExecutionStarted, WorkflowInfo,
};
use mailflow::error::{DeployError, EngineError, NotifyError};
use mailflow::monitor::{MonitorDeps, RecoveryMonitor, SweepAction};
use mailflow::notify::{Notification, Notifier, Template};
use mailflow::onboarding::{CompletionValidator, ValidatorDeps};
use mailflow::store::{Database, MemoryBackend, OauthStatus, UserRecord};
use mailflow::template::WorkflowDefinition;

// ── Scripted collaborators ──────────────────────────────────────────

#[derive(Default)]
struct EngineState {
    fail_creates: u32,
    fail_activates: u32,
    execution_status: Option<String>,
    executions: Vec<ExecutionSample>,
    workflow_active: bool,
    calls: Vec<String>,
    next_workflow: u32,
}

struct MockEngine {
    state: Mutex<EngineState>,
}

impl MockEngine {
    fn new() -> Self {
        Self {
            state: Mutex::new(EngineState {
                workflow_active: true,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().unwrap()
    }

    fn count(&self, call: &str) -> usize {
        self.state().calls.iter().filter(|c| *c == call).count()
    }
}

#[async_trait]
impl EngineClient for MockEngine {
    async fn ping(&self) -> Result<(), EngineError> {
        self.state().calls.push("ping".into());
        Ok(())
    }

    async fn create_workflow(
        &self,
        _definition: &WorkflowDefinition,
    ) -> Result<CreatedWorkflow, EngineError> {
        let mut state = self.state();
        state.calls.push("create".into());
        if state.fail_creates > 0 {
            state.fail_creates -= 1;
            return Err(EngineError::Api {
                status: 503,
                message: "engine unavailable".into(),
            });
        }
        state.next_workflow += 1;
        Ok(CreatedWorkflow {
            id: format!("wf-{}", state.next_workflow),
            name: "Email Automation".into(),
        })
    }

    async fn activate_workflow(&self, _id: &str) -> Result<(), EngineError> {
        let mut state = self.state();
        state.calls.push("activate".into());
        if state.fail_activates > 0 {
            state.fail_activates -= 1;
            return Err(EngineError::Api {
                status: 400,
                message: "could not activate".into(),
            });
        }
        Ok(())
    }

    async fn deactivate_workflow(&self, _id: &str) -> Result<(), EngineError> {
        self.state().calls.push("deactivate".into());
        Ok(())
    }

    async fn delete_workflow(&self, _id: &str) -> Result<(), EngineError> {
        self.state().calls.push("delete".into());
        Ok(())
    }

    async fn get_workflow(&self, id: &str) -> Result<WorkflowInfo, EngineError> {
        let mut state = self.state();
        state.calls.push("get_workflow".into());
        Ok(WorkflowInfo {
            id: id.into(),
            name: "Email Automation".into(),
            active: state.workflow_active,
        })
    }

    async fn execute_workflow(
        &self,
        _id: &str,
        _payload: &serde_json::Value,
    ) -> Result<ExecutionStarted, EngineError> {
        self.state().calls.push("execute".into());
        Ok(ExecutionStarted {
            execution_id: "ex-1".into(),
            status: "running".into(),
        })
    }

    async fn get_execution(&self, id: &str) -> Result<ExecutionSample, EngineError> {
        let mut state = self.state();
        state.calls.push("get_execution".into());
        let status = state
            .execution_status
            .clone()
            .unwrap_or_else(|| "success".into());
        Ok(ExecutionSample {
            id: id.into(),
            status,
            started_at: Utc::now(),
            finished_at: Some(Utc::now()),
        })
    }

    async fn list_executions(
        &self,
        _workflow_id: &str,
        _limit: usize,
    ) -> Result<Vec<ExecutionSample>, EngineError> {
        let mut state = self.state();
        state.calls.push("list_executions".into());
        Ok(state.executions.clone())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    fn count(&self, template: Template) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.template == template)
            .count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn dispatch(&self, notification: Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

// ── Harness ─────────────────────────────────────────────────────────

struct Harness {
    engine: Arc<MockEngine>,
    db: Arc<MemoryBackend>,
    notifier: Arc<RecordingNotifier>,
    orchestrator: Orchestrator,
    monitor: RecoveryMonitor,
    validator: CompletionValidator,
}

fn harness() -> Harness {
    let engine = Arc::new(MockEngine::new());
    let db = Arc::new(MemoryBackend::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let locks = Arc::new(UserLocks::new());

    let orchestrator = Orchestrator::new(
        DeployConfig::default(),
        VerifyConfig::default(),
        OrchestratorDeps {
            engine: Arc::clone(&engine) as Arc<dyn EngineClient>,
            db: Arc::clone(&db) as Arc<dyn Database>,
            notifier: Arc::clone(&notifier) as Arc<dyn Notifier>,
            locks: Arc::clone(&locks),
        },
    );
    let monitor = RecoveryMonitor::new(
        MonitorConfig::default(),
        MonitorDeps {
            engine: Arc::clone(&engine) as Arc<dyn EngineClient>,
            db: Arc::clone(&db) as Arc<dyn Database>,
            notifier: Arc::clone(&notifier) as Arc<dyn Notifier>,
            locks: Arc::clone(&locks),
        },
    );
    let validator = CompletionValidator::new(ValidatorDeps {
        engine: Arc::clone(&engine) as Arc<dyn EngineClient>,
        db: Arc::clone(&db) as Arc<dyn Database>,
        notifier: Arc::clone(&notifier) as Arc<dyn Notifier>,
    });

    Harness {
        engine,
        db,
        notifier,
        orchestrator,
        monitor,
        validator,
    }
}

fn lead_config() -> AutomationConfig {
    AutomationConfig {
        business_categories: vec![BusinessCategory {
            name: "New Leads".into(),
            description: String::new(),
        }],
        team_members: vec![TeamMember {
            name: "A".into(),
            email: "a@x.com".into(),
            category_name: None,
            notify: true,
        }],
        ..Default::default()
    }
}

async fn seed_onboarded_user(h: &Harness, user_id: &str) {
    let mut user = UserRecord::new(user_id, format!("{user_id}@example.com"));
    user.email_verified = true;
    user.business_type = Some("contractor".into());
    user.oauth_status = OauthStatus::Valid;
    h.db.upsert_user(&user).await.unwrap();
    h.db.save_automation_config(user_id, &lead_config())
        .await
        .unwrap();
}

fn recent_execution() -> ExecutionSample {
    let started = Utc::now() - ChronoDuration::minutes(2);
    ExecutionSample {
        id: "ex-observed".into(),
        status: "success".into(),
        started_at: started,
        finished_at: Some(started + ChronoDuration::seconds(4)),
    }
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn end_to_end_deploy_then_complete() {
    let h = harness();
    seed_onboarded_user(&h, "u1").await;

    let config = lead_config();
    let outcome = h.orchestrator.deploy("u1", &config).await.unwrap();
    assert_eq!(outcome.status, DeploymentStatus::Active);

    let record = h.db.get_deployment("u1").await.unwrap().unwrap();
    assert_eq!(record.status, DeploymentStatus::Active);
    assert_eq!(record.config_snapshot, config);

    // The engine has since run the workflow once.
    h.engine.state().executions = vec![recent_execution()];

    let report = h.validator.validate("u1").await.unwrap();
    assert!(report.complete, "all seven checks should pass: {report:#?}");
    assert_eq!(h.notifier.count(Template::AutomationLive), 1);

    // A second dashboard poll must not re-announce.
    let report = h.validator.validate("u1").await.unwrap();
    assert!(report.complete);
    assert_eq!(h.notifier.count(Template::AutomationLive), 1);
}

#[tokio::test(start_paused = true)]
async fn failing_engine_exhausts_three_attempts_and_pages_operator() {
    let h = harness();
    h.engine.state().fail_creates = 10;

    let started = Instant::now();
    let err = h.orchestrator.deploy("u1", &lead_config()).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, DeployError::Exhausted { attempts: 3, .. }));
    assert_eq!(h.engine.count("create"), 3);
    // Two backoff delays actually taken: 5s + 15s.
    assert!(elapsed >= std::time::Duration::from_secs(20));
    assert_eq!(h.notifier.count(Template::ManualIntervention), 1);
}

#[tokio::test(start_paused = true)]
async fn recovery_on_second_attempt_uses_one_delay() {
    let h = harness();
    h.engine.state().fail_creates = 1;

    let started = Instant::now();
    let outcome = h.orchestrator.deploy("u1", &lead_config()).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(outcome.workflow_id, "wf-1");
    assert!(elapsed >= std::time::Duration::from_secs(5));
    assert!(elapsed < std::time::Duration::from_secs(15));
    assert!(h.notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unexecutable_workflow_never_goes_active() {
    let h = harness();
    h.engine.state().execution_status = Some("error".into());

    let err = h.orchestrator.deploy("u1", &lead_config()).await.unwrap_err();
    assert!(matches!(err, DeployError::Exhausted { .. }));

    let record = h.db.get_deployment("u1").await.unwrap().unwrap();
    assert_ne!(record.status, DeploymentStatus::Active);
    assert_eq!(record.status, DeploymentStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn sweep_reactivates_then_escalates_to_reauth() {
    let h = harness();
    seed_onboarded_user(&h, "u1").await;
    h.orchestrator.deploy("u1", &lead_config()).await.unwrap();
    h.engine.state().executions = vec![recent_execution()];

    // Engine deactivated the workflow; reactivation succeeds.
    h.engine.state().workflow_active = false;
    let report = h.monitor.sweep("u1").await.unwrap();
    assert!(report
        .actions
        .iter()
        .any(|a| matches!(a, SweepAction::Reactivated { .. })));
    assert_eq!(h.notifier.count(Template::ReauthRequired), 0);

    // Deactivated again, and this time reactivation fails: credentials.
    h.engine.state().workflow_active = false;
    h.engine.state().fail_activates = 1;
    let report = h.monitor.sweep("u1").await.unwrap();
    assert!(report
        .actions
        .iter()
        .any(|a| matches!(a, SweepAction::ReauthTriggered { .. })));
    assert_eq!(h.notifier.count(Template::ReauthRequired), 1);

    let user = h.db.get_user("u1").await.unwrap().unwrap();
    assert_eq!(user.oauth_status, OauthStatus::Expired);
    let record = h.db.get_deployment("u1").await.unwrap().unwrap();
    assert_eq!(record.status, DeploymentStatus::NeedsReauth);

    // Still unresolved on the next sweep: no duplicate prompt.
    h.engine.state().fail_activates = 1;
    h.monitor.sweep("u1").await.unwrap();
    assert_eq!(h.notifier.count(Template::ReauthRequired), 1);

    // A paused deployment also blocks onboarding completion.
    let completion = h.validator.validate("u1").await.unwrap();
    assert!(!completion.complete);
}

#[tokio::test(start_paused = true)]
async fn quiet_mailbox_is_waiting_not_alarmed() {
    let h = harness();
    seed_onboarded_user(&h, "u1").await;
    h.orchestrator.deploy("u1", &lead_config()).await.unwrap();
    // No executions at all yet.

    let report = h.monitor.sweep("u1").await.unwrap();
    assert!(report
        .actions
        .iter()
        .any(|a| matches!(a, SweepAction::AwaitingFirstExecution { .. })));
    assert_eq!(h.notifier.count(Template::ReauthRequired), 0);

    let user = h.db.get_user("u1").await.unwrap().unwrap();
    assert_eq!(user.oauth_status, OauthStatus::Valid);

    // Completion blocked only on the first-execution check.
    let completion = h.validator.validate("u1").await.unwrap();
    assert!(!completion.complete);
    let incomplete: Vec<_> = completion
        .steps
        .iter()
        .filter(|s| !s.completed)
        .map(|s| s.step)
        .collect();
    assert_eq!(
        incomplete,
        vec![mailflow::onboarding::OnboardingStep::FirstExecutionObserved]
    );
}

#[tokio::test(start_paused = true)]
async fn redeploy_replaces_previous_record() {
    let h = harness();
    seed_onboarded_user(&h, "u1").await;

    h.orchestrator.deploy("u1", &lead_config()).await.unwrap();
    let first = h.db.get_deployment("u1").await.unwrap().unwrap();

    let mut updated = lead_config();
    updated.business_categories.push(BusinessCategory {
        name: "Billing".into(),
        description: String::new(),
    });
    h.orchestrator.deploy("u1", &updated).await.unwrap();

    let second = h.db.get_deployment("u1").await.unwrap().unwrap();
    assert_ne!(first.workflow_id, second.workflow_id);
    assert_eq!(second.config_snapshot, updated);
    assert_eq!(h.db.list_deployment_user_ids().await.unwrap(), vec!["u1"]);
}
