//! Scripted engine double shared by unit tests.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};

use crate::error::EngineError;
use crate::template::WorkflowDefinition;

use super::client::EngineClient;
use super::types::{CreatedWorkflow, ExecutionSample, ExecutionStarted, WorkflowInfo};

/// Programmable behavior for [`ScriptedEngine`].
pub(crate) struct ScriptState {
    /// Remaining ping calls to fail.
    pub fail_pings: u32,
    /// Remaining create calls to fail.
    pub fail_creates: u32,
    /// Remaining activate calls to fail.
    pub fail_activates: u32,
    /// Remaining execute calls to fail.
    pub fail_executes: u32,
    /// Status reported for any polled execution.
    pub execution_status: String,
    /// Samples returned by `list_executions`.
    pub executions: Vec<ExecutionSample>,
    /// Whether `get_workflow` reports the workflow active.
    pub workflow_active: bool,
    /// Fail `get_workflow` with an auth error.
    pub auth_fail_get_workflow: bool,
    /// Fail `list_executions` with an auth error.
    pub auth_fail_list: bool,
    /// Recorded call names, in order.
    pub calls: Vec<String>,
    next_workflow: u32,
}

impl Default for ScriptState {
    fn default() -> Self {
        Self {
            fail_pings: 0,
            fail_creates: 0,
            fail_activates: 0,
            fail_executes: 0,
            execution_status: "success".into(),
            executions: Vec::new(),
            workflow_active: true,
            auth_fail_get_workflow: false,
            auth_fail_list: false,
            calls: Vec::new(),
            next_workflow: 0,
        }
    }
}

/// An [`EngineClient`] whose behavior is scripted per test.
#[derive(Default)]
pub(crate) struct ScriptedEngine {
    state: Mutex<ScriptState>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.state().calls.iter().filter(|c| *c == call).count()
    }
}

/// An execution sample that started `minutes_ago` minutes in the past.
pub(crate) fn execution_at(minutes_ago: i64, status: &str) -> ExecutionSample {
    let started = Utc::now() - ChronoDuration::minutes(minutes_ago);
    ExecutionSample {
        id: format!("ex-{minutes_ago}"),
        status: status.into(),
        started_at: started,
        finished_at: Some(started + ChronoDuration::seconds(3)),
    }
}

#[async_trait]
impl EngineClient for ScriptedEngine {
    async fn ping(&self) -> Result<(), EngineError> {
        let mut state = self.state();
        state.calls.push("ping".into());
        if state.fail_pings > 0 {
            state.fail_pings -= 1;
            return Err(EngineError::Transport("connection refused".into()));
        }
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
                status: 502,
                message: "bad gateway".into(),
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
        if state.auth_fail_get_workflow {
            return Err(EngineError::Auth {
                message: "token revoked".into(),
            });
        }
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
        let mut state = self.state();
        state.calls.push("execute".into());
        if state.fail_executes > 0 {
            state.fail_executes -= 1;
            return Err(EngineError::Transport("connection reset".into()));
        }
        Ok(ExecutionStarted {
            execution_id: "ex-1".into(),
            status: "running".into(),
        })
    }

    async fn get_execution(&self, id: &str) -> Result<ExecutionSample, EngineError> {
        let mut state = self.state();
        state.calls.push("get_execution".into());
        let status = state.execution_status.clone();
        let finished = status != "running";
        Ok(ExecutionSample {
            id: id.into(),
            status,
            started_at: Utc::now(),
            finished_at: finished.then(Utc::now),
        })
    }

    async fn list_executions(
        &self,
        _workflow_id: &str,
        _limit: usize,
    ) -> Result<Vec<ExecutionSample>, EngineError> {
        let mut state = self.state();
        state.calls.push("list_executions".into());
        if state.auth_fail_list {
            return Err(EngineError::Auth {
                message: "token revoked".into(),
            });
        }
        Ok(state.executions.clone())
    }
}
