//! Onboarding steps — the fixed, ordered set of readiness checks.

use serde::{Deserialize, Serialize};

/// The seven readiness checks, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    EmailVerified,
    BusinessTypeSelected,
    MailboxConnected,
    BusinessInfoProvided,
    WorkflowDeployed,
    WorkflowVerified,
    FirstExecutionObserved,
}

impl OnboardingStep {
    /// All steps in their fixed order.
    pub const ALL: [OnboardingStep; 7] = [
        Self::EmailVerified,
        Self::BusinessTypeSelected,
        Self::MailboxConnected,
        Self::BusinessInfoProvided,
        Self::WorkflowDeployed,
        Self::WorkflowVerified,
        Self::FirstExecutionObserved,
    ];
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::EmailVerified => "email_verified",
            Self::BusinessTypeSelected => "business_type_selected",
            Self::MailboxConnected => "mailbox_connected",
            Self::BusinessInfoProvided => "business_info_provided",
            Self::WorkflowDeployed => "workflow_deployed",
            Self::WorkflowVerified => "workflow_verified",
            Self::FirstExecutionObserved => "first_execution_observed",
        };
        write!(f, "{s}")
    }
}

/// Outcome of one readiness check. Recomputed on every validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: OnboardingStep,
    pub completed: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl StepResult {
    pub fn complete(step: OnboardingStep, message: impl Into<String>) -> Self {
        Self {
            step,
            completed: true,
            message: message.into(),
            detail: None,
        }
    }

    pub fn incomplete(step: OnboardingStep, message: impl Into<String>) -> Self {
        Self {
            step,
            completed: false,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Aggregated validation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionReport {
    pub steps: Vec<StepResult>,
    /// Completed steps as a percentage of all steps.
    pub completion_rate: f32,
    pub complete: bool,
}

impl CompletionReport {
    pub fn step(&self, step: OnboardingStep) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step == step)
    }
}
