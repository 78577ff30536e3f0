//! Onboarding completion — the seven readiness checks and their AND-gate.

pub mod steps;
pub mod validator;

pub use steps::{CompletionReport, OnboardingStep, StepResult};
pub use validator::{CompletionValidator, ValidatorDeps};
