//! Deployment — lifecycle record, per-user locks, verification, and the
//! deploy orchestrator.

pub mod locks;
pub mod orchestrator;
pub mod record;
pub mod verifier;

pub use locks::UserLocks;
pub use orchestrator::{DeployOutcome, Orchestrator, OrchestratorDeps};
pub use record::{DeploymentRecord, DeploymentStatus};
pub use verifier::{Verifier, VerifyConfig, VerifyReport};
