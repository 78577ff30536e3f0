//! Error types for mailflow.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Deployment error: {0}")]
    Deploy(#[from] DeployError),

    #[error("Recovery error: {0}")]
    Recovery(#[from] RecoveryError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Automation config has no business categories")]
    EmptyCategories,

    #[error("Business category at position {index} has an empty name")]
    BlankCategoryName { index: usize },
}

/// Errors from the external workflow engine API.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine request failed: {0}")]
    Transport(String),

    #[error("Engine request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Engine returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Engine rejected credentials: {message}")]
    Auth { message: String },

    #[error("Failed to decode engine response: {0}")]
    Decode(String),
}

impl EngineError {
    /// Whether retrying the same call later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Auth { .. } | Self::Decode(_) => false,
        }
    }

    /// Whether this looks like a credential/authorization problem.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

/// Deployment lifecycle errors, classified at the orchestrator boundary.
///
/// Raw engine error strings never cross this boundary upward — callers see
/// a stable kind plus a human-readable summary.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("Transient deployment failure: {reason}")]
    Transient { reason: String },

    #[error("Verification failed: {outcome}")]
    Verification { outcome: String },

    #[error("Deployment failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    #[error("Invalid automation config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl From<EngineError> for DeployError {
    fn from(e: EngineError) -> Self {
        Self::Transient {
            reason: e.to_string(),
        }
    }
}

/// Recovery-sweep errors.
#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    #[error("Credentials appear expired for user {user_id}: {reason}")]
    AuthExpired { user_id: String, reason: String },

    #[error("Sweep failed for user {user_id}: {reason}")]
    SweepFailed { user_id: String, reason: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Notification dispatch errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to send notification to {to}: {reason}")]
    Send { to: String, reason: String },

    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),

    #[error("Notification transport not configured: {0}")]
    NotConfigured(String),
}

/// Result type alias for mailflow.
pub type Result<T> = std::result::Result<T, Error>;
