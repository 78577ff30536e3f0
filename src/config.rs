//! Configuration types.

use std::time::Duration;

/// Read an env var and parse it, falling back to a default.
fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Deployment orchestrator configuration.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    /// Workflow name prefix; the user id is embedded at customization time.
    pub name_prefix: String,
    /// Total attempts per deployment (first try included).
    pub max_attempts: u32,
    /// Fixed backoff schedule. The delay before attempt N+1 is entry N-1,
    /// so with 3 attempts only the first two entries are ever slept.
    pub backoff_schedule: Vec<Duration>,
    /// Operator address paged when all attempts are exhausted.
    pub operator_email: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            name_prefix: "Email Automation".to_string(),
            max_attempts: 3,
            backoff_schedule: vec![
                Duration::from_secs(5),
                Duration::from_secs(15),
                Duration::from_secs(30),
            ],
            operator_email: "ops@mailflow.local".to_string(),
        }
    }
}

impl DeployConfig {
    /// Build config from environment variables, with defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            operator_email: std::env::var("MAILFLOW_OPERATOR_EMAIL")
                .unwrap_or(defaults.operator_email),
            ..defaults
        }
    }

    /// Backoff delay to sleep before the given attempt (2-based), if any.
    pub fn backoff_before_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt < 2 {
            return None;
        }
        self.backoff_schedule.get(attempt as usize - 2).copied()
    }
}

/// Recovery monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Interval between sweeps of a user's deployments.
    pub sweep_interval: Duration,
    /// Maximum concurrent per-user sweeps in a batch.
    pub sweep_concurrency: usize,
    /// Lookback window for general execution health.
    pub health_lookback: Duration,
    /// Window for the first-execution check during onboarding
    /// (2x the automation's 5-minute run interval, no alarm on miss).
    pub first_execution_window: Duration,
    /// How many recent executions to sample from the engine.
    pub execution_sample_limit: usize,
    /// Base URL for the re-authorization deep link.
    pub reauth_link_base: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(300),
            sweep_concurrency: 32,
            health_lookback: Duration::from_secs(24 * 3600),
            first_execution_window: Duration::from_secs(600),
            execution_sample_limit: 50,
            reauth_link_base: "https://app.mailflow.local".to_string(),
        }
    }
}

impl MonitorConfig {
    /// Build config from environment variables, with defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sweep_interval: Duration::from_secs(env_parse(
                "MAILFLOW_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval.as_secs(),
            )),
            sweep_concurrency: env_parse(
                "MAILFLOW_SWEEP_CONCURRENCY",
                defaults.sweep_concurrency,
            ),
            reauth_link_base: std::env::var("MAILFLOW_APP_BASE_URL")
                .unwrap_or(defaults.reauth_link_base),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backoff_schedule() {
        let config = DeployConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(
            config.backoff_schedule,
            vec![
                Duration::from_secs(5),
                Duration::from_secs(15),
                Duration::from_secs(30)
            ]
        );
    }

    #[test]
    fn no_backoff_before_first_attempt() {
        let config = DeployConfig::default();
        assert_eq!(config.backoff_before_attempt(1), None);
        assert_eq!(
            config.backoff_before_attempt(2),
            Some(Duration::from_secs(5))
        );
        assert_eq!(
            config.backoff_before_attempt(3),
            Some(Duration::from_secs(15))
        );
    }

    #[test]
    fn monitor_windows() {
        let config = MonitorConfig::default();
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
        assert_eq!(config.first_execution_window, Duration::from_secs(600));
        assert_eq!(config.health_lookback, Duration::from_secs(86400));
    }
}
