//! Notification dispatch — templated messages to users and operators.
//!
//! The core treats dispatch as fire-and-forget: a failure is logged but
//! never rolls back a state transition already committed.

pub mod smtp;

use async_trait::async_trait;

use crate::error::NotifyError;

pub use smtp::{SmtpConfig, SmtpNotifier};

/// Known notification templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    /// Mailbox credentials expired; ask the user to re-authorize.
    ReauthRequired,
    /// Deployment exhausted retries; page an operator.
    ManualIntervention,
    /// Onboarding finished; tell the user their automation is live.
    AutomationLive,
}

impl Template {
    pub fn key(&self) -> &'static str {
        match self {
            Self::ReauthRequired => "reauth_required",
            Self::ManualIntervention => "manual_intervention",
            Self::AutomationLive => "automation_live",
        }
    }
}

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// A templated message handed to the dispatcher.
#[derive(Debug, Clone)]
pub struct Notification {
    pub to: String,
    pub template: Template,
    pub data: serde_json::Value,
}

impl Notification {
    pub fn new(to: impl Into<String>, template: Template, data: serde_json::Value) -> Self {
        Self {
            to: to.into(),
            template,
            data,
        }
    }
}

/// Dispatch seam for templated notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Send a notification, logging failure instead of propagating it.
pub async fn dispatch_best_effort(notifier: &dyn Notifier, notification: Notification) {
    let to = notification.to.clone();
    let template = notification.template;
    if let Err(e) = notifier.dispatch(notification).await {
        tracing::warn!(to = %to, template = %template, error = %e, "Notification dispatch failed");
    }
}

/// Notifier that only logs. Used when no SMTP transport is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn dispatch(&self, notification: Notification) -> Result<(), NotifyError> {
        tracing::info!(
            to = %notification.to,
            template = %notification.template,
            data = %notification.data,
            "Notification (log only)"
        );
        Ok(())
    }
}
