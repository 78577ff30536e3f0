//! SMTP notifier — renders templates and sends via lettre.

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::error::NotifyError;

use super::{Notification, Notifier, Template};

/// SMTP transport configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

impl SmtpConfig {
    /// Build config from environment variables.
    /// Returns `None` if `SMTP_HOST` is not set (notifier disabled).
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("SMTP_HOST").ok()?;

        let port: u16 = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("SMTP_USERNAME").unwrap_or_default();
        let password = std::env::var("SMTP_PASSWORD").unwrap_or_default();
        let from_address =
            std::env::var("SMTP_FROM_ADDRESS").unwrap_or_else(|_| username.clone());

        Some(Self {
            host,
            port,
            username,
            password,
            from_address,
        })
    }
}

/// Render a template into a subject and plain-text body.
fn render(template: Template, data: &serde_json::Value) -> (String, String) {
    let field = |key: &str| data.get(key).and_then(|v| v.as_str()).unwrap_or("").to_string();

    match template {
        Template::ReauthRequired => (
            "Action needed: re-connect your mailbox".into(),
            format!(
                "Your email automation is paused because mailbox access expired.\n\n\
                 Re-authorize here: {}\n\n\
                 The automation resumes on its own once access is restored.",
                field("reauth_url")
            ),
        ),
        Template::ManualIntervention => (
            "Deployment needs attention".into(),
            format!(
                "Automation deployment for user {} failed after all retries.\n\n\
                 Last error: {}\n\n\
                 Manual intervention required.",
                field("user_id"),
                field("error")
            ),
        ),
        Template::AutomationLive => (
            "Your email automation is live".into(),
            "Setup is complete — your inbox is now being categorized and your team \
             notified automatically."
                .into(),
        ),
    }
}

/// lettre-backed [`Notifier`].
pub struct SmtpNotifier {
    config: SmtpConfig,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.clone(),
        );

        let transport = SmtpTransport::relay(&self.config.host)
            .map_err(|e| NotifyError::Send {
                to: to.into(),
                reason: format!("SMTP relay error: {e}"),
            })?
            .port(self.config.port)
            .credentials(creds)
            .build();

        let email = Message::builder()
            .from(self.config.from_address.parse().map_err(|e| {
                NotifyError::InvalidRecipient(format!("from address: {e}"))
            })?)
            .to(to
                .parse()
                .map_err(|e| NotifyError::InvalidRecipient(format!("{to}: {e}")))?)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| NotifyError::Send {
                to: to.into(),
                reason: format!("Failed to build email: {e}"),
            })?;

        transport.send(&email).map_err(|e| NotifyError::Send {
            to: to.into(),
            reason: format!("SMTP send failed: {e}"),
        })?;

        tracing::info!(to = %to, "Notification email sent");
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn dispatch(&self, notification: Notification) -> Result<(), NotifyError> {
        let (subject, body) = render(notification.template, &notification.data);
        self.send_email(&notification.to, &subject, &body)
    }
}
