//! Outbound notification abstraction.
//!
//! The auth flows hand a fully rendered [`Notification`] to a
//! [`Notifier`] and treat the result as the commit signal for any secret
//! they just persisted. A failed send rolls the secret back, so senders
//! must return `Err` on anything short of an accepted delivery.
//!
//! The default sender for local dev is [`LogNotifier`], which logs the
//! notification and returns `Ok(())`.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

/// What the message asks the recipient to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotificationBody {
    /// Click-through verification link carrying the raw token.
    VerificationLink { url: String },
    /// Six digit recovery code, leading zeros included.
    RecoveryCode { code: String },
}

#[derive(Clone, Debug)]
pub struct Notification {
    pub recipient_name: String,
    pub recipient_email: String,
    pub subject: String,
    pub body: NotificationBody,
}

impl Notification {
    #[must_use]
    pub fn verification(name: &str, email: &str, url: String) -> Self {
        Self {
            recipient_name: name.to_string(),
            recipient_email: email.to_string(),
            subject: "Verify your email address".to_string(),
            body: NotificationBody::VerificationLink { url },
        }
    }

    #[must_use]
    pub fn recovery(name: &str, email: &str, code: String) -> Self {
        Self {
            recipient_name: name.to_string(),
            recipient_email: email.to_string(),
            subject: "Your password reset code (valid for 15 minutes)".to_string(),
            body: NotificationBody::RecoveryCode { code },
        }
    }
}

/// Delivery abstraction used by the auth flows.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification or return an error so the caller can roll
    /// back the secret it refers to.
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Local dev sender that logs the notification instead of sending email.
#[derive(Clone, Debug)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let kind = match &notification.body {
            NotificationBody::VerificationLink { .. } => "verification_link",
            NotificationBody::RecoveryCode { .. } => "recovery_code",
        };
        info!(
            to_email = %notification.recipient_email,
            subject = %notification.subject,
            kind,
            "notification send stub"
        );
        Ok(())
    }
}
