//! Outbound notifications: verification codes by email and SMS.

#[cfg(feature = "email")]
pub mod email;
#[cfg(feature = "sms")]
pub mod sms;

use async_trait::async_trait;
use streamhub_core::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Email delivery failed: {0}")]
    Email(String),

    #[error("SMS delivery failed: {0}")]
    Sms(String),
}

pub type NotifyResult<T> = Result<T, NotifyError>;

impl From<NotifyError> for AppError {
    fn from(err: NotifyError) -> Self {
        match err {
            NotifyError::InvalidRecipient(msg) => AppError::InvalidInput(msg),
            other => AppError::Notification(other.to_string()),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> NotifyResult<()>;

    /// `to` is the full international number, e.g. `+15551234567`.
    async fn send_sms(&self, to: &str, body: &str) -> NotifyResult<()>;
}

/// Email and SMS channels behind one `Notifier`. A channel that is not
/// configured drops messages with a debug log.
#[derive(Clone, Default)]
pub struct NotificationService {
    #[cfg(feature = "email")]
    email: Option<email::EmailSender>,
    #[cfg(feature = "sms")]
    sms: Option<sms::SmsSender>,
}

impl NotificationService {
    pub fn from_config(config: &streamhub_core::config::NotificationConfig) -> Self {
        Self {
            #[cfg(feature = "email")]
            email: email::EmailSender::from_config(config),
            #[cfg(feature = "sms")]
            sms: sms::SmsSender::from_config(config),
        }
    }
}

#[async_trait]
impl Notifier for NotificationService {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> NotifyResult<()> {
        #[cfg(feature = "email")]
        if let Some(sender) = &self.email {
            return sender.send(to, subject, body).await;
        }
        let _ = (to, body);
        tracing::debug!(subject, "Email transport not configured, message dropped");
        Ok(())
    }

    async fn send_sms(&self, to: &str, body: &str) -> NotifyResult<()> {
        #[cfg(feature = "sms")]
        if let Some(sender) = &self.sms {
            return sender.send(to, body).await;
        }
        let _ = (to, body);
        tracing::debug!("SMS gateway not configured, message dropped");
        Ok(())
    }
}

/// One-time code message bodies shared by the email and SMS flows.
pub mod templates {
    pub fn email_verification(code: &str) -> (String, String) {
        (
            "Verify your StreamHub account".to_string(),
            format!(
                "Your verification code is {}.\n\nIt expires in 5 minutes. If you did not create an account, ignore this email.",
                code
            ),
        )
    }

    pub fn password_reset(code: &str) -> (String, String) {
        (
            "Reset your StreamHub password".to_string(),
            format!(
                "Your password reset code is {}.\n\nIt expires in 5 minutes. If you did not request a reset, ignore this email.",
                code
            ),
        )
    }

    pub fn phone_verification(code: &str) -> String {
        format!("Your StreamHub verification code is {}. It expires in 10 minutes.", code)
    }
}
