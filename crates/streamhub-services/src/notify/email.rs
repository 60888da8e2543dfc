//! SMTP delivery via lettre.

use super::{NotifyError, NotifyResult};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use std::time::Instant;
use streamhub_core::config::NotificationConfig;

#[derive(Clone)]
pub struct EmailSender {
    mailer: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

impl EmailSender {
    /// Returns `None` if SMTP is not configured or the sender address is invalid.
    pub fn from_config(config: &NotificationConfig) -> Option<Self> {
        let host = config.smtp_host.as_deref()?;
        let from: Mailbox = match config.smtp_from.as_deref()?.parse() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                tracing::warn!(error = %e, "SMTP_FROM is not a valid address, email disabled");
                return None;
            }
        };
        let port = config.smtp_port.unwrap_or(587);
        let credentials = match (&config.smtp_user, &config.smtp_password) {
            (Some(u), Some(p)) => Some(Credentials::new(u.clone(), p.clone())),
            _ => None,
        };

        let mailer = if config.smtp_tls {
            let b = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| tracing::warn!(error = %e, host = %host, "Invalid SMTP relay"))
                .ok()?
                .port(port);
            let b = match credentials {
                Some(c) => b.credentials(c),
                None => b,
            };
            tracing::info!(host = %host, port = port, "Email sender initialized (SMTP with STARTTLS)");
            b.build()
        } else {
            let b = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(port);
            let b = match credentials {
                Some(c) => b.credentials(c),
                None => b,
            };
            tracing::info!(host = %host, port = port, "Email sender initialized (SMTP)");
            b.build()
        };

        Some(Self {
            mailer: Arc::new(mailer),
            from,
        })
    }

    pub async fn send(&self, to: &str, subject: &str, body_plain: &str) -> NotifyResult<()> {
        let to_addr: Mailbox = to
            .parse()
            .map_err(|_| NotifyError::InvalidRecipient(format!("invalid email address: {}", to)))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to_addr)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body_plain.to_string())
            .map_err(|e| NotifyError::Email(e.to_string()))?;

        let start = Instant::now();
        self.mailer.send(email).await.map_err(|e| {
            tracing::error!(
                error = %e,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "SMTP send failed"
            );
            NotifyError::Email(e.to_string())
        })?;

        tracing::info!(
            subject,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Email sent"
        );
        Ok(())
    }
}
