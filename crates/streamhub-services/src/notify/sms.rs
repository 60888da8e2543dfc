//! SMS delivery through a generic HTTP gateway.
//!
//! The gateway receives `POST {SMS_API_URL}` with a bearer key and a JSON body
//! `{ "to", "from", "message" }`.

use super::{NotifyError, NotifyResult};
use reqwest::Client;
use serde::Serialize;
use std::time::{Duration, Instant};
use streamhub_core::config::NotificationConfig;

#[derive(Serialize)]
struct SmsBody<'a> {
    to: &'a str,
    from: Option<&'a str>,
    message: &'a str,
}

#[derive(Clone)]
pub struct SmsSender {
    http: Client,
    api_url: String,
    api_key: Option<String>,
    sender: Option<String>,
}

impl SmsSender {
    pub fn from_config(config: &NotificationConfig) -> Option<Self> {
        let api_url = config.sms_api_url.clone()?;
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| tracing::warn!(error = %e, "Failed to build SMS HTTP client"))
            .ok()?;
        tracing::info!(api_url = %api_url, "SMS sender initialized");
        Some(Self {
            http,
            api_url,
            api_key: config.sms_api_key.clone(),
            sender: config.sms_sender.clone(),
        })
    }

    pub async fn send(&self, to: &str, message: &str) -> NotifyResult<()> {
        if !to.starts_with('+') || to.len() < 8 {
            return Err(NotifyError::InvalidRecipient(format!(
                "invalid phone number: {}",
                to
            )));
        }

        let mut request = self.http.post(&self.api_url).json(&SmsBody {
            to,
            from: self.sender.as_deref(),
            message,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let start = Instant::now();
        let response = request.send().await.map_err(|e| {
            tracing::error!(
                error = %e,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "SMS gateway request failed"
            );
            NotifyError::Sms(e.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::warn!(
                status = status.as_u16(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "SMS gateway rejected message"
            );
            return Err(NotifyError::Sms(format!("gateway returned {}", status)));
        }

        tracing::info!(
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "SMS sent"
        );
        Ok(())
    }
}
