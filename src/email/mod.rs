pub mod templates;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use crate::config::EmailConfig;
use crate::monitoring::{Monitor, Severity};

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email provider returned {0}")]
    Provider(u16),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), EmailError>;
}

/// Posts JSON to a transactional email API with a bearer key
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, api_url, api_key, from }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<(), EmailError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": [email.to],
                "subject": email.subject,
                "html": email.html,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EmailError::Provider(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Development mailer: logs instead of sending
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), EmailError> {
        info!(to = %email.to, subject = %email.subject, "Email (not sent, no provider configured)");
        Ok(())
    }
}

/// HTTP mailer when an API key is configured, otherwise the log mailer
pub fn mailer_from_config(config: &EmailConfig) -> Arc<dyn Mailer> {
    match &config.api_key {
        Some(key) if !config.api_url.is_empty() => Arc::new(HttpMailer::new(
            config.api_url.clone(),
            key.clone(),
            config.from_address.clone(),
        )),
        _ => Arc::new(LogMailer),
    }
}

/// Fire-and-forget send. Failures are logged and tracked, never surfaced to the caller.
pub fn send_in_background(mailer: Arc<dyn Mailer>, monitor: Arc<Monitor>, email: Email) {
    tokio::spawn(async move {
        if let Err(e) = mailer.send(&email).await {
            error!("Failed to send '{}' to {}: {}", email.subject, email.to, e);
            monitor.track_error(&e.to_string(), "EMAIL_SEND_FAILED", None, None, Severity::Warning);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct FailingMailer {
        attempts: Mutex<usize>,
    }

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _email: &Email) -> Result<(), EmailError> {
            *self.attempts.lock() += 1;
            Err(EmailError::Provider(503))
        }
    }

    #[tokio::test]
    async fn background_failures_are_tracked() {
        let mailer = Arc::new(FailingMailer::default());
        let monitor = Arc::new(Monitor::new(crate::config::config().monitoring.clone()));
        let email = Email {
            to: "reader@acme.test".to_string(),
            subject: "Welcome".to_string(),
            html: "<p>hi</p>".to_string(),
        };

        send_in_background(mailer.clone(), monitor.clone(), email);
        for _ in 0..50 {
            if !monitor.recent_errors(1).is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(*mailer.attempts.lock(), 1);
        let errors = monitor.recent_errors(1);
        assert_eq!(errors[0].code, "EMAIL_SEND_FAILED");
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let email = Email { to: "a@b.test".to_string(), subject: "s".to_string(), html: String::new() };
        assert!(LogMailer.send(&email).await.is_ok());
    }

}
