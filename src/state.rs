use std::sync::Arc;

use crate::config::AppConfig;
use crate::email::{self, Email, Mailer};
use crate::monitoring::Monitor;
use crate::payments::Payments;
use crate::security::RateLimiter;

/// Process-wide services shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
    pub rate_limiter: RateLimiter,
    pub mailer: Arc<dyn Mailer>,
    pub payments: Arc<Payments>,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            monitor: Arc::new(Monitor::new(config.monitoring.clone())),
            rate_limiter: RateLimiter::default(),
            mailer: email::mailer_from_config(&config.email),
            payments: Arc::new(Payments::from_config(&config.payments)),
        }
    }

    pub fn send_email(&self, email: Email) {
        email::send_in_background(Arc::clone(&self.mailer), Arc::clone(&self.monitor), email);
    }
}
