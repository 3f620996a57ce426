//! Payment provider integrations.
//!
//! Each provider turns an order into a hosted checkout page and turns signed
//! webhook deliveries back into [`WebhookEvent`]s. Providers only register
//! when their secret key is configured.

pub mod paystack;
pub mod stripe;

use async_trait::async_trait;
use axum::http::HeaderMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::config::PaymentConfig;

pub use paystack::PaystackProvider;
pub use stripe::StripeProvider;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Unknown payment provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        PaymentError::Http(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutLine {
    pub title: String,
    pub unit_amount: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub order_id: Uuid,
    pub order_number: String,
    pub tenant: String,
    pub customer_email: String,
    pub currency: String,
    pub lines: Vec<CheckoutLine>,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutRequest {
    pub fn total_minor(&self) -> i64 {
        self.lines.iter().map(|l| l.unit_amount * l.quantity).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub provider: String,
    pub reference: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookEventKind {
    Succeeded,
    Failed,
    Ignored,
}

#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub id: String,
    pub kind: WebhookEventKind,
    pub event_type: String,
    pub order_id: Option<Uuid>,
    pub tenant: Option<String>,
    pub reference: Option<String>,
    /// What the provider reports as collected, when the payload carries it
    pub amount: Option<PaidAmount>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaidAmount {
    pub minor: i64,
    pub currency: String,
}

impl PaidAmount {
    pub(crate) fn from_json(amount: &serde_json::Value, currency: &serde_json::Value) -> Option<Self> {
        Some(Self {
            minor: amount.as_i64()?,
            currency: currency.as_str()?.to_ascii_uppercase(),
        })
    }

    /// True when this covers exactly `total` in `currency`
    pub fn settles(&self, total: Decimal, currency: &str) -> bool {
        self.currency.eq_ignore_ascii_case(currency) && to_minor_units(total, currency).is_ok_and(|m| m == self.minor)
    }
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError>;

    /// Verify the delivery signature and decode the event
    fn parse_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<WebhookEvent, PaymentError>;
}

/// Configured providers keyed by name
#[derive(Clone, Default)]
pub struct Payments {
    providers: BTreeMap<&'static str, Arc<dyn PaymentProvider>>,
    default_provider: String,
}

impl Payments {
    pub fn from_config(config: &PaymentConfig) -> Self {
        let client = http_client();
        let mut payments = Payments {
            providers: BTreeMap::new(),
            default_provider: config.default_provider.clone(),
        };

        if let Some(secret) = &config.stripe_secret_key {
            payments.register(Arc::new(StripeProvider::new(
                client.clone(),
                config.stripe_api_base.clone(),
                secret.clone(),
                config.stripe_webhook_secret.clone(),
            )));
        }
        if let Some(secret) = &config.paystack_secret_key {
            payments.register(Arc::new(PaystackProvider::new(
                client,
                config.paystack_api_base.clone(),
                secret.clone(),
            )));
        }

        info!("Payment providers enabled: {:?}", payments.names());
        payments
    }

    pub fn register(&mut self, provider: Arc<dyn PaymentProvider>) {
        self.providers.insert(provider.name(), provider);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn PaymentProvider>, PaymentError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| PaymentError::UnknownProvider(name.to_string()))
    }

    /// Requested provider, or the configured default
    pub fn resolve(&self, requested: Option<&str>) -> Result<Arc<dyn PaymentProvider>, PaymentError> {
        self.get(requested.unwrap_or(&self.default_provider))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.providers.keys().copied().collect()
    }
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .unwrap_or_default()
}

/// Currencies whose smallest unit is the whole unit
const ZERO_DECIMAL_CURRENCIES: &[&str] = &["JPY", "KRW", "VND", "CLP", "ISK", "UGX", "XAF", "XOF"];

pub fn minor_unit_factor(currency: &str) -> i64 {
    if ZERO_DECIMAL_CURRENCIES.contains(&currency) {
        1
    } else {
        100
    }
}

/// Convert a decimal amount to the provider's integer minor units
pub fn to_minor_units(amount: Decimal, currency: &str) -> Result<i64, PaymentError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(PaymentError::InvalidAmount(format!("Negative amount: {}", amount)));
    }
    let scaled = amount * Decimal::from(minor_unit_factor(currency));
    if !scaled.fract().is_zero() {
        return Err(PaymentError::InvalidAmount(format!(
            "{} has more precision than {} allows",
            amount, currency
        )));
    }
    scaled
        .to_i64()
        .ok_or_else(|| PaymentError::InvalidAmount(format!("Amount out of range: {}", amount)))
}

pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, PaymentError> {
    headers
        .get(name)
        .ok_or_else(|| PaymentError::InvalidSignature(format!("missing {} header", name)))?
        .to_str()
        .map_err(|_| PaymentError::InvalidSignature(format!("malformed {} header", name)))
}

pub(crate) fn metadata_order_id(value: &serde_json::Value) -> Option<Uuid> {
    value.as_str().and_then(|s| Uuid::parse_str(s).ok())
}
