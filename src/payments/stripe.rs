use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, warn};

use super::{
    header_str, metadata_order_id, CheckoutRequest, CheckoutSession, PaidAmount, PaymentError, PaymentProvider, WebhookEvent,
    WebhookEventKind,
};

/// Maximum age of a signed webhook delivery
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

pub struct StripeProvider {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
    webhook_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

impl StripeProvider {
    pub fn new(client: reqwest::Client, api_base: String, secret_key: String, webhook_secret: Option<String>) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
            webhook_secret,
        }
    }

    fn session_form(request: &CheckoutRequest) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            ("client_reference_id".to_string(), request.order_id.to_string()),
            ("customer_email".to_string(), request.customer_email.clone()),
            ("metadata[order_id]".to_string(), request.order_id.to_string()),
            ("metadata[order_number]".to_string(), request.order_number.clone()),
            ("metadata[tenant]".to_string(), request.tenant.clone()),
        ];

        let currency = request.currency.to_ascii_lowercase();
        for (i, line) in request.lines.iter().enumerate() {
            let prefix = format!("line_items[{}]", i);
            form.push((format!("{}[quantity]", prefix), line.quantity.to_string()));
            form.push((format!("{}[price_data][currency]", prefix), currency.clone()));
            form.push((format!("{}[price_data][unit_amount]", prefix), line.unit_amount.to_string()));
            form.push((format!("{}[price_data][product_data][name]", prefix), line.title.clone()));
        }
        form
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    fn name(&self) -> &'static str {
        "stripe"
    }

    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError> {
        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&Self::session_form(request))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Stripe checkout session failed with {}: {}", status, body);
            return Err(PaymentError::Provider(format!("stripe returned {}", status)));
        }

        let session: SessionResponse = response.json().await?;
        let url = session
            .url
            .ok_or_else(|| PaymentError::Provider("stripe session has no url".to_string()))?;

        debug!("Created Stripe session {} for order {}", session.id, request.order_number);
        Ok(CheckoutSession {
            provider: self.name().to_string(),
            reference: session.id,
            url,
        })
    }

    fn parse_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<WebhookEvent, PaymentError> {
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or_else(|| PaymentError::InvalidSignature("webhook secret not configured".to_string()))?;
        let signature = header_str(headers, "stripe-signature")?;
        verify_signature(signature, body, secret, Utc::now().timestamp())?;
        parse_event(body)
    }
}

/// `Stripe-Signature: t=<unix>,v1=<hex>[,v1=<hex>...]`, HMAC-SHA256 over `"{t}.{body}"`
pub fn verify_signature(header: &str, body: &[u8], secret: &str, now: i64) -> Result<(), PaymentError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", t)) => timestamp = t.parse().ok(),
            Some(("v1", sig)) => candidates.push(sig),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| PaymentError::InvalidSignature("missing timestamp".to_string()))?;
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(PaymentError::InvalidSignature("timestamp outside tolerance".to_string()));
    }

    let matches = candidates.iter().any(|candidate| {
        let Ok(expected) = hex::decode(candidate) else {
            return false;
        };
        let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        mac.verify_slice(&expected).is_ok()
    });

    if matches {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature("no matching v1 signature".to_string()))
    }
}

fn parse_event(body: &[u8]) -> Result<WebhookEvent, PaymentError> {
    let event: Value = serde_json::from_slice(body).map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;

    let id = event["id"]
        .as_str()
        .ok_or_else(|| PaymentError::InvalidPayload("event id missing".to_string()))?
        .to_string();
    let event_type = event["type"].as_str().unwrap_or_default().to_string();

    let kind = match event_type.as_str() {
        "checkout.session.completed" | "checkout.session.async_payment_succeeded" => WebhookEventKind::Succeeded,
        "checkout.session.expired" | "checkout.session.async_payment_failed" => WebhookEventKind::Failed,
        _ => WebhookEventKind::Ignored,
    };

    let object = &event["data"]["object"];
    Ok(WebhookEvent {
        id,
        kind,
        event_type,
        order_id: metadata_order_id(&object["metadata"]["order_id"]),
        tenant: object["metadata"]["tenant"].as_str().map(str::to_string),
        reference: object["id"].as_str().map(str::to_string),
        amount: PaidAmount::from_json(&object["amount_total"], &object["currency"]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "whsec_test";

    fn sign(body: &[u8], t: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{}.", t).as_bytes());
        mac.update(body);
        format!("t={},v1={}", t, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn accepts_valid_signature() {
        let body = br#"{"id":"evt_1"}"#;
        let now = 1_700_000_000;
        assert!(verify_signature(&sign(body, now), body, SECRET, now + 10).is_ok());
    }

    #[test]
    fn rejects_tampered_body_and_stale_timestamp() {
        let body = br#"{"id":"evt_1"}"#;
        let now = 1_700_000_000;
        let header = sign(body, now);
        assert!(verify_signature(&header, br#"{"id":"evt_2"}"#, SECRET, now).is_err());
        assert!(verify_signature(&header, body, SECRET, now + SIGNATURE_TOLERANCE_SECS + 1).is_err());
        assert!(verify_signature("v1=deadbeef", body, SECRET, now).is_err());
        assert!(verify_signature(&format!("t={},v1=zz", now), body, SECRET, now).is_err());
    }

    #[test]
    fn maps_checkout_events() {
        let order_id = uuid::Uuid::new_v4();
        let body = json!({
            "id": "evt_123",
            "type": "checkout.session.completed",
            "data": {"object": {
                "id": "cs_test_1",
                "amount_total": 2999,
                "currency": "usd",
                "metadata": {"order_id": order_id.to_string(), "tenant": "acme"}
            }}
        });
        let event = parse_event(body.to_string().as_bytes()).unwrap();
        assert_eq!(event.kind, WebhookEventKind::Succeeded);
        assert_eq!(event.order_id, Some(order_id));
        assert_eq!(event.tenant.as_deref(), Some("acme"));
        assert_eq!(event.reference.as_deref(), Some("cs_test_1"));
        assert_eq!(event.amount, Some(PaidAmount { minor: 2999, currency: "USD".to_string() }));

        let expired = json!({"id": "evt_2", "type": "checkout.session.expired", "data": {"object": {}}});
        assert_eq!(parse_event(expired.to_string().as_bytes()).unwrap().kind, WebhookEventKind::Failed);

        let other = json!({"id": "evt_3", "type": "customer.created", "data": {"object": {}}});
        assert_eq!(parse_event(other.to_string().as_bytes()).unwrap().kind, WebhookEventKind::Ignored);
    }

    #[test]
    fn session_form_uses_minor_units() {
        let request = CheckoutRequest {
            order_id: uuid::Uuid::nil(),
            order_number: "FOL-20260101-AAAAAAAA".to_string(),
            tenant: "acme".to_string(),
            customer_email: "a@acme.test".to_string(),
            currency: "USD".to_string(),
            lines: vec![crate::payments::CheckoutLine { title: "Rust".to_string(), unit_amount: 2999, quantity: 1 }],
            success_url: "https://acme.test/ok".to_string(),
            cancel_url: "https://acme.test/cancel".to_string(),
        };
        let form = StripeProvider::session_form(&request);
        assert!(form.contains(&("line_items[0][price_data][unit_amount]".to_string(), "2999".to_string())));
        assert!(form.contains(&("line_items[0][price_data][currency]".to_string(), "usd".to_string())));
        assert!(form.contains(&("metadata[tenant]".to_string(), "acme".to_string())));
    }
}
