use async_trait::async_trait;
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha512;
use tracing::{debug, warn};

use super::{
    header_str, metadata_order_id, CheckoutRequest, CheckoutSession, PaidAmount, PaymentError, PaymentProvider, WebhookEvent,
    WebhookEventKind,
};

pub struct PaystackProvider {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct InitializeResponse {
    status: bool,
    message: String,
    data: Option<InitializeData>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    reference: String,
}

impl PaystackProvider {
    pub fn new(client: reqwest::Client, api_base: String, secret_key: String) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
        }
    }

    fn initialize_body(request: &CheckoutRequest) -> Value {
        json!({
            "email": request.customer_email,
            "amount": request.total_minor(),
            "currency": request.currency,
            "reference": request.order_number,
            "callback_url": request.success_url,
            "metadata": {
                "order_id": request.order_id.to_string(),
                "tenant": request.tenant,
                "cancel_action": request.cancel_url,
            }
        })
    }
}

#[async_trait]
impl PaymentProvider for PaystackProvider {
    fn name(&self) -> &'static str {
        "paystack"
    }

    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError> {
        let response = self
            .client
            .post(format!("{}/transaction/initialize", self.api_base))
            .bearer_auth(&self.secret_key)
            .json(&Self::initialize_body(request))
            .send()
            .await?;

        let status = response.status();
        let body: InitializeResponse = response.json().await?;
        let data = match body.data {
            Some(data) if status.is_success() && body.status => data,
            _ => {
                warn!("Paystack initialize failed with {}: {}", status, body.message);
                return Err(PaymentError::Provider(body.message));
            }
        };

        debug!("Initialized Paystack transaction {}", data.reference);
        Ok(CheckoutSession {
            provider: self.name().to_string(),
            reference: data.reference,
            url: data.authorization_url,
        })
    }

    fn parse_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<WebhookEvent, PaymentError> {
        let signature = header_str(headers, "x-paystack-signature")?;
        verify_signature(signature, body, &self.secret_key)?;
        parse_event(body)
    }
}

/// `x-paystack-signature` is hex HMAC-SHA512 of the raw body keyed with the secret key
pub fn verify_signature(signature: &str, body: &[u8], secret: &str) -> Result<(), PaymentError> {
    let expected = hex::decode(signature.trim())
        .map_err(|_| PaymentError::InvalidSignature("signature is not hex".to_string()))?;
    let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::InvalidSignature(e.to_string()))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| PaymentError::InvalidSignature("signature mismatch".to_string()))
}

fn parse_event(body: &[u8]) -> Result<WebhookEvent, PaymentError> {
    let event: Value = serde_json::from_slice(body).map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;

    let event_type = event["event"]
        .as_str()
        .ok_or_else(|| PaymentError::InvalidPayload("event type missing".to_string()))?
        .to_string();
    let data = &event["data"];

    let kind = match event_type.as_str() {
        "charge.success" => WebhookEventKind::Succeeded,
        "charge.failed" => WebhookEventKind::Failed,
        _ => WebhookEventKind::Ignored,
    };

    // Paystack has no delivery id; the transaction id plus event type is stable across retries
    let transaction = match &data["id"] {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => data["reference"].as_str().unwrap_or_default().to_string(),
    };

    Ok(WebhookEvent {
        id: format!("{}:{}", event_type, transaction),
        kind,
        event_type,
        order_id: metadata_order_id(&data["metadata"]["order_id"]),
        tenant: data["metadata"]["tenant"].as_str().map(str::to_string),
        reference: data["reference"].as_str().map(str::to_string),
        amount: PaidAmount::from_json(&data["amount"], &data["currency"]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "sk_test_paystack";

    fn sign(body: &[u8]) -> String {
        let mut mac = Hmac::<Sha512>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn signature_check() {
        let body = br#"{"event":"charge.success"}"#;
        assert!(verify_signature(&sign(body), body, SECRET).is_ok());
        assert!(verify_signature(&sign(body), br#"{"event":"charge.failed"}"#, SECRET).is_err());
        assert!(verify_signature("not-hex", body, SECRET).is_err());
    }

    #[test]
    fn maps_charge_events() {
        let order_id = uuid::Uuid::new_v4();
        let body = json!({
            "event": "charge.success",
            "data": {
                "id": 302961,
                "reference": "FOL-20260101-ABCDEFGH",
                "amount": 150000,
                "currency": "NGN",
                "metadata": {"order_id": order_id.to_string(), "tenant": "acme"}
            }
        });
        let event = parse_event(body.to_string().as_bytes()).unwrap();
        assert_eq!(event.kind, WebhookEventKind::Succeeded);
        assert_eq!(event.id, "charge.success:302961");
        assert_eq!(event.order_id, Some(order_id));
        assert_eq!(event.reference.as_deref(), Some("FOL-20260101-ABCDEFGH"));
        assert!(event.amount.is_some_and(|a| a.settles("1500".parse().unwrap(), "NGN")));

        let ignored = json!({"event": "transfer.success", "data": {}});
        assert_eq!(parse_event(ignored.to_string().as_bytes()).unwrap().kind, WebhookEventKind::Ignored);
        assert!(parse_event(b"not json").is_err());
    }
}
