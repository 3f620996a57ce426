mod common;

use anyhow::Result;
use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use serde_json::json;
use sha2::Sha256;

fn stripe_signature(body: &str, secret: &str) -> Result<String> {
    let t = chrono::Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(format!("{}.{}", t, body).as_bytes());
    Ok(format!("t={},v1={}", t, hex::encode(mac.finalize().into_bytes())))
}

#[tokio::test]
async fn unknown_provider_is_404() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/api/webhooks/paystack"))
        .body("{}")
        .send()
        .await?;
    common::assert_error(res, StatusCode::NOT_FOUND, "NOT_FOUND").await?;
    Ok(())
}

#[tokio::test]
async fn bad_signature_is_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let body = json!({ "id": "evt_1", "type": "checkout.session.completed" }).to_string();

    let res = client.post(server.url("/api/webhooks/stripe")).body(body.clone()).send().await?;
    common::assert_error(res, StatusCode::BAD_REQUEST, "BAD_REQUEST").await?;

    let res = client
        .post(server.url("/api/webhooks/stripe"))
        .header("stripe-signature", stripe_signature(&body, "whsec_wrong")?)
        .body(body)
        .send()
        .await?;
    common::assert_error(res, StatusCode::BAD_REQUEST, "BAD_REQUEST").await?;
    Ok(())
}

#[tokio::test]
async fn unhandled_event_types_are_acknowledged() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let body = json!({
        "id": "evt_ignored",
        "type": "customer.created",
        "data": { "object": { "id": "cus_123" } }
    })
    .to_string();

    let res = client
        .post(server.url("/api/webhooks/stripe"))
        .header("stripe-signature", stripe_signature(&body, common::STRIPE_WEBHOOK_SECRET)?)
        .body(body)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["received"], true);
    assert_eq!(body["data"]["outcome"], "ignored");
    Ok(())
}

#[tokio::test]
async fn paid_event_without_tenant_is_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let body = json!({
        "id": "evt_no_tenant",
        "type": "checkout.session.completed",
        "data": { "object": { "id": "cs_test_1", "metadata": {} } }
    })
    .to_string();

    let res = client
        .post(server.url("/api/webhooks/stripe"))
        .header("stripe-signature", stripe_signature(&body, common::STRIPE_WEBHOOK_SECRET)?)
        .body(body)
        .send()
        .await?;
    common::assert_error(res, StatusCode::BAD_REQUEST, "BAD_REQUEST").await?;
    Ok(())
}
