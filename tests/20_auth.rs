mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;
use uuid::Uuid;

use folio_api::auth::{encode_token, Claims};

fn tenant_token(secret: &str) -> Result<String> {
    let claims = Claims::new(
        Uuid::new_v4(),
        "acme".to_string(),
        "tenant_0000000000000000".to_string(),
        "reader".to_string(),
        "reader@example.com".to_string(),
    );
    Ok(encode_token(&claims, secret)?)
}

#[tokio::test]
async fn whoami_requires_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::get(server.url("/api/auth/whoami")).await?;
    common::assert_error(res, StatusCode::UNAUTHORIZED, "UNAUTHORIZED").await?;
    Ok(())
}

#[tokio::test]
async fn token_signed_with_other_secret_is_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/api/admin/stats"))
        .bearer_auth(tenant_token("not-the-server-secret")?)
        .send()
        .await?;
    common::assert_error(res, StatusCode::UNAUTHORIZED, "UNAUTHORIZED").await?;
    Ok(())
}

#[tokio::test]
async fn admin_stats_requires_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::get(server.url("/api/admin/stats")).await?;
    common::assert_error(res, StatusCode::UNAUTHORIZED, "UNAUTHORIZED").await?;
    Ok(())
}

#[tokio::test]
async fn root_routes_reject_tenant_tokens() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/api/root/tenants"))
        .bearer_auth(tenant_token(common::JWT_SECRET)?)
        .send()
        .await?;
    common::assert_error(res, StatusCode::FORBIDDEN, "FORBIDDEN").await?;
    Ok(())
}

#[tokio::test]
async fn tenant_routes_reject_root_tokens() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let token = encode_token(&Claims::root("ci"), common::JWT_SECRET)?;

    let res = client.get(server.url("/api/auth/whoami")).bearer_auth(&token).send().await?;
    common::assert_error(res, StatusCode::FORBIDDEN, "FORBIDDEN").await?;

    // Root listing works with a database and reports 503 without one
    let res = client.get(server.url("/api/root/tenants")).bearer_auth(&token).send().await?;
    assert!(
        res.status() == StatusCode::OK || res.status() == StatusCode::SERVICE_UNAVAILABLE,
        "unexpected status: {}",
        res.status()
    );
    Ok(())
}

#[tokio::test]
async fn refresh_rejects_garbage() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/auth/refresh"))
        .header("x-forwarded-for", common::client_ip(20))
        .json(&json!({ "token": "not-a-jwt" }))
        .send()
        .await?;
    common::assert_error(res, StatusCode::UNAUTHORIZED, "UNAUTHORIZED").await?;
    Ok(())
}

#[tokio::test]
async fn login_is_rate_limited() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let ip = common::client_ip(21);

    let mut limited = None;
    for _ in 0..50 {
        let res = client
            .post(server.url("/auth/login/acme"))
            .header("x-forwarded-for", &ip)
            .json(&json!({ "email": "reader@example.com", "password": "wrong-password" }))
            .send()
            .await?;
        assert!(res.headers().contains_key("x-ratelimit-limit"));
        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            limited = Some(res);
            break;
        }
    }

    let res = limited.expect("login attempts were never rate limited");
    assert!(res.headers().contains_key("retry-after"));
    assert_eq!(res.headers()["x-ratelimit-remaining"], "0");
    common::assert_error(res, StatusCode::TOO_MANY_REQUESTS, "TOO_MANY_REQUESTS").await?;

    // Other clients keep their own budget
    let res = client
        .post(server.url("/auth/login/acme"))
        .header("x-forwarded-for", common::client_ip(22))
        .json(&json!({ "email": "reader@example.com", "password": "wrong-password" }))
        .send()
        .await?;
    assert_ne!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    Ok(())
}

#[tokio::test]
async fn platform_monitoring_is_root_only() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/api/root/monitoring"))
        .bearer_auth(tenant_token(common::JWT_SECRET)?)
        .send()
        .await?;
    common::assert_error(res, StatusCode::FORBIDDEN, "FORBIDDEN").await?;

    let token = encode_token(&Claims::root("ci"), common::JWT_SECRET)?;
    let res = client
        .get(server.url("/api/root/monitoring?window_minutes=5"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["summary"]["window_secs"], 300);
    assert!(body["data"]["recent_errors"].is_array());

    let res = client
        .get(server.url("/api/root/monitoring?window_minutes=0"))
        .bearer_auth(&token)
        .send()
        .await?;
    common::assert_error(res, StatusCode::BAD_REQUEST, "BAD_REQUEST").await?;
    Ok(())
}
