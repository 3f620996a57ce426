mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::get(server.url("/health")).await?;

    // OK with a database, SERVICE_UNAVAILABLE without one
    let status = res.status();
    assert!(
        status == StatusCode::OK || status == StatusCode::SERVICE_UNAVAILABLE,
        "unexpected status: {}",
        status
    );

    let body = res.json::<serde_json::Value>().await?;
    if status == StatusCode::OK {
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "ok");
    } else {
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
    }
    Ok(())
}

#[tokio::test]
async fn root_describes_service() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::get(server.url("/")).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["service"], "folio-api");
    assert!(body["data"]["endpoints"]["admin"].is_string());
    Ok(())
}

#[tokio::test]
async fn catalogue_requires_tenant_header() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::get(server.url("/api/books")).await?;
    common::assert_error(res, StatusCode::BAD_REQUEST, "BAD_REQUEST").await?;
    Ok(())
}

#[tokio::test]
async fn unknown_route_is_404() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::get(server.url("/api/nope")).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}
