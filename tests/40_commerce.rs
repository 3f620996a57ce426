mod common;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use sha2::Sha256;
use sqlx::PgPool;
use uuid::Uuid;

use common::TestServer;
use folio_api::auth::{encode_token, Claims};

const PASSWORD: &str = "correct-horse-battery-9";

/// A freshly provisioned tenant with an admin and a reader
struct Shop {
    tenant: String,
    pool: PgPool,
    admin: String,
    reader: String,
    reader_id: Uuid,
}

/// These flows need Postgres; without DATABASE_URL the server answers 503 and they are skipped
async fn database_ready(server: &TestServer) -> Result<bool> {
    if std::env::var("DATABASE_URL").is_err() {
        return Ok(false);
    }
    let res = reqwest::get(server.url("/health")).await?;
    Ok(res.status() == StatusCode::OK)
}

async fn tenant_pool(database: &str) -> Result<PgPool> {
    let mut url = url::Url::parse(&std::env::var("DATABASE_URL")?)?;
    url.set_path(&format!("/{}", database));
    Ok(PgPool::connect(url.as_str()).await?)
}

async fn register(client: &Client, server: &TestServer, tenant: &str, email: &str, ip: &str) -> Result<(String, Uuid)> {
    let res = client
        .post(server.url(&format!("/auth/register/{}", tenant)))
        .header("x-forwarded-for", ip)
        .json(&json!({ "email": email, "name": "Test User", "password": PASSWORD }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json::<Value>().await?;
    let token = body["data"]["token"].as_str().context("token missing")?.to_string();
    let id = body["data"]["user"]["id"].as_str().context("user id missing")?.parse()?;
    Ok((token, id))
}

async fn login(client: &Client, server: &TestServer, tenant: &str, email: &str, ip: &str) -> Result<String> {
    let res = client
        .post(server.url(&format!("/auth/login/{}", tenant)))
        .header("x-forwarded-for", ip)
        .json(&json!({ "email": email, "password": PASSWORD }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    Ok(body["data"]["token"].as_str().context("token missing")?.to_string())
}

/// Provision a tenant through the root API and seed one admin and one reader
async fn open_shop(client: &Client, server: &TestServer, ip_seed: u8) -> Result<Shop> {
    let root = encode_token(&Claims::root("ci"), common::JWT_SECRET)?;
    let name = format!("shop_{}", &Uuid::new_v4().simple().to_string()[..10]);

    let res = client
        .post(server.url("/api/root/tenants"))
        .bearer_auth(&root)
        .json(&json!({ "name": name }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json::<Value>().await?;
    let database = body["data"]["database"].as_str().context("database missing")?.to_string();
    let pool = tenant_pool(&database).await?;

    let ip = common::client_ip(ip_seed);
    let (_, admin_id) = register(client, server, &name, "admin@example.com", &ip).await?;
    let (reader, reader_id) = register(client, server, &name, "reader@example.com", &ip).await?;

    // Admins are appointed by operators, never through self-service registration
    sqlx::query("UPDATE users SET role = 'admin' WHERE id = $1")
        .bind(admin_id)
        .execute(&pool)
        .await?;
    let admin = login(client, server, &name, "admin@example.com", &ip).await?;

    Ok(Shop {
        tenant: name,
        pool,
        admin,
        reader,
        reader_id,
    })
}

async fn create(client: &Client, server: &TestServer, token: &str, path: &str, body: Value) -> Result<reqwest::Response> {
    Ok(client.post(server.url(path)).bearer_auth(token).json(&body).send().await?)
}

async fn created_id(res: reqwest::Response) -> Result<Uuid> {
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json::<Value>().await?;
    Ok(body["data"]["id"].as_str().context("id missing")?.parse()?)
}

fn stripe_signature(body: &str) -> Result<String> {
    let t = Utc::now().timestamp();
    let mut mac =
        Hmac::<Sha256>::new_from_slice(common::STRIPE_WEBHOOK_SECRET.as_bytes()).expect("hmac accepts any key length");
    mac.update(format!("{}.{}", t, body).as_bytes());
    Ok(format!("t={},v1={}", t, hex::encode(mac.finalize().into_bytes())))
}

#[tokio::test]
async fn catalogue_conflicts() -> Result<()> {
    let server = common::ensure_server().await?;
    if !database_ready(server).await? {
        return Ok(());
    }
    let client = Client::new();
    let shop = open_shop(&client, server, 40).await?;

    let course = json!({ "title": "Rust 101", "slug": "rust-101", "price": "0", "status": "published" });
    let res = create(&client, server, &shop.admin, "/api/admin/courses", course.clone()).await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let res = create(&client, server, &shop.admin, "/api/admin/courses", course).await?;
    common::assert_error(res, StatusCode::CONFLICT, "CONFLICT").await?;

    let book = json!({ "title": "Field Notes", "price": "0", "status": "published" });
    let book_id = created_id(create(&client, server, &shop.admin, "/api/books", book).await?).await?;
    let review = json!({ "rating": 5, "title": "Loved it" });
    let path = format!("/api/books/{}/reviews", book_id);
    let res = create(&client, server, &shop.reader, &path, review.clone()).await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let res = create(&client, server, &shop.reader, &path, review).await?;
    common::assert_error(res, StatusCode::CONFLICT, "CONFLICT").await?;

    let starts_at = Utc::now() + Duration::days(7);
    let event = json!({
        "title": "Launch Night",
        "is_online": true,
        "starts_at": starts_at,
        "ends_at": starts_at + Duration::hours(2),
        "capacity": 1,
        "price": "0",
        "status": "published"
    });
    let event_id = created_id(create(&client, server, &shop.admin, "/api/admin/events", event).await?).await?;
    let path = format!("/api/events/{}/register", event_id);
    let res = create(&client, server, &shop.reader, &path, json!({})).await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    // The only seat is taken, so the admin is turned away
    let res = create(&client, server, &shop.admin, &path, json!({})).await?;
    let body = common::assert_error(res, StatusCode::CONFLICT, "CONFLICT").await?;
    assert_eq!(body["error"], "This event is full");
    Ok(())
}

#[tokio::test]
async fn purchases_gate_access() -> Result<()> {
    let server = common::ensure_server().await?;
    if !database_ready(server).await? {
        return Ok(());
    }
    let client = Client::new();
    let shop = open_shop(&client, server, 41).await?;

    // Free course: enroll, then finishing it completes the enrollment
    let free = json!({ "title": "Intro", "price": "0", "status": "published" });
    let free_id = created_id(create(&client, server, &shop.admin, "/api/admin/courses", free).await?).await?;
    let res = create(&client, server, &shop.reader, &format!("/api/courses/{}/enroll", free_id), json!({})).await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let enrollment_id = res.json::<Value>().await?["data"]["id"].as_str().context("id missing")?.to_string();

    let res = client
        .patch(server.url(&format!("/api/enrollments/{}/progress", enrollment_id)))
        .bearer_auth(&shop.reader)
        .json(&json!({ "progress_percent": 100 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["status"], "completed");
    assert!(body["data"]["completed_at"].is_string());

    // Free checkout is paid on the spot, with no payment page
    let book = json!({ "title": "Free Sampler", "price": "0", "status": "published" });
    let book_id = created_id(create(&client, server, &shop.admin, "/api/books", book).await?).await?;
    let cart = json!({ "items": [{ "type": "book", "id": book_id }] });
    let res = create(&client, server, &shop.reader, "/api/checkout", cart).await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["order"]["status"], "paid");
    assert!(body["data"].get("checkout_url").is_none());

    // Paid course: no enrollment without a paid order
    let paid = json!({ "title": "Advanced", "price": "49.00", "currency": "USD", "status": "published" });
    let paid_id = created_id(create(&client, server, &shop.admin, "/api/admin/courses", paid).await?).await?;
    let enroll_path = format!("/api/courses/{}/enroll", paid_id);
    let res = create(&client, server, &shop.reader, &enroll_path, json!({})).await?;
    common::assert_error(res, StatusCode::FORBIDDEN, "FORBIDDEN").await?;

    // Pending order as the hosted payment page would leave it
    let order_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO orders (id, order_number, user_id, total, currency, payment_provider) \
         VALUES ($1, $2, $3, 49.00, 'USD', 'stripe')",
    )
    .bind(order_id)
    .bind(format!("FOL-TEST-{}", &order_id.simple().to_string()[..8]))
    .bind(shop.reader_id)
    .execute(&shop.pool)
    .await?;
    sqlx::query(
        "INSERT INTO order_items (id, order_id, item_type, item_id, title, unit_price) \
         VALUES ($1, $2, 'course', $3, 'Advanced', 49.00)",
    )
    .bind(Uuid::new_v4())
    .bind(order_id)
    .bind(paid_id)
    .execute(&shop.pool)
    .await?;

    let webhook = json!({
        "id": format!("evt_{}", order_id.simple()),
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_test_paid",
            "amount_total": 4900,
            "currency": "usd",
            "metadata": { "order_id": order_id.to_string(), "tenant": shop.tenant }
        }}
    })
    .to_string();

    // Providers retry deliveries; only the first one fulfils
    for expected in ["paid", "duplicate"] {
        let res = client
            .post(server.url("/api/webhooks/stripe"))
            .header("stripe-signature", stripe_signature(&webhook)?)
            .body(webhook.clone())
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::OK);
        let body = res.json::<Value>().await?;
        assert_eq!(body["data"]["outcome"], expected);
    }

    let enrollments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE user_id = $1 AND course_id = $2")
        .bind(shop.reader_id)
        .bind(paid_id)
        .fetch_one(&shop.pool)
        .await?;
    assert_eq!(enrollments, 1);

    let res = create(&client, server, &shop.reader, &enroll_path, json!({})).await?;
    common::assert_error(res, StatusCode::CONFLICT, "CONFLICT").await?;
    Ok(())
}

#[tokio::test]
async fn underpaid_webhook_leaves_order_pending() -> Result<()> {
    let server = common::ensure_server().await?;
    if !database_ready(server).await? {
        return Ok(());
    }
    let client = Client::new();
    let shop = open_shop(&client, server, 42).await?;

    let order_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO orders (id, order_number, user_id, total, currency, payment_provider) \
         VALUES ($1, $2, $3, 25.00, 'USD', 'stripe')",
    )
    .bind(order_id)
    .bind(format!("FOL-TEST-{}", &order_id.simple().to_string()[..8]))
    .bind(shop.reader_id)
    .execute(&shop.pool)
    .await?;

    let webhook = json!({
        "id": format!("evt_{}", order_id.simple()),
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_test_short",
            "amount_total": 100,
            "currency": "usd",
            "metadata": { "order_id": order_id.to_string(), "tenant": shop.tenant }
        }}
    })
    .to_string();
    let res = client
        .post(server.url("/api/webhooks/stripe"))
        .header("stripe-signature", stripe_signature(&webhook)?)
        .body(webhook)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["data"]["outcome"], "amount_mismatch");

    let status: String = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_one(&shop.pool)
        .await?;
    assert_eq!(status, "pending");
    Ok(())
}
