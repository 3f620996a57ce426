use axum::response::Json;
use serde_json::{json, Value};

use crate::config;
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

pub async fn root() -> Json<Value> {
    let site = &config::config().site;

    Json(json!({
        "success": true,
        "data": {
            "name": site.name,
            "service": "folio-api",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "health": "/health (public)",
                "auth": "/auth/register/:tenant, /auth/login/:tenant, /auth/refresh (public)",
                "catalogue": "/api/books, /api/courses, /api/events, /api/blog (public, X-Tenant header)",
                "webhooks": "/api/webhooks/:provider (public, signed)",
                "account": "/api/auth/whoami, /api/orders, /api/enrollments, /api/reading-progress (protected)",
                "admin": "/api/admin/* (admin role)",
                "root": "/api/root/tenants (root token)"
            }
        }
    }))
}

pub async fn health() -> ApiResult<Value> {
    match DatabaseManager::health_check().await {
        Ok(()) => Ok(ApiResponse::success(json!({
            "status": "ok",
            "database": "ok",
            "timestamp": chrono::Utc::now(),
        }))),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            Err(ApiError::service_unavailable("Database unavailable"))
        }
    }
}
