use axum::Json;
use serde::Deserialize;

use crate::database::models::Tenant;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::TenantService;

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub name: String,
    pub display_name: Option<String>,
}

/// GET /api/root/tenants
pub async fn list() -> ApiResult<Vec<Tenant>> {
    let service = TenantService::new().await?;
    Ok(ApiResponse::success(service.list_tenants().await?))
}

/// POST /api/root/tenants: provisions the database, applies the schema, registers the tenant
pub async fn create(Json(payload): Json<CreateTenantRequest>) -> ApiResult<Tenant> {
    let service = TenantService::new().await?;
    let tenant = service
        .create_tenant(payload.name.trim(), payload.display_name.as_deref().map(str::trim))
        .await?;
    Ok(ApiResponse::created(tenant))
}
