use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};
use sqlx::PgPool;
use uuid::Uuid;

use super::auth::AuthUser;
use crate::database::models::Tenant;
use crate::database::{service, DatabaseManager};
use crate::error::ApiError;

pub const TENANT_HEADER: &str = "x-tenant";

/// Extracted tenant database pool, injected by middleware
#[derive(Clone)]
pub struct TenantPool(pub PgPool);

/// Active tenant from folio_main.tenants
#[derive(Clone, Debug)]
pub struct ValidatedTenant {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub database: String,
}

impl From<Tenant> for ValidatedTenant {
    fn from(tenant: Tenant) -> Self {
        Self {
            id: tenant.id,
            name: tenant.name,
            display_name: tenant.display_name,
            database: tenant.database,
        }
    }
}

/// 404 for unknown tenants, 403 for inactive or trashed ones
fn check_tenant(tenant: Option<Tenant>, label: &str) -> Result<ValidatedTenant, ApiError> {
    let tenant = tenant.ok_or_else(|| {
        tracing::warn!("Tenant '{}' not found", label);
        ApiError::not_found(format!("Tenant '{}' not found", label))
    })?;

    if !tenant.is_available() {
        tracing::warn!("Tenant '{}' is not active", tenant.name);
        return Err(ApiError::forbidden(format!("Tenant '{}' is not active", tenant.name)));
    }
    Ok(tenant.into())
}

async fn attach_pool(tenant: ValidatedTenant) -> Result<(ValidatedTenant, PgPool), ApiError> {
    let pool = DatabaseManager::tenant_pool(&tenant.database).await.map_err(|e| {
        tracing::error!("Failed to get database pool for tenant '{}': {}", tenant.database, e);
        ApiError::from(e)
    })?;
    Ok((tenant, pool))
}

/// Resolve a tenant by its public name
pub async fn resolve_tenant_by_name(name: &str) -> Result<(ValidatedTenant, PgPool), ApiError> {
    let tenant = check_tenant(service::find_tenant_by_name(name).await?, name)?;
    attach_pool(tenant).await
}

/// Validates the tenant named by the JWT `database` claim
pub async fn validate_tenant_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before tenant validation"))?;

    if auth_user.is_root() {
        return Err(ApiError::forbidden("Root tokens are not bound to a tenant"));
    }

    let tenant = check_tenant(service::find_tenant_by_database(&auth_user.database).await?, &auth_user.tenant)?;
    let (tenant, pool) = attach_pool(tenant).await?;

    tracing::debug!("Tenant validation successful: {} ({})", tenant.name, tenant.database);
    Ok(run_for_tenant(tenant, pool, request, next).await)
}

/// Run the request with the tenant attached, and echo the tenant on the response for request metrics
async fn run_for_tenant(tenant: ValidatedTenant, pool: PgPool, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(tenant.clone());
    request.extensions_mut().insert(TenantPool(pool));

    let mut response = next.run(request).await;
    response.extensions_mut().insert(tenant);
    response
}

pub fn tenant_from_headers(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("Missing X-Tenant header"))
}

/// Public catalogue routes name their tenant with `X-Tenant`
pub async fn tenant_header_middleware(headers: HeaderMap, request: Request, next: Next) -> Result<Response, ApiError> {
    let name = tenant_from_headers(&headers)?;
    let (tenant, pool) = resolve_tenant_by_name(&name).await?;

    Ok(run_for_tenant(tenant, pool, request, next).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};
    use chrono::Utc;

    fn tenant(active: bool) -> Tenant {
        Tenant {
            id: Uuid::new_v4(),
            name: "acme".to_string(),
            display_name: "Acme Press".to_string(),
            database: "tenant_0123456789abcdef".to_string(),
            is_active: active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            trashed_at: None,
            deleted_at: None,
        }
    }

    #[test]
    fn unknown_and_inactive_tenants() {
        assert_eq!(check_tenant(None, "ghost").unwrap_err().status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            check_tenant(Some(tenant(false)), "acme").unwrap_err().status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(check_tenant(Some(tenant(true)), "acme").unwrap().name, "acme");
    }

    #[test]
    fn tenant_header_is_required() {
        let mut headers = HeaderMap::new();
        assert_eq!(tenant_from_headers(&headers).unwrap_err().status_code(), StatusCode::BAD_REQUEST);
        headers.insert(TENANT_HEADER, HeaderValue::from_static(" acme "));
        assert_eq!(tenant_from_headers(&headers).unwrap(), "acme");
    }
}
