use axum::Extension;
use serde::Serialize;

use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, ValidatedTenant};

#[derive(Debug, Serialize)]
pub struct TenantInfo {
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct WhoAmI {
    pub user: User,
    pub tenant: TenantInfo,
}

/// GET /api/auth/whoami
pub async fn whoami(
    Extension(current): Extension<CurrentUser>,
    Extension(tenant): Extension<ValidatedTenant>,
) -> ApiResult<WhoAmI> {
    Ok(ApiResponse::success(WhoAmI {
        user: current.user,
        tenant: TenantInfo {
            name: tenant.name,
            display_name: tenant.display_name,
        },
    }))
}
