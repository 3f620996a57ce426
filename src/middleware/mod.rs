pub mod auth;
pub mod metrics;
pub mod rate_limit;
pub mod response;
pub mod tenant;
pub mod validate_user;

pub use auth::{jwt_auth_middleware, AuthUser};
pub use metrics::request_metrics_middleware;
pub use rate_limit::{api_rate_limit, auth_rate_limit, webhook_rate_limit};
pub use response::{ApiResponse, ApiResult};
pub use tenant::{tenant_header_middleware, validate_tenant_middleware, TenantPool, ValidatedTenant};
pub use validate_user::{require_admin, require_root, validate_user_middleware, CurrentUser};
