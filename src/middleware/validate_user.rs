use axum::{extract::Request, middleware::Next, response::Response};

use super::auth::AuthUser;
use super::tenant::TenantPool;
use crate::database::models::{Role, User};
use crate::database::service;
use crate::error::ApiError;

/// The caller's user row, loaded from the tenant database
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub user: User,
    pub role: Role,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn can_publish(&self) -> bool {
        self.role.can_publish()
    }
}

fn check_user(auth_user: &AuthUser, user: Option<User>) -> Result<CurrentUser, ApiError> {
    let user = user.ok_or_else(|| {
        tracing::warn!("User {} not found in tenant '{}'", auth_user.user_id, auth_user.tenant);
        ApiError::unauthorized("User no longer exists")
    })?;

    // A role change invalidates older tokens
    if user.role != auth_user.access {
        tracing::warn!("Token role '{}' doesn't match stored role '{}' for {}", auth_user.access, user.role, user.id);
        return Err(ApiError::unauthorized("Token is out of date, please sign in again"));
    }

    let role = Role::parse(&user.role).ok_or_else(|| ApiError::forbidden("Unknown role"))?;
    Ok(CurrentUser { user, role })
}

/// Loads the user named by the JWT from the tenant database
pub async fn validate_user_middleware(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before user validation"))?;

    let TenantPool(pool) = request
        .extensions()
        .get::<TenantPool>()
        .cloned()
        .ok_or_else(|| ApiError::internal_server_error("Tenant pool required before user validation"))?;

    let current = check_user(&auth_user, service::find_user_by_id(&pool, auth_user.user_id).await?)?;

    tracing::debug!("User validation successful: {} ({})", current.user.email, current.user.role);
    request.extensions_mut().insert(current);

    Ok(next.run(request).await)
}

pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    match request.extensions().get::<CurrentUser>() {
        Some(current) if current.is_admin() => Ok(next.run(request).await),
        Some(_) => Err(ApiError::forbidden("Admin access required")),
        None => Err(ApiError::unauthorized("Authentication required")),
    }
}

pub async fn require_root(request: Request, next: Next) -> Result<Response, ApiError> {
    match request.extensions().get::<AuthUser>() {
        Some(auth_user) if auth_user.is_root() => Ok(next.run(request).await),
        Some(_) => Err(ApiError::forbidden("Root access required")),
        None => Err(ApiError::unauthorized("Authentication required")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use chrono::Utc;
    use uuid::Uuid;

    fn pair(token_role: &str, stored_role: &str) -> (AuthUser, User) {
        let id = Uuid::new_v4();
        let auth_user = AuthUser {
            user_id: id,
            tenant: "acme".to_string(),
            database: "tenant_0123456789abcdef".to_string(),
            access: token_role.to_string(),
            email: "a@example.com".to_string(),
        };
        let user = User {
            id,
            email: "a@example.com".to_string(),
            name: "A".to_string(),
            password_hash: String::new(),
            role: stored_role.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };
        (auth_user, user)
    }

    #[test]
    fn stale_role_is_rejected() {
        let (auth_user, user) = pair("reader", "admin");
        assert_eq!(check_user(&auth_user, Some(user)).unwrap_err().status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn matching_role_loads_user() {
        let (auth_user, user) = pair("author", "author");
        let current = check_user(&auth_user, Some(user)).unwrap();
        assert!(current.can_publish());
        assert!(!current.is_admin());
        assert!(check_user(&auth_user, None).is_err());
    }
}
