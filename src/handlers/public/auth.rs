//! Token acquisition: register, login and refresh.

use axum::{extract::Path, extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::auth::{self, Claims};
use crate::config;
use crate::database::models::{Role, User};
use crate::database::service;
use crate::email::templates;
use crate::error::ApiError;
use crate::middleware::tenant::{resolve_tenant_by_name, ValidatedTenant};
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::validation::{is_valid_email, normalize_email, ValidationErrors};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;
pub const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    pub expires_in: i64,
}

impl RegisterRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if !is_valid_email(&self.email) {
            errors.add("email", "A valid email address is required");
        }
        errors.require_text("name", &self.name, MAX_NAME_LEN);
        let len = self.password.chars().count();
        if len < MIN_PASSWORD_LEN {
            errors.add("password", format!("Password must be at least {} characters", MIN_PASSWORD_LEN));
        } else if len > MAX_PASSWORD_LEN {
            errors.add("password", format!("Password must be at most {} characters", MAX_PASSWORD_LEN));
        }
        errors.finish()
    }
}

fn token_for(tenant: &ValidatedTenant, user: User) -> Result<TokenResponse, ApiError> {
    let claims = Claims::new(
        user.id,
        tenant.name.clone(),
        tenant.database.clone(),
        user.role.clone(),
        user.email.clone(),
    );
    Ok(TokenResponse {
        token: auth::issue_token(&claims)?,
        expires_in: claims.expires_in(),
        user: Some(user),
    })
}

/// POST /auth/register/:tenant
pub async fn register(
    State(state): State<AppState>,
    Path(tenant_name): Path<String>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<TokenResponse> {
    payload.validate()?;
    let (tenant, pool) = resolve_tenant_by_name(&tenant_name).await?;

    let email = normalize_email(&payload.email);
    if service::find_user_by_email(&pool, &email).await?.is_some() {
        return Err(ApiError::conflict("An account with this email already exists"));
    }

    let password_hash = auth::hash_password(&payload.password)?;
    let user = service::insert_user(&pool, &email, payload.name.trim(), &password_hash, Role::Reader.as_str()).await?;
    tracing::info!("Registered user {} in tenant '{}'", user.id, tenant.name);

    state.send_email(templates::welcome(&config::config().site.name, &user.email, &user.name));

    Ok(ApiResponse::created(token_for(&tenant, user)?))
}

/// POST /auth/login/:tenant
pub async fn login(Path(tenant_name): Path<String>, Json(payload): Json<LoginRequest>) -> ApiResult<TokenResponse> {
    let (tenant, pool) = resolve_tenant_by_name(&tenant_name).await?;

    let email = normalize_email(&payload.email);
    let user = service::find_user_by_email(&pool, &email).await?;

    auth::verify_login(&payload.password, user.as_ref().map(|u| u.password_hash.as_str())).map_err(|e| match e {
        auth::AuthError::InvalidCredentials => {
            tracing::info!("Failed login for {} in tenant '{}'", email, tenant.name);
            ApiError::unauthorized("Invalid email or password")
        }
        other => other.into(),
    })?;
    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    Ok(ApiResponse::success(token_for(&tenant, user)?))
}

/// POST /auth/refresh
pub async fn refresh(Json(payload): Json<RefreshRequest>) -> ApiResult<TokenResponse> {
    let (token, claims) = auth::refresh_token(&payload.token)?;
    Ok(ApiResponse::success(TokenResponse {
        token,
        user: None,
        expires_in: claims.expires_in(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, name: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            name: name.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn registration_validation() {
        assert!(request("reader@example.com", "Reader", "correct horse").validate().is_ok());

        let errors = request("not-an-email", " ", "short").validate().unwrap_err();
        assert!(errors.get("email").is_some());
        assert!(errors.get("name").is_some());
        assert!(errors.get("password").is_some());
    }
}
