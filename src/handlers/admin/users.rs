use axum::extract::{Path, Query};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::super::common::PageParams;
use crate::database::models::{Role, User};
use crate::database::{Page, Repository};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};

#[derive(Debug, Default, Deserialize)]
pub struct UserListParams {
    pub role: Option<String>,
    #[serde(flatten)]
    pub page: PageParams,
}

#[derive(Debug, Deserialize)]
pub struct RoleInput {
    pub role: String,
}

fn parse_role(value: &str) -> Result<Role, ApiError> {
    Role::parse(value).ok_or_else(|| {
        ApiError::validation_error(
            "Validation failed",
            Some([("role".to_string(), format!("Must be one of: {}", Role::ALL.join(", ")))].into()),
        )
    })
}

/// GET /api/admin/users
pub async fn list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<UserListParams>,
) -> ApiResult<Page<User>> {
    let (page, limit) = params.page.resolve()?;
    let where_clause = match params.role.as_deref().filter(|r| !r.is_empty()) {
        Some(role) => json!({ "role": parse_role(role)?.as_str() }),
        None => json!({}),
    };
    let filter = FilterData {
        where_clause: Some(where_clause),
        order: Some(json!("created_at desc")),
        ..Default::default()
    };
    let users = Repository::<User>::new("users", pool).paginate(filter, page, limit).await?;
    Ok(ApiResponse::success(users))
}

/// PATCH /api/admin/users/:id/role
pub async fn update_role(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<RoleInput>,
) -> ApiResult<User> {
    let role = parse_role(&input.role)?;
    if id == current.user.id {
        return Err(ApiError::bad_request("Admins cannot change their own role"));
    }

    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL RETURNING *",
    )
    .bind(id)
    .bind(role.as_str())
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| ApiError::not_found("User not found"))?;

    tracing::info!("User {} role set to {} by {}", user.id, user.role, current.user.id);
    Ok(ApiResponse::success(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_roles_are_validation_errors() {
        assert_eq!(parse_role("author").unwrap(), Role::Author);
        let err = parse_role("owner").unwrap_err();
        assert_eq!(err.to_json()["code"], "VALIDATION_ERROR");
    }
}
