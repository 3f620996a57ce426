use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::tenant::Tenant;
use crate::database::models::user::User;

const TENANT_COLUMNS: &str =
    "id, name, display_name, database, is_active, created_at, updated_at, trashed_at, deleted_at";

const USER_COLUMNS: &str = "id, email, name, password_hash, role, created_at, updated_at, deleted_at";

/// Look up a tenant in the system database by name
pub async fn find_tenant_by_name(tenant_name: &str) -> Result<Option<Tenant>, DatabaseError> {
    let pool = DatabaseManager::main_pool().await?;

    let tenant = sqlx::query_as::<_, Tenant>(&format!("SELECT {} FROM tenants WHERE name = $1", TENANT_COLUMNS))
        .bind(tenant_name)
        .fetch_optional(&pool)
        .await?;

    Ok(tenant)
}

/// Look up a tenant by its database name (JWT `database` claim)
pub async fn find_tenant_by_database(database: &str) -> Result<Option<Tenant>, DatabaseError> {
    let pool = DatabaseManager::main_pool().await?;

    let tenant = sqlx::query_as::<_, Tenant>(&format!("SELECT {} FROM tenants WHERE database = $1", TENANT_COLUMNS))
        .bind(database)
        .fetch_optional(&pool)
        .await?;

    Ok(tenant)
}

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, DatabaseError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE email = $1 AND deleted_at IS NULL",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn find_user_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, DatabaseError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE id = $1 AND deleted_at IS NULL",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn insert_user(
    pool: &PgPool,
    email: &str,
    name: &str,
    password_hash: &str,
    role: &str,
) -> Result<User, DatabaseError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (id, email, name, password_hash, role) VALUES ($1, $2, $3, $4, $5) RETURNING {}",
        USER_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(name)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    Ok(user)
}
