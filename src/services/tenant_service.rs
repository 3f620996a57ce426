use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::Tenant;
use crate::database::schema;

const TENANT_COLUMNS: &str =
    "id, name, display_name, database, is_active, created_at, updated_at, trashed_at, deleted_at";

#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Database manager error: {0}")]
    DatabaseManager(#[from] DatabaseError),
    #[error("Tenant already exists: {0}")]
    AlreadyExists(String),
    #[error("Tenant not found: {0}")]
    NotFound(String),
    #[error("Invalid tenant name: {0}")]
    InvalidName(String),
}

pub struct TenantService {
    main_pool: PgPool,
}

impl TenantService {
    pub async fn new() -> Result<Self, TenantError> {
        let main_pool = DatabaseManager::main_pool().await?;
        Ok(Self { main_pool })
    }

    /// Create the tenant database, apply the tenant schema and register it
    pub async fn create_tenant(&self, tenant_name: &str, display_name: Option<&str>) -> Result<Tenant, TenantError> {
        validate_tenant_name(tenant_name)?;
        let tenant_db = database_name_for(tenant_name);

        if self.get_tenant(tenant_name).await?.is_some() {
            return Err(TenantError::AlreadyExists(tenant_name.to_string()));
        }

        if !DatabaseManager::database_exists(&tenant_db).await? {
            DatabaseManager::create_database(&tenant_db).await?;
        }
        let tenant_pool = DatabaseManager::tenant_pool(&tenant_db).await?;
        schema::apply_tenant_schema(&tenant_pool).await?;

        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "INSERT INTO tenants (id, name, display_name, database) VALUES ($1, $2, $3, $4) RETURNING {}",
            TENANT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(tenant_name)
        .bind(display_name.unwrap_or(tenant_name))
        .bind(&tenant_db)
        .fetch_one(&self.main_pool)
        .await?;

        info!("Created tenant '{}' ({})", tenant.name, tenant.database);
        Ok(tenant)
    }

    pub async fn get_tenant(&self, tenant_name: &str) -> Result<Option<Tenant>, TenantError> {
        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {} FROM tenants WHERE name = $1 AND deleted_at IS NULL",
            TENANT_COLUMNS
        ))
        .bind(tenant_name)
        .fetch_optional(&self.main_pool)
        .await?;

        Ok(tenant)
    }

    pub async fn list_tenants(&self) -> Result<Vec<Tenant>, TenantError> {
        let tenants = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {} FROM tenants WHERE deleted_at IS NULL ORDER BY created_at DESC",
            TENANT_COLUMNS
        ))
        .fetch_all(&self.main_pool)
        .await?;

        Ok(tenants)
    }

    /// Re-apply the tenant schema to every registered tenant
    pub async fn migrate_all(&self) -> Result<usize, TenantError> {
        let tenants = self.list_tenants().await?;
        for tenant in &tenants {
            let pool = DatabaseManager::tenant_pool(&tenant.database).await?;
            schema::apply_tenant_schema(&pool).await?;
            info!("Migrated tenant '{}'", tenant.name);
        }
        Ok(tenants.len())
    }

    pub async fn get_tenant_pool(&self, tenant_name: &str) -> Result<PgPool, TenantError> {
        let tenant = self
            .get_tenant(tenant_name)
            .await?
            .ok_or_else(|| TenantError::NotFound(tenant_name.to_string()))?;

        Ok(DatabaseManager::tenant_pool(&tenant.database).await?)
    }
}

/// `tenant_` plus the first 16 hex chars of sha256(name)
pub fn database_name_for(name: &str) -> String {
    let hash = Sha256::digest(name.as_bytes());
    format!("tenant_{}", &hex::encode(hash)[..16])
}

pub fn validate_tenant_name(name: &str) -> Result<(), TenantError> {
    if name.len() < 2 {
        return Err(TenantError::InvalidName("Tenant name must be at least 2 characters".to_string()));
    }
    if name.len() > 100 {
        return Err(TenantError::InvalidName("Tenant name must be less than 100 characters".to_string()));
    }
    if !name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_') {
        return Err(TenantError::InvalidName(
            "Tenant name can only contain lowercase letters, numbers, hyphens, and underscores".to_string(),
        ));
    }
    Ok(())
}
