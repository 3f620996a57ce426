use anyhow::bail;
use clap::Subcommand;

use crate::auth;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::database::models::Role;
use crate::database::service;
use crate::services::TenantService;
use crate::validation::{is_valid_email, normalize_email};

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Create a user inside a tenant")]
    Create {
        #[arg(help = "Tenant name")]
        tenant: String,

        #[arg(help = "Email address")]
        email: String,

        #[arg(long, help = "Display name")]
        name: String,

        #[arg(long, default_value = "reader", help = "reader, author or admin")]
        role: String,

        #[arg(long, help = "Password (min 8 characters)")]
        password: String,
    },
}

pub async fn handle(cmd: UserCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        UserCommands::Create { tenant, email, name, role, password } => {
            let role = match Role::parse(&role) {
                Some(role) => role,
                None => bail!("Unknown role '{}', expected one of: {}", role, Role::ALL.join(", ")),
            };
            if !is_valid_email(&email) {
                bail!("'{}' is not a valid email address", email);
            }
            if password.chars().count() < 8 {
                bail!("Password must be at least 8 characters");
            }

            let pool = TenantService::new().await?.get_tenant_pool(&tenant).await?;
            let email = normalize_email(&email);
            if service::find_user_by_email(&pool, &email).await?.is_some() {
                bail!("A user with email {} already exists in '{}'", email, tenant);
            }

            let password_hash = auth::hash_password(&password)?;
            let user = service::insert_user(&pool, &email, name.trim(), &password_hash, role.as_str()).await?;

            output_success(
                output_format,
                &format!("Created {} {} in tenant '{}'", user.role, user.email, tenant),
                Some(serde_json::to_value(&user)?),
            )
        }
    }
}
