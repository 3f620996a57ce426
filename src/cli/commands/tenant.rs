use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::services::TenantService;

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "List all tenants")]
    List,

    #[command(about = "Provision a tenant database and register it")]
    Create {
        #[arg(help = "Tenant name (lowercase letters, digits, hyphens)")]
        name: String,

        #[arg(long, help = "Human readable name")]
        display_name: Option<String>,
    },

    #[command(about = "Apply the tenant schema to every active tenant")]
    Migrate,
}

pub async fn handle(cmd: TenantCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let service = TenantService::new().await?;

    match cmd {
        TenantCommands::List => {
            let tenants = service.list_tenants().await?;
            if tenants.is_empty() {
                return output_empty_collection(output_format, "tenants", "No tenants registered");
            }

            match output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&json!({ "tenants": tenants }))?);
                }
                OutputFormat::Text => {
                    println!("{:<20} {:<28} {:<26} {:<8} {}", "NAME", "DISPLAY NAME", "DATABASE", "ACTIVE", "CREATED");
                    println!("{}", "-".repeat(100));
                    for tenant in &tenants {
                        println!(
                            "{:<20} {:<28} {:<26} {:<8} {}",
                            truncate(&tenant.name, 20),
                            truncate(&tenant.display_name, 28),
                            tenant.database,
                            if tenant.is_active { "yes" } else { "no" },
                            tenant.created_at.format("%Y-%m-%d %H:%M")
                        );
                    }
                }
            }
            Ok(())
        }
        TenantCommands::Create { name, display_name } => {
            let tenant = service.create_tenant(name.trim(), display_name.as_deref()).await?;
            output_success(
                output_format,
                &format!("Created tenant '{}' ({})", tenant.name, tenant.database),
                Some(serde_json::to_value(&tenant)?),
            )
        }
        TenantCommands::Migrate => {
            let count = service.migrate_all().await?;
            output_success(
                output_format,
                &format!("Migrated {} tenant database(s)", count),
                Some(json!({ "migrated": count })),
            )
        }
    }
}
