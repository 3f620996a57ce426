use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::database::{schema, DatabaseManager};

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = DatabaseManager::main_pool().await?;
    schema::apply_system_schema(&pool).await?;
    output_success(
        output_format,
        &format!("System database '{}' is ready", DatabaseManager::SYSTEM_DB_NAME),
        None,
    )
}
