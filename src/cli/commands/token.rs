use clap::Subcommand;
use serde_json::json;

use crate::auth::{self, Claims};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Issue a root token for /api/root endpoints")]
    Root {
        #[arg(long, default_value = "operator", help = "Recorded as the token email")]
        operator: String,
    },
}

pub async fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Root { operator } => {
            let claims = Claims::root(&operator);
            let token = auth::issue_token(&claims)?;
            match output_format {
                OutputFormat::Json => output_success(
                    output_format,
                    "Issued root token",
                    Some(json!({ "token": token, "expires_in": claims.expires_in() })),
                ),
                // Bare token so it can be captured by shell scripts
                OutputFormat::Text => {
                    println!("{}", token);
                    Ok(())
                }
            }
        }
    }
}
