//! yamlscope CLI - Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yamlscope::commands::{self, validate::ValidateArgs};

#[derive(Parser)]
#[command(name = "yamlscope")]
#[command(version)]
#[command(about = "Validate YAML documents against JSON schemas", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate YAML files and print their diagnostics
    Validate(ValidateArgs),

    /// Print a schema with every reference resolved
    Schema {
        /// Schema URI or path
        schema: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yamlscope=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let failed = match cli.command {
        Commands::Validate(args) => commands::validate::execute(args).await?,
        Commands::Schema { schema } => commands::schema::execute(&schema).await?,
    };

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
