//! Switchyard
//!
//! Command line front end for the query workflow:
//! - `ask` routes one query and prints the result as JSON
//! - `personas` and `datasets` list what is available
//! - `ingest` indexes text files and reports what was stored

mod app;
mod cli;
mod telemetry;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command};
use switchyard_common::{config::AppConfig, metrics, VERSION};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;

    telemetry::init(&config.observability, cli.verbose)?;
    metrics::register_metrics();

    info!("Starting Switchyard v{}", VERSION);

    match cli.command {
        Command::Ask {
            query,
            persona,
            context,
            docs,
        } => {
            let app = app::App::build(&config).await?;
            app.ingest_files(&docs).await?;
            let result = app.ask(&query, &persona, context).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Personas => {
            println!("{}", serde_json::to_string_pretty(&app::personas())?);
        }
        Command::Datasets => {
            let app = app::App::build(&config).await?;
            println!("{}", serde_json::to_string_pretty(&app.datasets().await?)?);
        }
        Command::Ingest { files } => {
            let app = app::App::build(&config).await?;
            let summaries = app.ingest_files(&files).await?;
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
    }

    Ok(())
}
