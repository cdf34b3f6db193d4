//! load-to-postgres - replace the raw staging table with a CSV file
//!
//! Runs outside the pipeline. Requires `DB_HOST`, `DB_USER`, `DB_PASS`,
//! `DB_NAME` and either `--csv` or `CSV_FILE_PATH`.

use anyhow::{Context, Result};
use clap::Parser;
use hotel_common::config::{csv_path_from_lookup, env_lookup, load_env_file, DatabaseConfig};
use hotel_common::logging::{init_logging, LogConfig, LogLevel};
use hotel_etl::raw_load::{replace_table, DEFAULT_RAW_TABLE};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "load-to-postgres")]
#[command(author, version, about = "Replace the raw hotel bookings table with a CSV file")]
struct Cli {
    /// CSV file to load (overrides CSV_FILE_PATH)
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Target table, dropped and recreated on every run
    #[arg(long, default_value = DEFAULT_RAW_TABLE)]
    table: String,

    /// `.env` file with database credentials (defaults: .env, hotel_dwh/.env)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

async fn execute(cli: &Cli) -> Result<()> {
    // Both settings are resolved before any connection is attempted.
    let database = DatabaseConfig::from_env()?;
    let csv_path = match &cli.csv {
        Some(path) => path.clone(),
        None => csv_path_from_lookup(env_lookup, true)?,
    };

    let summary = replace_table(&database, &csv_path, &cli.table).await?;
    info!(
        table = %summary.table,
        rows = summary.rows,
        columns = summary.columns,
        "Data successfully loaded into PostgreSQL table: {}",
        summary.table
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    load_env_file(cli.env_file.as_deref()).context("Failed to load .env file")?;

    let base = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        })
        .log_file_prefix("load-to-postgres")
        .build();
    let _log_guard = init_logging(&LogConfig::from_env_with(base)?)?;

    if let Err(e) = execute(&cli).await {
        error!(error = %format!("{:#}", e), "load-to-postgres failed");
        return Err(e);
    }

    Ok(())
}
