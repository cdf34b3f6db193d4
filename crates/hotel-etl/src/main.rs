//! hotel-etl - run the bookings pipeline or one of its steps

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hotel_common::config::{
    csv_path_from_lookup, env_lookup, load_env_file, AppConfig, DatabaseConfig, RetryConfig,
    TransformConfig,
};
use hotel_common::logging::{init_logging, LogConfig, LogLevel};
use hotel_etl::db;
use hotel_etl::pipeline::{
    etl_definition, etl_pipeline, DbtStep, ExtractStep, Pipeline, PipelineStep, RunReport, DAG_ID,
};
use hotel_etl::transform::{Stage, TransformTrigger};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "hotel-etl")]
#[command(author, version, about = "Hotel bookings extract-load-transform pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// `.env` file with database credentials (defaults: .env, hotel_dwh/.env)
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Bookings CSV file (overrides CSV_FILE_PATH)
    #[arg(long, global = true)]
    csv: Option<PathBuf>,

    /// Retries per step (overrides PIPELINE_RETRIES)
    #[arg(long, global = true)]
    retries: Option<u32>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Run extract, load and transform in order
    Run,
    /// Append the bookings CSV to public.hotel_bookings
    Extract,
    /// Run the dbt load stage
    Load,
    /// Run the dbt transform stage
    Transform,
    /// Print the pipeline definition as JSON
    Describe,
    /// Create the bookings table if it does not exist
    Migrate,
}

fn retry_config(cli: &Cli) -> Result<RetryConfig> {
    let mut retry = RetryConfig::from_lookup(env_lookup)?;
    if let Some(retries) = cli.retries {
        retry.retries = retries;
    }
    Ok(retry)
}

fn csv_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.csv {
        Some(path) => Ok(path.clone()),
        None => Ok(csv_path_from_lookup(env_lookup, false)?),
    }
}

fn dbt_step(stage: Stage) -> Result<DbtStep> {
    let trigger = TransformTrigger::new(TransformConfig::from_env()?);
    Ok(DbtStep::new(Arc::new(trigger), stage))
}

fn report_outcome(report: &RunReport) -> Result<()> {
    for step in &report.steps {
        info!(
            step = %step.name,
            state = step.state.as_str(),
            attempts = step.attempts,
            summary = step.summary.as_deref().unwrap_or(""),
            "Step result"
        );
    }

    if let Some(failed) = report.failed_step() {
        anyhow::bail!(
            "Pipeline run {} failed at {} after {} attempt(s): {}",
            report.run_id,
            failed.name,
            failed.attempts,
            failed.error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(())
}

async fn run_single(cli: &Cli, step: impl PipelineStep + 'static) -> Result<()> {
    let report = Pipeline::new(DAG_ID, retry_config(cli)?).then(step).run().await;
    report_outcome(&report)
}

async fn execute(cli: &Cli) -> Result<()> {
    match cli.command {
        Command::Run => {
            let mut config = AppConfig::from_env()?;
            config.retry = retry_config(cli)?;
            config.csv_path = csv_path(cli)?;
            let report = etl_pipeline(&config).run().await;
            report_outcome(&report)
        },
        Command::Extract => {
            let step = ExtractStep::new(DatabaseConfig::from_env()?, csv_path(cli)?);
            run_single(cli, step).await
        },
        Command::Load => run_single(cli, dbt_step(Stage::Load)?).await,
        Command::Transform => run_single(cli, dbt_step(Stage::Transform)?).await,
        Command::Describe => {
            let definition = etl_definition(retry_config(cli)?);
            println!("{}", serde_json::to_string_pretty(&definition)?);
            Ok(())
        },
        Command::Migrate => {
            let config = DatabaseConfig::from_env()?;
            let mut conn = db::connect(&config).await?;
            db::run_migrations(&mut conn).await?;
            Ok(())
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // .env first, so LOG_* and DB_* from the file apply below
    let env_file = load_env_file(cli.env_file.as_deref()).context("Failed to load .env file")?;

    let base = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        })
        .log_file_prefix("hotel-etl")
        .build();
    let _log_guard = init_logging(&LogConfig::from_env_with(base)?)?;

    if let Some(path) = env_file {
        info!(path = %path.display(), "Loaded environment file");
    }

    if let Err(e) = execute(&cli).await {
        error!(error = %format!("{:#}", e), "hotel-etl failed");
        return Err(e);
    }

    Ok(())
}
