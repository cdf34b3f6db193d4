//! End-to-end pipeline tests: real PostgreSQL, fake dbt script
//!
//! Require Docker and a Unix shell:
//!
//! ```bash
//! cargo test -p hotel-etl --test pipeline_tests -- --ignored --nocapture
//! ```

#![cfg(unix)]

mod common;

use anyhow::Result;
use common::{booking_row, init_test_tracing, write_bookings_csv, TestPostgres};
use hotel_common::config::{AppConfig, RetryConfig, TransformConfig};
use hotel_etl::pipeline::{etl_pipeline, StepState};
use serial_test::serial;
use std::path::Path;
use std::time::Duration;

/// Fake dbt that records each selector it is called with in `calls.log`
/// (inside its working directory) and exits with `status_for_staging` when
/// asked to build staging.
fn fake_dbt(project_dir: &Path, status_for_staging: i32) -> String {
    let script = project_dir.join("fake_dbt.sh");
    let body = format!(
        "echo \"$3\" >> calls.log\nif [ \"$3\" = staging ]; then exit {}; fi\nexit 0\n",
        status_for_staging
    );
    std::fs::write(&script, body).expect("Failed to write fake dbt");
    format!("sh {}", script.display())
}

fn calls(project_dir: &Path) -> Vec<String> {
    std::fs::read_to_string(project_dir.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

fn app_config(pg: &TestPostgres, csv: &Path, project_dir: &Path, program: String) -> AppConfig {
    AppConfig {
        database: pg.config().clone(),
        csv_path: csv.to_path_buf(),
        transform: TransformConfig {
            program,
            project_dir: project_dir.to_path_buf(),
            load_select: Some("staging".to_string()),
            transform_select: Some("marts".to_string()),
        },
        retry: RetryConfig {
            retries: 1,
            delay: Duration::ZERO,
        },
    }
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_full_run_succeeds() -> Result<()> {
    init_test_tracing();
    let pg = TestPostgres::start().await?;
    let project = tempfile::tempdir()?;
    let csv = write_bookings_csv(&[
        booking_row("1", "0", "9", "PRT"),
        booking_row("2", "0", "9", "PRT"),
        booking_row("1", "0", "9", "ESP"),
    ]);

    let program = fake_dbt(project.path(), 0);
    let config = app_config(&pg, csv.path(), project.path(), program);
    let report = etl_pipeline(&config).run().await;

    assert!(report.succeeded(), "report: {:?}", report);
    assert_eq!(pg.count("public.hotel_bookings").await?, 2);
    assert_eq!(calls(project.path()), vec!["staging", "marts"]);
    assert_eq!(
        report.step("extract_task").unwrap().summary.as_deref(),
        Some("Extracted 3 records (2 inserted, 1 skipped as duplicates)")
    );

    Ok(())
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_failed_load_stage_halts_transform() -> Result<()> {
    init_test_tracing();
    let pg = TestPostgres::start().await?;
    let project = tempfile::tempdir()?;
    let csv = write_bookings_csv(&[booking_row("1", "0", "9", "PRT")]);

    let program = fake_dbt(project.path(), 2);
    let config = app_config(&pg, csv.path(), project.path(), program);
    let report = etl_pipeline(&config).run().await;

    assert!(!report.succeeded());
    assert_eq!(report.step("extract_task").unwrap().state, StepState::Succeeded);

    let load = report.step("load_task").unwrap();
    assert_eq!(load.state, StepState::Failed);
    assert_eq!(load.attempts, 2);
    assert!(load.error.as_deref().unwrap().contains("exit code 2"));

    assert_eq!(report.step("transform_task").unwrap().state, StepState::Pending);
    // Two attempts at staging, never marts.
    assert_eq!(calls(project.path()), vec!["staging", "staging"]);

    // Extract already committed; the halted run does not undo it.
    assert_eq!(pg.count("public.hotel_bookings").await?, 1);

    Ok(())
}
