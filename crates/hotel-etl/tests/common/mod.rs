//! Shared helpers for hotel-etl integration tests
//!
//! Each test starts its own PostgreSQL container through testcontainers, with
//! the workspace migrations applied. Docker must be running:
//!
//! ```bash
//! cargo test -p hotel-etl -- --ignored --nocapture
//! ```

#![allow(dead_code)]

use anyhow::{Context, Result};
use hotel_common::booking::BookingRecord;
use hotel_common::config::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::io::Write;
use tempfile::NamedTempFile;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;

/// Initialize tracing for tests
pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,hotel_etl=debug,sqlx=warn")),
        )
        .with_test_writer()
        .try_init();
}

/// PostgreSQL container with `public.hotel_bookings` created
pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
    config: DatabaseConfig,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let config = DatabaseConfig {
            host: host.to_string(),
            port,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            database: "postgres".to_string(),
            connect_timeout_secs: 30,
        };

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect_with(config.connect_options())
            .await
            .context("Failed to connect to test database")?;

        hotel_etl::db::MIGRATOR
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            _container: container,
            pool,
            config,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub async fn count(&self, table: &str) -> Result<i64> {
        let count = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// A full booking row; `children`, `agent` and `country` are left to the caller
pub fn booking_row(id: &str, children: &str, agent: &str, country: &str) -> String {
    format!(
        "{id},City Hotel,0,88,2015,July,1,0,4,2,{children},0,BB,{country},Online TA,TA/TO,0,0,0,A,A,0,No Deposit,{agent},0,Transient,76.5,0,1,Canceled,2015-07-01"
    )
}

pub fn bookings_header() -> String {
    BookingRecord::COLUMNS.join(",")
}

/// Writes a CSV file with the booking header followed by `rows`
pub fn write_bookings_csv(rows: &[String]) -> NamedTempFile {
    let mut lines = vec![bookings_header()];
    lines.extend_from_slice(rows);
    write_csv(&lines.join("\n"))
}

pub fn write_csv(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write temp file");
    file.write_all(b"\n").expect("Failed to write temp file");
    file
}
