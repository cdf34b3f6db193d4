//! Database connection helpers

use hotel_common::config::DatabaseConfig;
use hotel_common::{EtlError, Result};
use sqlx::migrate::Migrator;
use sqlx::{ConnectOptions, PgConnection};
use tracing::{debug, info};

/// Schema migrations for the booking tables
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// PostgreSQL limit on bind parameters in a single statement
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Upper bound on rows per multi-row `INSERT`
pub const MAX_ROWS_PER_STATEMENT: usize = 1_000;

/// Rows per `INSERT` for a table with `columns` columns
pub fn rows_per_statement(columns: usize) -> usize {
    (MAX_BIND_PARAMS / columns.max(1)).clamp(1, MAX_ROWS_PER_STATEMENT)
}

/// Opens a single connection, bounded by the configured connect timeout
pub async fn connect(config: &DatabaseConfig) -> Result<PgConnection> {
    debug!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        user = %config.user,
        "Connecting to PostgreSQL"
    );

    let options = config.connect_options();
    let conn = tokio::time::timeout(config.connect_timeout(), options.connect())
        .await
        .map_err(|_| {
            EtlError::Database(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!(
                    "connecting to {}:{} timed out after {}s",
                    config.host, config.port, config.connect_timeout_secs
                ),
            )))
        })??;

    Ok(conn)
}

/// Applies pending migrations, creating `public.hotel_bookings` if needed
pub async fn run_migrations(conn: &mut PgConnection) -> Result<()> {
    MIGRATOR
        .run(conn)
        .await
        .map_err(|e| EtlError::Database(sqlx::Error::Migrate(Box::new(e))))?;

    info!("Migrations applied");
    Ok(())
}

/// Double-quotes a SQL identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quotes a possibly schema-qualified name such as `public.hotel_bookings`
pub fn quote_qualified(name: &str) -> String {
    name.split('.').map(quote_ident).collect::<Vec<_>>().join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("adr"), "\"adr\"");
        assert_eq!(quote_ident("Unnamed: 0"), "\"Unnamed: 0\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_quote_qualified() {
        assert_eq!(quote_qualified("public.hotel_bookings"), "\"public\".\"hotel_bookings\"");
        assert_eq!(quote_qualified("raw_hotel_bookings"), "\"raw_hotel_bookings\"");
    }

    #[test]
    fn test_rows_per_statement() {
        assert_eq!(rows_per_statement(31), MAX_ROWS_PER_STATEMENT);
        assert_eq!(rows_per_statement(100), 655);
        assert_eq!(rows_per_statement(0), MAX_ROWS_PER_STATEMENT);
        assert!(rows_per_statement(100_000) >= 1);
    }
}
