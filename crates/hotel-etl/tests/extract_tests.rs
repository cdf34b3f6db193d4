//! Record loader integration tests
//!
//! Require Docker:
//!
//! ```bash
//! cargo test -p hotel-etl --test extract_tests -- --ignored --nocapture
//! ```

mod common;

use anyhow::Result;
use common::{booking_row, init_test_tracing, write_bookings_csv, TestPostgres};
use hotel_etl::extract::{load_bookings, DEFAULT_TARGET_TABLE};
use serial_test::serial;

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_duplicate_ids_keep_first_seen_row() -> Result<()> {
    init_test_tracing();
    let pg = TestPostgres::start().await?;

    let csv = write_bookings_csv(&[
        booking_row("1", "0", "9", "PRT"),
        booking_row("2", "1", "9", "GBR"),
        booking_row("1", "2", "240", "ESP"),
    ]);

    let summary = load_bookings(pg.config(), csv.path(), DEFAULT_TARGET_TABLE).await?;
    assert_eq!(summary.rows_read, 3);
    assert_eq!(summary.rows_inserted, 2);
    assert_eq!(summary.rows_skipped, 1);
    assert_eq!(pg.count("public.hotel_bookings").await?, 2);

    let (country, children, agent): (Option<String>, Option<i32>, Option<i32>) = sqlx::query_as(
        "SELECT country, children, agent FROM public.hotel_bookings WHERE booking_id = 1",
    )
    .fetch_one(pg.pool())
    .await?;
    assert_eq!(country.as_deref(), Some("PRT"));
    assert_eq!(children, Some(0));
    assert_eq!(agent, Some(9));

    Ok(())
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_second_load_is_idempotent() -> Result<()> {
    init_test_tracing();
    let pg = TestPostgres::start().await?;

    let csv = write_bookings_csv(&[
        booking_row("10", "0", "9", "PRT"),
        booking_row("11", "0", "9", "PRT"),
        booking_row("12", "0", "9", "PRT"),
    ]);

    let first = load_bookings(pg.config(), csv.path(), DEFAULT_TARGET_TABLE).await?;
    let after_first = pg.count("public.hotel_bookings").await?;

    let second = load_bookings(pg.config(), csv.path(), DEFAULT_TARGET_TABLE).await?;
    let after_second = pg.count("public.hotel_bookings").await?;

    assert_eq!(first.rows_inserted, 3);
    assert_eq!(second.rows_inserted, 0);
    assert_eq!(second.rows_skipped, 3);
    assert_eq!(after_first, after_second);

    Ok(())
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_header_only_file_leaves_table_unchanged() -> Result<()> {
    init_test_tracing();
    let pg = TestPostgres::start().await?;

    let seed = write_bookings_csv(&[booking_row("15", "0", "9", "PRT")]);
    load_bookings(pg.config(), seed.path(), DEFAULT_TARGET_TABLE).await?;

    let empty = write_bookings_csv(&[]);
    let summary = load_bookings(pg.config(), empty.path(), DEFAULT_TARGET_TABLE).await?;

    assert_eq!(summary.rows_read, 0);
    assert_eq!(summary.rows_inserted, 0);
    assert_eq!(summary.rows_skipped, 0);
    assert_eq!(pg.count("public.hotel_bookings").await?, 1);

    Ok(())
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_missing_values_are_stored_as_null() -> Result<()> {
    init_test_tracing();
    let pg = TestPostgres::start().await?;

    let csv = write_bookings_csv(&[booking_row("20", "NA", "NULL", "")]);
    load_bookings(pg.config(), csv.path(), DEFAULT_TARGET_TABLE).await?;

    let nulls: (bool, bool, bool) = sqlx::query_as(
        "SELECT children IS NULL, agent IS NULL, country IS NULL \
         FROM public.hotel_bookings WHERE booking_id = 20",
    )
    .fetch_one(pg.pool())
    .await?;
    assert_eq!(nulls, (true, true, true));

    let placeholders: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM public.hotel_bookings WHERE country IN ('', 'NA', 'NULL', 'NaN')",
    )
    .fetch_one(pg.pool())
    .await?;
    assert_eq!(placeholders, 0);

    Ok(())
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_malformed_file_writes_nothing() -> Result<()> {
    init_test_tracing();
    let pg = TestPostgres::start().await?;

    let csv = write_bookings_csv(&[
        booking_row("30", "0", "9", "PRT"),
        booking_row("31", "lots", "9", "PRT"),
    ]);

    let err = load_bookings(pg.config(), csv.path(), DEFAULT_TARGET_TABLE)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), hotel_common::ErrorKind::Io);
    assert_eq!(pg.count("public.hotel_bookings").await?, 0);

    Ok(())
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_large_file_spans_several_statements() -> Result<()> {
    init_test_tracing();
    let pg = TestPostgres::start().await?;

    let rows: Vec<String> = (0..2_500)
        .map(|i| booking_row(&i.to_string(), "0", "9", "PRT"))
        .collect();
    let csv = write_bookings_csv(&rows);

    let summary = load_bookings(pg.config(), csv.path(), DEFAULT_TARGET_TABLE).await?;
    assert_eq!(summary.rows_inserted, 2_500);
    assert_eq!(pg.count("public.hotel_bookings").await?, 2_500);

    Ok(())
}
