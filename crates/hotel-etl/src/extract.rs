//! Record loader
//!
//! Reads the bookings CSV and appends it to `public.hotel_bookings`. Rows whose
//! `booking_id` already exists are skipped by `ON CONFLICT DO NOTHING`, so a
//! re-run of the same file inserts nothing new. All statements run inside one
//! transaction on one connection: the load either commits fully or not at all.

use crate::db::{self, quote_ident, quote_qualified, rows_per_statement};
use hotel_common::booking::{read_bookings, BookingRecord};
use hotel_common::config::DatabaseConfig;
use hotel_common::Result;
use serde::Serialize;
use sqlx::{Connection, PgConnection, Postgres, QueryBuilder};
use std::path::Path;
use tracing::{info, instrument};

/// Default target for the record loader
pub const DEFAULT_TARGET_TABLE: &str = "public.hotel_bookings";

/// Outcome of one load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtractSummary {
    pub rows_read: u64,
    pub rows_inserted: u64,
    /// Rows dropped because their `booking_id` was already present
    pub rows_skipped: u64,
}

impl std::fmt::Display for ExtractSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Extracted {} records ({} inserted, {} skipped as duplicates)",
            self.rows_read, self.rows_inserted, self.rows_skipped
        )
    }
}

fn insert_prefix(table: &str) -> String {
    let columns = BookingRecord::COLUMNS
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {} ({}) ", quote_qualified(table), columns)
}

/// Inserts bookings in file order inside one transaction, returning the
/// number of rows actually written
pub async fn insert_bookings(
    conn: &mut PgConnection,
    table: &str,
    bookings: &[BookingRecord],
) -> Result<u64> {
    if bookings.is_empty() {
        return Ok(0);
    }

    let prefix = insert_prefix(table);
    let conflict = format!(
        " ON CONFLICT ({}) DO NOTHING",
        quote_ident(BookingRecord::ID_COLUMN)
    );

    let mut tx = conn.begin().await?;
    let mut inserted = 0u64;

    for chunk in bookings.chunks(rows_per_statement(BookingRecord::COLUMNS.len())) {
        let mut query = QueryBuilder::<Postgres>::new(prefix.as_str());
        query.push_values(chunk, |mut row, b| {
            row.push_bind(b.booking_id)
                .push_bind(b.hotel.as_deref())
                .push_bind(b.is_canceled)
                .push_bind(b.lead_time)
                .push_bind(b.arrival_date_year)
                .push_bind(b.arrival_date_month.as_deref())
                .push_bind(b.arrival_date_day_of_month)
                .push_bind(b.stays_in_weekend_nights)
                .push_bind(b.stays_in_week_nights)
                .push_bind(b.adults)
                .push_bind(b.children)
                .push_bind(b.babies)
                .push_bind(b.meal.as_deref())
                .push_bind(b.country.as_deref())
                .push_bind(b.market_segment.as_deref())
                .push_bind(b.distribution_channel.as_deref())
                .push_bind(b.is_repeated_guest)
                .push_bind(b.previous_cancellations)
                .push_bind(b.previous_bookings_not_canceled)
                .push_bind(b.reserved_room_type.as_deref())
                .push_bind(b.assigned_room_type.as_deref())
                .push_bind(b.booking_changes)
                .push_bind(b.deposit_type.as_deref())
                .push_bind(b.agent)
                .push_bind(b.days_in_waiting_list)
                .push_bind(b.customer_type.as_deref())
                .push_bind(b.adr)
                .push_bind(b.required_car_parking_spaces)
                .push_bind(b.total_of_special_requests)
                .push_bind(b.reservation_status.as_deref())
                .push_bind(b.reservation_status_date);
        });
        query.push(conflict.as_str());

        let result = query.build().execute(&mut *tx).await?;
        inserted += result.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

/// Reads `csv_path` and appends its bookings to `table`
///
/// The file is parsed before any connection is opened, so a malformed file
/// never touches the database.
#[instrument(skip(config), fields(csv = %csv_path.display()))]
pub async fn load_bookings(
    config: &DatabaseConfig,
    csv_path: &Path,
    table: &str,
) -> Result<ExtractSummary> {
    info!("Extracting bookings");

    let bookings = read_bookings(csv_path)?;
    let rows_read = bookings.len() as u64;

    let mut conn = db::connect(config).await?;
    let rows_inserted = insert_bookings(&mut conn, table, &bookings).await?;
    conn.close().await?;

    let summary = ExtractSummary {
        rows_read,
        rows_inserted,
        rows_skipped: rows_read - rows_inserted,
    };

    info!(
        rows_read = summary.rows_read,
        rows_inserted = summary.rows_inserted,
        rows_skipped = summary.rows_skipped,
        "Extracted bookings into {}",
        table
    );

    Ok(summary)
}
