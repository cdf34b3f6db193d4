//! Booking record model and CSV reading
//!
//! A booking row carries one reservation. Any cell holding a missing-value
//! marker (see [`MISSING_MARKERS`]) becomes `None`, which the loaders bind as
//! SQL `NULL`.

use crate::error::{EtlError, Result};
use chrono::NaiveDate;
use csv::StringRecord;
use std::collections::HashMap;
use std::path::Path;

/// Cell values treated as missing, in addition to the empty string
///
/// Same set pandas uses for its default `na_values`.
pub const MISSING_MARKERS: &[&str] = &[
    "NA", "N/A", "n/a", "NULL", "null", "NaN", "nan", "-NaN", "-nan", "None", "#N/A", "#N/A N/A",
    "#NA", "<NA>", "-1.#IND", "-1.#QNAN", "1.#IND", "1.#QNAN",
];

/// Returns the trimmed cell, or `None` when it holds a missing value
pub fn normalize_cell(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || MISSING_MARKERS.contains(&trimmed) {
        None
    } else {
        Some(trimmed)
    }
}

/// Parses an integer cell, accepting float notation without a fraction (`2.0`)
pub fn parse_integer(value: &str) -> Option<i64> {
    if let Ok(n) = value.parse::<i64>() {
        return Some(n);
    }
    let f = value.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Parses `YYYY-MM-DD` or `M/D/YYYY`
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%m/%d/%Y"))
        .ok()
}

/// One reservation row of `public.hotel_bookings`
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRecord {
    pub booking_id: i64,
    pub hotel: Option<String>,
    pub is_canceled: Option<i32>,
    pub lead_time: Option<i32>,
    pub arrival_date_year: Option<i32>,
    pub arrival_date_month: Option<String>,
    pub arrival_date_day_of_month: Option<i32>,
    pub stays_in_weekend_nights: Option<i32>,
    pub stays_in_week_nights: Option<i32>,
    pub adults: Option<i32>,
    pub children: Option<i32>,
    pub babies: Option<i32>,
    pub meal: Option<String>,
    pub country: Option<String>,
    pub market_segment: Option<String>,
    pub distribution_channel: Option<String>,
    pub is_repeated_guest: Option<i32>,
    pub previous_cancellations: Option<i32>,
    pub previous_bookings_not_canceled: Option<i32>,
    pub reserved_room_type: Option<String>,
    pub assigned_room_type: Option<String>,
    pub booking_changes: Option<i32>,
    pub deposit_type: Option<String>,
    pub agent: Option<i32>,
    pub days_in_waiting_list: Option<i32>,
    pub customer_type: Option<String>,
    pub adr: Option<f64>,
    pub required_car_parking_spaces: Option<i32>,
    pub total_of_special_requests: Option<i32>,
    pub reservation_status: Option<String>,
    pub reservation_status_date: Option<NaiveDate>,
}

impl BookingRecord {
    /// Column names in insert order
    pub const COLUMNS: [&'static str; 31] = [
        "booking_id",
        "hotel",
        "is_canceled",
        "lead_time",
        "arrival_date_year",
        "arrival_date_month",
        "arrival_date_day_of_month",
        "stays_in_weekend_nights",
        "stays_in_week_nights",
        "adults",
        "children",
        "babies",
        "meal",
        "country",
        "market_segment",
        "distribution_channel",
        "is_repeated_guest",
        "previous_cancellations",
        "previous_bookings_not_canceled",
        "reserved_room_type",
        "assigned_room_type",
        "booking_changes",
        "deposit_type",
        "agent",
        "days_in_waiting_list",
        "customer_type",
        "adr",
        "required_car_parking_spaces",
        "total_of_special_requests",
        "reservation_status",
        "reservation_status_date",
    ];

    /// Name of the uniqueness-constrained column
    pub const ID_COLUMN: &'static str = "booking_id";
}

/// Maps a CSV header onto booking columns and converts rows
struct RowReader<'a> {
    path: &'a Path,
    index: HashMap<&'static str, usize>,
}

impl<'a> RowReader<'a> {
    fn new(path: &'a Path, headers: &StringRecord) -> Result<Self> {
        let positions: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim(), i))
            .collect();

        let mut index = HashMap::with_capacity(BookingRecord::COLUMNS.len());
        for column in BookingRecord::COLUMNS {
            let position = positions.get(column).ok_or_else(|| EtlError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            })?;
            index.insert(column, *position);
        }

        Ok(Self { path, index })
    }

    fn cell<'r>(&self, row: &'r StringRecord, column: &'static str) -> Option<&'r str> {
        self.index
            .get(column)
            .and_then(|&i| row.get(i))
            .and_then(normalize_cell)
    }

    fn invalid(&self, row: &StringRecord, column: &str, value: &str) -> EtlError {
        EtlError::InvalidValue {
            path: self.path.to_path_buf(),
            line: row.position().map_or(0, |p| p.line()),
            column: column.to_string(),
            value: value.to_string(),
        }
    }

    fn text(&self, row: &StringRecord, column: &'static str) -> Option<String> {
        self.cell(row, column).map(str::to_string)
    }

    fn int(&self, row: &StringRecord, column: &'static str) -> Result<Option<i32>> {
        self.cell(row, column)
            .map(|v| {
                parse_integer(v)
                    .and_then(|n| i32::try_from(n).ok())
                    .ok_or_else(|| self.invalid(row, column, v))
            })
            .transpose()
    }

    fn float(&self, row: &StringRecord, column: &'static str) -> Result<Option<f64>> {
        self.cell(row, column)
            .map(|v| v.parse::<f64>().map_err(|_| self.invalid(row, column, v)))
            .transpose()
    }

    fn date(&self, row: &StringRecord, column: &'static str) -> Result<Option<NaiveDate>> {
        self.cell(row, column)
            .map(|v| parse_date(v).ok_or_else(|| self.invalid(row, column, v)))
            .transpose()
    }

    fn record(&self, row: &StringRecord) -> Result<BookingRecord> {
        let id_column = BookingRecord::ID_COLUMN;
        let booking_id = match self.cell(row, id_column) {
            Some(v) => parse_integer(v).ok_or_else(|| self.invalid(row, id_column, v))?,
            None => return Err(self.invalid(row, id_column, "")),
        };

        Ok(BookingRecord {
            booking_id,
            hotel: self.text(row, "hotel"),
            is_canceled: self.int(row, "is_canceled")?,
            lead_time: self.int(row, "lead_time")?,
            arrival_date_year: self.int(row, "arrival_date_year")?,
            arrival_date_month: self.text(row, "arrival_date_month"),
            arrival_date_day_of_month: self.int(row, "arrival_date_day_of_month")?,
            stays_in_weekend_nights: self.int(row, "stays_in_weekend_nights")?,
            stays_in_week_nights: self.int(row, "stays_in_week_nights")?,
            adults: self.int(row, "adults")?,
            children: self.int(row, "children")?,
            babies: self.int(row, "babies")?,
            meal: self.text(row, "meal"),
            country: self.text(row, "country"),
            market_segment: self.text(row, "market_segment"),
            distribution_channel: self.text(row, "distribution_channel"),
            is_repeated_guest: self.int(row, "is_repeated_guest")?,
            previous_cancellations: self.int(row, "previous_cancellations")?,
            previous_bookings_not_canceled: self.int(row, "previous_bookings_not_canceled")?,
            reserved_room_type: self.text(row, "reserved_room_type"),
            assigned_room_type: self.text(row, "assigned_room_type"),
            booking_changes: self.int(row, "booking_changes")?,
            deposit_type: self.text(row, "deposit_type"),
            agent: self.int(row, "agent")?,
            days_in_waiting_list: self.int(row, "days_in_waiting_list")?,
            customer_type: self.text(row, "customer_type"),
            adr: self.float(row, "adr")?,
            required_car_parking_spaces: self.int(row, "required_car_parking_spaces")?,
            total_of_special_requests: self.int(row, "total_of_special_requests")?,
            reservation_status: self.text(row, "reservation_status"),
            reservation_status_date: self.date(row, "reservation_status_date")?,
        })
    }
}

/// Reads every booking from a CSV file, in file order
pub fn read_bookings(path: &Path) -> Result<Vec<BookingRecord>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| EtlError::csv(path, e))?;
    let headers = reader.headers().map_err(|e| EtlError::csv(path, e))?.clone();
    let rows = RowReader::new(path, &headers)?;

    let mut bookings = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| EtlError::csv(path, e))?;
        bookings.push(rows.record(&row)?);
    }

    Ok(bookings)
}
