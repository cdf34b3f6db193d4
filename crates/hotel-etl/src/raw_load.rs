//! Standalone bulk loader
//!
//! Mirrors a CSV file into a raw staging table, replacing whatever the table
//! held before. The table is dropped, recreated from the file header with
//! inferred column types, and filled, all inside one transaction: a failure at
//! any point leaves the previous contents in place.

use crate::db::{self, quote_ident, quote_qualified, rows_per_statement};
use hotel_common::booking::{normalize_cell, parse_integer};
use hotel_common::config::DatabaseConfig;
use hotel_common::{EtlError, Result};
use serde::Serialize;
use sqlx::{Connection, PgConnection, Postgres, QueryBuilder};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Default table replaced by the standalone loader
pub const DEFAULT_RAW_TABLE: &str = "raw_hotel_bookings";

/// SQL type chosen for a raw column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnType {
    BigInt,
    Double,
    Text,
}

impl ColumnType {
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnType::BigInt => "BIGINT",
            ColumnType::Double => "DOUBLE PRECISION",
            ColumnType::Text => "TEXT",
        }
    }
}

/// Picks the narrowest type every non-missing value fits
///
/// Integers win over floats, floats over text. A column with no values at all
/// is text.
pub fn infer_column_type<'a>(values: impl IntoIterator<Item = Option<&'a str>>) -> ColumnType {
    let mut seen = false;
    let mut all_int = true;
    let mut all_float = true;

    for value in values.into_iter().flatten() {
        seen = true;
        if all_int && value.parse::<i64>().is_err() {
            all_int = false;
        }
        if !all_int && value.parse::<f64>().is_err() {
            all_float = false;
            break;
        }
    }

    match (seen, all_int, all_float) {
        (false, _, _) => ColumnType::Text,
        (true, true, _) => ColumnType::BigInt,
        (true, false, true) => ColumnType::Double,
        (true, false, false) => ColumnType::Text,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawColumn {
    pub name: String,
    pub column_type: ColumnType,
}

/// A CSV file held in memory, missing values already normalised to `None`
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub columns: Vec<RawColumn>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// Blank headers become `Unnamed: <i>`; repeated headers get `.1`, `.2`, ...
fn column_names<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .enumerate()
        .map(|(i, header)| {
            let base = match header.trim() {
                "" => format!("Unnamed: {}", i),
                name => name.to_string(),
            };
            let mut name = base.clone();
            let mut suffix = 1;
            while !seen.insert(name.clone()) {
                name = format!("{}.{}", base, suffix);
                suffix += 1;
            }
            name
        })
        .collect()
}

/// Reads a whole CSV file, inferring a type per column
pub fn read_raw_table(path: &Path) -> Result<RawTable> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| EtlError::csv(path, e))?;
    let headers = reader.headers().map_err(|e| EtlError::csv(path, e))?.clone();
    if headers.is_empty() {
        return Err(EtlError::EmptyFile {
            path: path.to_path_buf(),
        });
    }
    let names = column_names(headers.iter());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| EtlError::csv(path, e))?;
        rows.push(
            record
                .iter()
                .map(|cell| normalize_cell(cell).map(str::to_string))
                .collect::<Vec<_>>(),
        );
    }

    let columns = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| RawColumn {
            column_type: infer_column_type(rows.iter().map(|r| r[i].as_deref())),
            name,
        })
        .collect();

    Ok(RawTable { columns, rows })
}

fn create_table_sql(table: &str, columns: &[RawColumn]) -> String {
    let definitions = columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.column_type.sql_type()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({})", quote_qualified(table), definitions)
}

/// Drops, recreates and fills `table` inside one transaction
pub async fn write_raw_table(conn: &mut PgConnection, table: &str, raw: &RawTable) -> Result<u64> {
    let mut tx = conn.begin().await?;

    sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote_qualified(table)))
        .execute(&mut *tx)
        .await?;
    sqlx::query(&create_table_sql(table, &raw.columns))
        .execute(&mut *tx)
        .await?;
    debug!(table, columns = raw.columns.len(), "Recreated table");

    let prefix = format!(
        "INSERT INTO {} ({}) ",
        quote_qualified(table),
        raw.columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let mut inserted = 0u64;
    for chunk in raw.rows.chunks(rows_per_statement(raw.columns.len())) {
        let mut query = QueryBuilder::<Postgres>::new(prefix.as_str());
        query.push_values(chunk, |mut row, values| {
            for (column, value) in raw.columns.iter().zip(values) {
                let value = value.as_deref();
                match column.column_type {
                    ColumnType::BigInt => row.push_bind(value.and_then(parse_integer)),
                    ColumnType::Double => row.push_bind(value.and_then(|v| v.parse::<f64>().ok())),
                    ColumnType::Text => row.push_bind(value),
                };
            }
        });

        let result = query.build().execute(&mut *tx).await?;
        inserted += result.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

/// Outcome of a full-replace load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawLoadSummary {
    pub table: String,
    pub rows: u64,
    pub columns: usize,
}

/// Replaces the contents of `table` with the rows of `csv_path`
#[instrument(skip(config), fields(csv = %csv_path.display()))]
pub async fn replace_table(
    config: &DatabaseConfig,
    csv_path: &Path,
    table: &str,
) -> Result<RawLoadSummary> {
    let raw = read_raw_table(csv_path)?;
    info!(
        rows = raw.rows.len(),
        columns = raw.columns.len(),
        "Read raw bookings file"
    );

    let mut conn = db::connect(config).await?;
    let rows = write_raw_table(&mut conn, table, &raw).await?;
    conn.close().await?;

    info!(table, rows, "Data successfully loaded into PostgreSQL table");

    Ok(RawLoadSummary {
        table: table.to_string(),
        rows,
        columns: raw.columns.len(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_infer_column_type() {
        assert_eq!(infer_column_type([Some("1"), Some("2"), None]), ColumnType::BigInt);
        assert_eq!(infer_column_type([Some("1"), Some("2.5")]), ColumnType::Double);
        assert_eq!(infer_column_type([Some("2.5"), Some("x")]), ColumnType::Text);
        assert_eq!(infer_column_type([Some("Resort Hotel")]), ColumnType::Text);
        assert_eq!(infer_column_type([None, None]), ColumnType::Text);
        assert_eq!(infer_column_type(Vec::<Option<&str>>::new()), ColumnType::Text);
    }

    #[test]
    fn test_column_names() {
        let names = column_names(["hotel", "", "adr", "adr", " adr "].into_iter());
        assert_eq!(names, vec!["hotel", "Unnamed: 1", "adr", "adr.1", "adr.2"]);
    }

    #[test]
    fn test_read_raw_table() {
        let file = write_csv("hotel,children,adr,agent\nResort Hotel,NA,75.5,NULL\nCity Hotel,2,98,9\n");
        let raw = read_raw_table(file.path()).unwrap();

        let types: Vec<_> = raw.columns.iter().map(|c| c.column_type).collect();
        assert_eq!(
            types,
            vec![ColumnType::Text, ColumnType::BigInt, ColumnType::Double, ColumnType::BigInt]
        );
        assert_eq!(raw.rows.len(), 2);
        assert_eq!(raw.rows[0][1], None);
        assert_eq!(raw.rows[0][3], None);
        assert_eq!(raw.rows[1][0].as_deref(), Some("City Hotel"));
    }

    #[test]
    fn test_ragged_row_is_rejected() {
        let file = write_csv("a,b\n1,2\n3\n");
        let err = read_raw_table(file.path()).unwrap_err();
        assert!(matches!(err, EtlError::Csv { .. }));
    }

    #[test]
    fn test_empty_file() {
        let file = write_csv("");
        let err = read_raw_table(file.path()).unwrap_err();
        assert!(matches!(err, EtlError::EmptyFile { .. }));
    }

    #[test]
    fn test_create_table_sql() {
        let columns = vec![
            RawColumn {
                name: "hotel".to_string(),
                column_type: ColumnType::Text,
            },
            RawColumn {
                name: "adr".to_string(),
                column_type: ColumnType::Double,
            },
        ];
        assert_eq!(
            create_table_sql("raw_hotel_bookings", &columns),
            "CREATE TABLE \"raw_hotel_bookings\" (\"hotel\" TEXT, \"adr\" DOUBLE PRECISION)"
        );
    }
}
