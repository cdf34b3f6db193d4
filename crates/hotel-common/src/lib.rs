//! Hotel DWH Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, configuration and error handling for the hotel bookings
//! pipeline.
//!
//! - **Error Handling**: [`EtlError`] with a coarse [`ErrorKind`] per failure
//! - **Configuration**: database, dbt and retry settings read from the environment
//! - **Bookings**: the booking record model and its CSV reader
//! - **Logging**: `tracing` subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use hotel_common::booking::read_bookings;
//! use hotel_common::config::DatabaseConfig;
//! use std::path::Path;
//!
//! fn check() -> hotel_common::Result<()> {
//!     let _db = DatabaseConfig::from_env()?;
//!     let bookings = read_bookings(Path::new("hotel_dwh/hotel_bookings.csv"))?;
//!     assert!(!bookings.is_empty());
//!     Ok(())
//! }
//! ```

pub mod booking;
pub mod config;
pub mod error;
pub mod logging;

pub use error::{ConfigError, ErrorKind, EtlError, Result};
