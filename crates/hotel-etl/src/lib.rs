//! Hotel Bookings ETL Library
//!
//! Moves hotel booking records from a CSV file into PostgreSQL and triggers the
//! dbt models built on top of them.
//!
//! # Components
//!
//! - **extract**: appends bookings to `public.hotel_bookings`, skipping ids
//!   already present
//! - **transform**: runs `dbt run` for the `load` and `transform` stages,
//!   each optionally narrowed with a selector
//! - **pipeline**: runs extract -> load -> transform with a bounded retry
//! - **raw_load**: replaces `raw_hotel_bookings` wholesale from a CSV file
//!
//! # Example
//!
//! ```no_run
//! use hotel_common::config::AppConfig;
//! use hotel_etl::pipeline::etl_pipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::from_env()?;
//!     let report = etl_pipeline(&config).run().await;
//!     anyhow::ensure!(report.succeeded(), "pipeline failed");
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod extract;
pub mod pipeline;
pub mod raw_load;
pub mod transform;
