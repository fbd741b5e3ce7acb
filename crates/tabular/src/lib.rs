//! Switchyard Tabular
//!
//! Tabular data collaborator backed by one CSV file per dataset:
//! - Parsing and writing of daily price rows
//! - Summary statistics and moving averages
//! - Optional sample data for a fresh data directory

mod csv;
mod sample;
mod stats;
mod store;

pub use csv::{parse_rows, write_rows, COLUMNS};
pub use sample::sample_datasets;
pub use stats::summarize;
pub use store::CsvDatasetStore;
