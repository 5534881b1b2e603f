//! Activity data importer.
//!
//! Loads a reporting table (electricity, vehicle fuel, building fuel) from a
//! workbook or CSV export, resolves its rows against the office, category and
//! time-period dimensions and writes one fact row per source row.

pub mod activity;
pub mod columns;
pub mod config;
pub mod dimensions;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod period;
pub mod store;
pub mod time_period;
pub mod value;

pub use error::{FieldParseError, IngestError, SchemaError, StoreError};
pub use ingest::{ingest, prepare, IngestSummary};
