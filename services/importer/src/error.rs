//! Error kinds for an import run.
//!
//! Table-level and connectivity problems abort the run ([`IngestError`]).
//! Cell-level problems never do: they become [`FieldParseError`] entries in
//! the run summary and the affected field is written as NULL.

use serde::Serialize;
use thiserror::Error;

/// The source table does not have the shape the activity profile needs.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("sheet '{sheet}' not found. Available sheets: {available:?}")]
    SheetNotFound {
        sheet: String,
        available: Vec<String>,
    },

    #[error("table '{table}' not found in sheet '{sheet}'. Available tables: {available:?}")]
    TableNotFound {
        table: String,
        sheet: String,
        available: Vec<String>,
    },

    #[error("missing required columns: {missing:?}. Detected columns: {detected:?}")]
    MissingColumns {
        missing: Vec<String>,
        detected: Vec<String>,
    },

    #[error("source has no header row")]
    NoHeader,

    #[error("failed to read source: {0}")]
    Unreadable(String),
}

/// Failure reported by a [`crate::store::Store`].
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store rejected request: {0}")]
    Rejected(String),
}

/// Errors that abort an import before any fact row is written.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("unknown office '{0}': add it to the offices table first or check the spelling")]
    UnknownOffice(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A single cell that could not be converted to its column type.
///
/// `row` is the zero-based index of the data row within the extracted table.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("row {row}: field '{field}' has unparsable value '{raw}' ({reason})")]
pub struct FieldParseError {
    pub row: usize,
    pub field: String,
    pub raw: String,
    pub reason: String,
}
