//! Reading source tables out of workbooks and CSV exports.
//!
//! The reporting templates keep each activity in a named Excel table
//! (`Insert > Table`) on its own worksheet. Older files and CSV exports only
//! have a plain grid, where the first non-empty row is the header row.

use crate::error::SchemaError;
use crate::value::Cell;
use calamine::{open_workbook, open_workbook_auto, Data, Range, Reader, Xlsx};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info};

/// Headers plus data rows aligned to them. Fully-empty rows are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    /// Build a table, padding short rows and dropping fully-empty ones.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .filter(|row| !is_blank_row(row))
            .map(|mut row| {
                row.resize(width, Cell::Absent);
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&Cell::Absent)
    }
}

fn is_blank_row(row: &[Cell]) -> bool {
    row.iter().all(|cell| match cell {
        Cell::Absent => true,
        Cell::Text(s) => s.trim().is_empty(),
        Cell::Number(_) => false,
    })
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Cell::Absent,
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Text(b.to_string()),
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        }
    }
}

fn header_text(data: &Data) -> String {
    match data {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        other => format!("{}", other),
    }
}

/// Detect spreadsheet files by extension.
pub fn is_excel_file(path: &Path) -> bool {
    matches!(
        extension(path).as_deref(),
        Some("xls" | "xlsx" | "xlsm" | "xlsb" | "ods")
    )
}

fn supports_named_tables(path: &Path) -> bool {
    matches!(extension(path).as_deref(), Some("xlsx" | "xlsm"))
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Read the source table for a run.
///
/// CSV files are read whole. For workbooks, a named table is read when
/// `table` is given; otherwise the whole sheet (or the first sheet).
pub fn extract(
    path: &Path,
    sheet: Option<&str>,
    table: Option<&str>,
) -> Result<RawTable, SchemaError> {
    if !is_excel_file(path) {
        return read_csv_table(path);
    }
    match (sheet, table) {
        (Some(sheet), Some(table)) => read_excel_table(path, sheet, table),
        (sheet, _) => read_excel_sheet(path, sheet),
    }
}

/// Read a named Excel table from `sheet`.
pub fn read_excel_table(path: &Path, sheet: &str, table: &str) -> Result<RawTable, SchemaError> {
    if !supports_named_tables(path) {
        return Err(SchemaError::Unreadable(format!(
            "{} does not support named tables; use an .xlsx/.xlsm file or omit the table name",
            path.display()
        )));
    }

    let mut workbook: Xlsx<_> = open_workbook(path)
        .map_err(|e| SchemaError::Unreadable(format!("{}: {}", path.display(), e)))?;

    let sheets = workbook.sheet_names();
    if !sheets.iter().any(|s| s == sheet) {
        return Err(SchemaError::SheetNotFound {
            sheet: sheet.to_string(),
            available: sheets,
        });
    }

    workbook
        .load_tables()
        .map_err(|e| SchemaError::Unreadable(format!("failed to load tables: {}", e)))?;
    let available: Vec<String> = workbook
        .table_names_in_sheet(sheet)
        .into_iter()
        .cloned()
        .collect();
    if !available.iter().any(|t| t == table) {
        return Err(SchemaError::TableNotFound {
            table: table.to_string(),
            sheet: sheet.to_string(),
            available,
        });
    }

    let found = workbook
        .table_by_name(table)
        .map_err(|e| SchemaError::Unreadable(format!("failed to read table '{}': {}", table, e)))?;

    let headers: Vec<String> = found.columns().iter().map(|c| c.trim().to_string()).collect();
    let rows = found
        .data()
        .rows()
        .map(|row| row.iter().map(Cell::from).collect())
        .collect();
    let raw = RawTable::new(headers, rows);

    info!(sheet, table, rows = raw.rows.len(), "extracted table");
    debug!(headers = ?raw.headers, "detected columns");
    Ok(raw)
}

/// Read a whole worksheet; the first non-empty row holds the headers.
pub fn read_excel_sheet(path: &Path, sheet: Option<&str>) -> Result<RawTable, SchemaError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| SchemaError::Unreadable(format!("{}: {}", path.display(), e)))?;

    let sheets = workbook.sheet_names();
    let sheet_name = match sheet {
        Some(name) if sheets.iter().any(|s| s == name) => name.to_string(),
        Some(name) => {
            return Err(SchemaError::SheetNotFound {
                sheet: name.to_string(),
                available: sheets,
            })
        }
        None => sheets
            .first()
            .cloned()
            .ok_or_else(|| SchemaError::Unreadable("workbook has no sheets".to_string()))?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| SchemaError::Unreadable(format!("failed to read sheet '{}': {}", sheet_name, e)))?;

    let raw = table_from_range(&range)?;
    info!(sheet = %sheet_name, rows = raw.rows.len(), "extracted sheet");
    Ok(raw)
}

fn table_from_range(range: &Range<Data>) -> Result<RawTable, SchemaError> {
    let mut rows = range
        .rows()
        .skip_while(|row| row.iter().all(|c| header_text(c).is_empty()));
    let headers: Vec<String> = rows.next().ok_or(SchemaError::NoHeader)?.iter().map(header_text).collect();
    let data = rows.map(|row| row.iter().map(Cell::from).collect()).collect();
    Ok(RawTable::new(headers, data))
}

/// Read a CSV export. Every value arrives as text; files that are not valid
/// UTF-8 are decoded as Windows-1252, which is what Excel writes by default.
pub fn read_csv_table(path: &Path) -> Result<RawTable, SchemaError> {
    let bytes = std::fs::read(path)
        .map_err(|e| SchemaError::Unreadable(format!("{}: {}", path.display(), e)))?;
    let content = decode_text(&bytes);
    parse_csv(&content)
}

fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

fn parse_csv(content: &str) -> Result<RawTable, SchemaError> {
    // Remove UTF-8 BOM if present
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| SchemaError::Unreadable(format!("failed to read CSV headers: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(SchemaError::NoHeader);
    }

    let mut rows = Vec::new();
    for (line_idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| {
            SchemaError::Unreadable(format!("CSV parse error at line {}: {}", line_idx + 2, e))
        })?;
        rows.push(record.iter().map(|v| Cell::Text(v.to_string())).collect());
    }
    Ok(RawTable::new(headers, rows))
}

/// `sha256:<hex>` digest of a source file, for tracing a run back to its input.
pub fn file_digest(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("sha256:{:x}", hasher.finalize()))
}
