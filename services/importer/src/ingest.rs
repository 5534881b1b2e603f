//! One import run: source table in, fact rows out.
//!
//! Phases, in order:
//! - validate run parameters and the activity profile (no store access)
//! - resolve the header row to the profile's fields
//! - clean every row and convert it to column values
//! - resolve the office, then the category, then each row's time period
//! - write all fact rows as one batch
//!
//! Anything wrong with the table as a whole aborts before a single write.
//! Problems with individual cells are collected in the summary; the row is
//! still written with that field set to NULL.

use crate::activity::{ActivityProfile, FieldKind};
use crate::columns::{FieldMap, FieldSource};
use crate::config::RunConfig;
use crate::dimensions::{resolve_category, resolve_office};
use crate::error::{FieldParseError, IngestError};
use crate::extract::RawTable;
use crate::store::{fact_table, SqlValue, Store, Table};
use crate::time_period::resolve_or_create;
use crate::value::{normalize, parse_number, Cell};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Dimension key columns every fact table starts with.
pub const DIMENSION_COLUMNS: [&str; 3] = ["office_id", "time_period_id", "category_id"];

/// A source row after cleaning, before dimension resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRow {
    /// Zero-based position in the extracted table.
    pub index: usize,
    pub month: Cell,
    pub quarter: Cell,
    /// Payload values in profile field order.
    pub values: Vec<SqlValue>,
}

/// Output of the pure half of a run.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub field_map: FieldMap,
    pub rows: Vec<PreparedRow>,
    pub errors: Vec<FieldParseError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub run_id: Uuid,
    pub activity: String,
    pub office: String,
    pub year: i32,
    pub fact_table: String,
    pub rows_read: usize,
    pub rows_inserted: u64,
    pub rows_not_inserted: u64,
    pub time_periods_created: usize,
    pub category_created: bool,
    pub errors: Vec<FieldParseError>,
    pub write_failure: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl IngestSummary {
    pub fn is_complete(&self) -> bool {
        self.write_failure.is_none()
    }
}

/// Resolve columns and clean every row. Touches nothing outside memory.
pub fn prepare(table: &RawTable, profile: &ActivityProfile) -> Result<Prepared, IngestError> {
    profile.validate().map_err(IngestError::Config)?;
    let field_map = FieldMap::build(&table.headers, profile)?;

    let mut rows = Vec::with_capacity(table.rows.len());
    let mut errors = Vec::new();

    for index in 0..table.rows.len() {
        let mut month = Cell::Absent;
        let mut quarter = Cell::Absent;
        let mut values = Vec::with_capacity(profile.fields.len());

        for field in &profile.fields {
            let cell = match field_map.source(&field.name) {
                Some(FieldSource::Column { index: column, .. }) => {
                    normalize(table.cell(index, *column))
                }
                Some(FieldSource::Default(Some(default))) => Cell::Text(default.clone()),
                Some(FieldSource::Default(None)) | None => Cell::Absent,
            };

            if field.name == profile.month_field {
                month = cell.clone();
            }
            if field.name == profile.quarter_field {
                quarter = cell.clone();
            }

            let value = match field.kind {
                FieldKind::Text => SqlValue::Text(cell.as_text()),
                FieldKind::Number => match parse_number(&cell) {
                    Ok(number) => SqlValue::Float(number),
                    Err(reason) => {
                        errors.push(FieldParseError {
                            row: index,
                            field: field.name.clone(),
                            raw: cell.to_string(),
                            reason,
                        });
                        SqlValue::Float(None)
                    }
                },
            };
            values.push(value);
        }

        rows.push(PreparedRow {
            index,
            month,
            quarter,
            values,
        });
    }

    for err in &errors {
        warn!("{}", err);
    }
    Ok(Prepared {
        field_map,
        rows,
        errors,
    })
}

/// Import `table` as `profile` facts for the office and year in `run`.
pub async fn ingest<S: Store + ?Sized>(
    store: &mut S,
    table: &RawTable,
    profile: &ActivityProfile,
    run: &RunConfig,
) -> Result<IngestSummary, IngestError> {
    let started_at = Utc::now();
    let run_id = Uuid::new_v4();
    let run = run.validated()?;
    let prepared = prepare(table, profile)?;
    info!(%run_id, activity = %profile.key, rows = prepared.rows.len(), "prepared rows");

    let office_id = resolve_office(store, &run.office_name).await?;
    let category = resolve_category(store, &profile.category).await?;
    info!(%run_id, office = %run.office_name, %office_id, category_id = %category.id, "resolved dimensions");

    let mut time_periods_created = 0;
    let mut facts = Vec::with_capacity(prepared.rows.len());

    // Every row runs the full lookup chain: a period created for an earlier
    // row can change which step a later row matches on.
    for row in &prepared.rows {
        let period = resolve_or_create(store, &row.month, &row.quarter, run.year).await?;
        if period.created {
            time_periods_created += 1;
        }
        let time_period_id = period.id;

        let mut values = Vec::with_capacity(DIMENSION_COLUMNS.len() + row.values.len());
        values.push(SqlValue::Uuid(office_id));
        values.push(SqlValue::Uuid(time_period_id));
        values.push(SqlValue::Uuid(category.id));
        values.extend(row.values.iter().cloned());
        facts.push(values);
    }

    let mut columns: Vec<&str> = DIMENSION_COLUMNS.to_vec();
    columns.extend(profile.fields.iter().map(|f| f.name.as_str()));
    let target = fact_table(&profile.fact_table);
    let (rows_inserted, write_failure) = write_facts(store, &target, &columns, &facts).await;

    let summary = IngestSummary {
        run_id,
        activity: profile.key.clone(),
        office: run.office_name.clone(),
        year: run.year,
        fact_table: profile.fact_table.clone(),
        rows_read: prepared.rows.len(),
        rows_inserted,
        rows_not_inserted: facts.len() as u64 - rows_inserted,
        time_periods_created,
        category_created: category.created,
        errors: prepared.errors,
        write_failure,
        started_at,
        finished_at: Utc::now(),
    };
    info!(
        %run_id,
        inserted = summary.rows_inserted,
        not_inserted = summary.rows_not_inserted,
        field_errors = summary.errors.len(),
        "import finished"
    );
    Ok(summary)
}

/// Write fact rows: one transaction when the store has them, otherwise row by
/// row until the first failure. Returns the rows written and the failure.
async fn write_facts<S: Store + ?Sized>(
    store: &mut S,
    table: &Table,
    columns: &[&str],
    facts: &[Vec<SqlValue>],
) -> (u64, Option<String>) {
    if facts.is_empty() {
        return (0, None);
    }

    if store.atomic_batches() {
        return match store.insert_batch(table, columns, facts).await {
            Ok(written) => (written, None),
            Err(e) => {
                error!(table = %table.name, "batch rolled back: {}", e);
                (0, Some(e.to_string()))
            }
        };
    }

    let mut written = 0;
    for (idx, fact) in facts.iter().enumerate() {
        let values: Vec<(&str, SqlValue)> = columns.iter().copied().zip(fact.iter().cloned()).collect();
        if let Err(e) = store.insert(table, &values).await {
            error!(table = %table.name, row = idx, "write stopped: {}", e);
            return (written, Some(format!("row {}: {}", idx, e)));
        }
        written += 1;
    }
    (written, None)
}
