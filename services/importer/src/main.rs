//! Importer - loads one activity table into the emissions inventory
//!
//! Responsibilities:
//! - Read the activity table from a workbook or CSV export
//! - Map headers onto the activity's fields and clean every row
//! - Resolve office, category and time period dimensions
//! - Insert fact rows in one transaction and report what happened

use anyhow::{bail, Context, Result};
use clap::Parser;
use importer::activity::{ActivityProfile, ActivityType};
use importer::config::{RunConfig, Settings};
use importer::extract::{extract, file_digest};
use importer::ingest::{ingest, prepare, IngestSummary, Prepared};
use importer::store::postgres::PgStore;
use importer::store::SqlValue;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "importer", about = "Imports activity data tables into the inventory database")]
struct Args {
    /// Workbook (.xlsx, .xlsm, .xls, .ods) or CSV export
    #[arg(long)]
    file: PathBuf,

    /// Built-in activity profile
    #[arg(long, value_enum, required_unless_present = "profile")]
    activity: Option<ActivityType>,

    /// JSON activity profile, replaces --activity
    #[arg(long, conflicts_with = "activity")]
    profile: Option<PathBuf>,

    /// Worksheet name (defaults to the profile's sheet)
    #[arg(long)]
    sheet: Option<String>,

    /// Excel table name (defaults to the profile's table)
    #[arg(long)]
    table: Option<String>,

    /// Office name, must already exist in the offices table
    #[arg(long)]
    office: String,

    /// Reporting year
    #[arg(long)]
    year: i32,

    /// Dry run - read and validate only, don't touch the database
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Create missing dimension and fact tables before importing
    #[arg(long, default_value = "false")]
    init_schema: bool,

    /// Print the run summary as JSON instead of the text report
    #[arg(long, default_value = "false")]
    json: bool,
}

fn load_profile(args: &Args) -> Result<ActivityProfile> {
    match (&args.profile, args.activity) {
        (Some(path), _) => Ok(ActivityProfile::from_json_file(path)?),
        (None, Some(activity)) => Ok(activity.profile()),
        (None, None) => bail!("either --activity or --profile is required"),
    }
}

fn print_dry_run(prepared: &Prepared, profile: &ActivityProfile) {
    println!("\nColumns:");
    for field in &profile.fields {
        match prepared.field_map.header(&field.name) {
            Some(header) => println!("  {:<28} <- {}", field.name, header),
            None => println!(
                "  {:<28} <- (default: {})",
                field.name,
                field.default.as_deref().unwrap_or("NULL")
            ),
        }
    }

    println!("\n{}", prepared_line(prepared));
    for row in prepared.rows.iter().take(3) {
        let values: Vec<String> = row.values.iter().map(display_value).collect();
        println!("  [{}] {}", row.index, values.join(" | "));
    }
    if prepared.rows.len() > 3 {
        println!("  ... and {} more", prepared.rows.len() - 3);
    }

    print_field_errors(&prepared.errors);
    println!("\nDry run - nothing written to database");
}

fn prepared_line(prepared: &Prepared) -> String {
    format!(
        "Prepared {} rows ({} unparsable values)",
        prepared.rows.len(),
        prepared.errors.len()
    )
}

fn display_value(value: &SqlValue) -> String {
    match value {
        SqlValue::Uuid(id) => id.to_string(),
        SqlValue::Int(i) => i.to_string(),
        SqlValue::Float(Some(f)) => f.to_string(),
        SqlValue::Text(Some(s)) => s.clone(),
        SqlValue::Float(None) | SqlValue::Text(None) => "NULL".to_string(),
    }
}

fn print_field_errors(errors: &[importer::FieldParseError]) {
    if errors.is_empty() {
        return;
    }
    println!("\n{} unparsable values (written as NULL):", errors.len());
    for err in errors.iter().take(20) {
        println!("  {}", err);
    }
    if errors.len() > 20 {
        println!("  ... and {} more", errors.len() - 20);
    }
}

fn print_summary(summary: &IngestSummary) {
    println!("\n=== Import complete ===");
    println!("Run ID: {}", summary.run_id);
    println!("Fact table: {}", summary.fact_table);
    println!("Rows read: {}", summary.rows_read);
    println!("Rows inserted: {}", summary.rows_inserted);
    println!("Time periods created: {}", summary.time_periods_created);
    println!(
        "Category: {}",
        if summary.category_created { "created" } else { "existing" }
    );
    print_field_errors(&summary.errors);
    if let Some(failure) = &summary.write_failure {
        println!("\nWrite failed, {} rows not inserted: {}", summary.rows_not_inserted, failure);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let profile = load_profile(&args)?;
    let run = RunConfig::new(args.office.clone(), args.year).validated()?;

    let sheet = args.sheet.clone().or_else(|| profile.sheet.clone());
    let table_name = args.table.clone().or_else(|| profile.table.clone());
    let digest = file_digest(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    if !args.json {
        println!("=== Activity Importer ===");
        println!("File: {}", args.file.display());
        println!("Hash: {}", digest);
        println!("Activity: {}", profile.key);
        println!("Office: {}", run.office_name);
        println!("Year: {}", run.year);
        println!("Mode: {}", if args.dry_run { "dry-run" } else { "live" });
    }
    info!(file = %args.file.display(), %digest, activity = %profile.key, "reading source");

    let table = extract(&args.file, sheet.as_deref(), table_name.as_deref())
        .context("Failed to extract source table")?;

    if args.dry_run {
        let prepared = prepare(&table, &profile)?;
        if args.json {
            let report = serde_json::json!({
                "file": args.file.display().to_string(),
                "digest": digest,
                "activity": profile.key,
                "rows_read": prepared.rows.len(),
                "errors": prepared.errors,
                "dry_run": true,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_dry_run(&prepared, &profile);
        }
        return Ok(());
    }

    let settings = Settings::from_env()?;
    let mut store = PgStore::connect(&settings)
        .await
        .context("Failed to connect to database")?;

    if args.init_schema {
        store
            .ensure_schema(&profile)
            .await
            .context("Failed to create tables")?;
        info!(fact_table = %profile.fact_table, "schema ready");
    }

    let summary = ingest(&mut store, &table, &profile, &run).await?;

    if args.json {
        let report = serde_json::json!({
            "file": args.file.display().to_string(),
            "digest": digest,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&summary);
    }

    if let Some(failure) = summary.write_failure {
        bail!("fact write failed: {}", failure);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use importer::activity::electricity;
    use importer::extract::RawTable;
    use importer::value::Cell;

    #[test]
    fn test_prepared_line_reports_rows_and_errors() {
        let table = RawTable::new(
            vec!["Month".to_string(), "Quarter".to_string(), "kWh".to_string()],
            vec![
                vec![Cell::Text("Jan".to_string()), Cell::Text("Q1".to_string()), Cell::Number(5.0)],
                vec![Cell::Text("Feb".to_string()), Cell::Text("Q1".to_string()), Cell::Text("x".to_string())],
            ],
        );
        let prepared = prepare(&table, &electricity()).unwrap();
        assert_eq!(prepared_line(&prepared), "Prepared 2 rows (1 unparsable values)");
    }

    #[test]
    fn test_display_value_null() {
        assert_eq!(display_value(&SqlValue::Float(None)), "NULL");
        assert_eq!(display_value(&SqlValue::text("kWh")), "kWh");
    }
}
