//! Get-or-create for the time dimension.
//!
//! Source tables supply month only, quarter only, or both. Lookup order:
//!
//! 1. `label` (`YYYY-MM`), when the month parses
//! 2. `(year, month)` by full month name, when the month parses
//! 3. `(year, quarter)`, first match, when a quarter is present
//! 4. insert a new period with whatever is known
//!
//! Two importers running at once can both miss and both insert; runs are
//! expected to be sequential.

use crate::error::StoreError;
use crate::period::{month_name, parse_month, parse_quarter};
use crate::store::{time_periods, Resolution, SqlValue, Store};
use crate::value::Cell;
use tracing::debug;

/// Canonical identity fields of a time period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodKey {
    pub year: i32,
    pub month: Option<u32>,
    pub quarter: Option<String>,
}

impl PeriodKey {
    pub fn from_cells(month_raw: &Cell, quarter_raw: &Cell, year: i32) -> Self {
        Self {
            year,
            month: parse_month(month_raw),
            quarter: parse_quarter(quarter_raw),
        }
    }

    pub fn label(&self) -> Option<String> {
        self.month.map(|m| format!("{}-{:02}", self.year, m))
    }

    pub fn month_name(&self) -> Option<&'static str> {
        self.month.and_then(month_name)
    }
}

pub async fn resolve_or_create<S: Store + ?Sized>(
    store: &mut S,
    month_raw: &Cell,
    quarter_raw: &Cell,
    year: i32,
) -> Result<Resolution, StoreError> {
    resolve_key(store, &PeriodKey::from_cells(month_raw, quarter_raw, year)).await
}

/// Same as [`resolve_or_create`] for an already-parsed key.
pub async fn resolve_key<S: Store + ?Sized>(
    store: &mut S,
    key: &PeriodKey,
) -> Result<Resolution, StoreError> {
    let table = time_periods();
    let label = key.label();
    let month = key.month_name();

    if let Some(label) = &label {
        if let Some(id) = store
            .find_id(&table, &[("label", SqlValue::text(label.as_str()))])
            .await?
        {
            return Ok(Resolution::found(id));
        }
    }

    if let Some(month) = month {
        let filter = [("year", SqlValue::Int(key.year)), ("month", SqlValue::text(month))];
        if let Some(id) = store.find_id(&table, &filter).await? {
            return Ok(Resolution::found(id));
        }
    }

    if let Some(quarter) = &key.quarter {
        let filter = [
            ("year", SqlValue::Int(key.year)),
            ("quarter", SqlValue::text(quarter.as_str())),
        ];
        if let Some(id) = store.find_id(&table, &filter).await? {
            return Ok(Resolution::found(id));
        }
    }

    let values = [
        ("year", SqlValue::Int(key.year)),
        ("quarter", SqlValue::Text(key.quarter.clone())),
        ("month", SqlValue::Text(month.map(str::to_string))),
        ("label", SqlValue::Text(label.clone())),
    ];
    let id = store.insert(&table, &values).await?;
    debug!(year = key.year, ?label, quarter = ?key.quarter, %id, "created time period");
    Ok(Resolution::created(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn test_period_key_label() {
        let key = PeriodKey::from_cells(&text("Feb"), &Cell::Absent, 2024);
        assert_eq!(key.label().as_deref(), Some("2024-02"));
        assert_eq!(key.month_name(), Some("February"));

        let key = PeriodKey::from_cells(&text("bad"), &text("q1"), 2024);
        assert_eq!(key.label(), None);
        assert_eq!(key.quarter.as_deref(), Some("Q1"));
    }

    #[tokio::test]
    async fn test_same_month_resolves_to_same_period() {
        let mut store = MemoryStore::new();
        let first = resolve_or_create(&mut store, &text("Jan"), &Cell::Absent, 2024)
            .await
            .unwrap();
        let second = resolve_or_create(&mut store, &text("Jan"), &Cell::Absent, 2024)
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);
        assert_eq!(store.rows("time_periods").len(), 1);
    }

    #[tokio::test]
    async fn test_created_period_fields() {
        let mut store = MemoryStore::new();
        let res = resolve_or_create(&mut store, &Cell::Number(3.0), &text("q1"), 2024)
            .await
            .unwrap();

        let row = store.get("time_periods", res.id).unwrap();
        assert_eq!(row["year"], SqlValue::Int(2024));
        assert_eq!(row["month"], SqlValue::text("March"));
        assert_eq!(row["quarter"], SqlValue::text("Q1"));
        assert_eq!(row["label"], SqlValue::text("2024-03"));
    }

    #[tokio::test]
    async fn test_quarter_only_then_month_only_creates_two_periods() {
        let mut store = MemoryStore::new();
        let quarter = resolve_or_create(&mut store, &Cell::Absent, &text("Q1"), 2024)
            .await
            .unwrap();
        let row = store.get("time_periods", quarter.id).unwrap();
        assert_eq!(row["quarter"], SqlValue::text("Q1"));
        assert_eq!(row["month"], SqlValue::Text(None));
        assert_eq!(row["label"], SqlValue::Text(None));

        let month = resolve_or_create(&mut store, &text("Feb"), &Cell::Absent, 2024)
            .await
            .unwrap();
        assert!(month.created);
        assert_ne!(quarter.id, month.id);
        assert_eq!(store.rows("time_periods").len(), 2);
    }

    #[tokio::test]
    async fn test_finds_by_month_name_when_label_missing() {
        let mut store = MemoryStore::new();
        let existing = store.seed(
            &time_periods(),
            &[
                ("year", SqlValue::Int(2024)),
                ("month", SqlValue::text("February")),
                ("quarter", SqlValue::Text(None)),
                ("label", SqlValue::Text(None)),
            ],
        );

        let res = resolve_or_create(&mut store, &text("february"), &Cell::Absent, 2024)
            .await
            .unwrap();
        assert_eq!(res, Resolution::found(existing));
    }

    #[tokio::test]
    async fn test_quarter_fallback_matches_existing_quarter() {
        let mut store = MemoryStore::new();
        let q2 = resolve_or_create(&mut store, &Cell::Absent, &text("Q2"), 2024)
            .await
            .unwrap();
        let again = resolve_or_create(&mut store, &text("n/a"), &text("q2"), 2024)
            .await
            .unwrap();
        assert_eq!(again, Resolution::found(q2.id));
    }

    #[tokio::test]
    async fn test_years_do_not_share_periods() {
        let mut store = MemoryStore::new();
        let a = resolve_or_create(&mut store, &text("Jan"), &Cell::Absent, 2024)
            .await
            .unwrap();
        let b = resolve_or_create(&mut store, &text("Jan"), &Cell::Absent, 2025)
            .await
            .unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_nothing_known_creates_year_only_period() {
        let mut store = MemoryStore::new();
        let res = resolve_or_create(&mut store, &Cell::Absent, &Cell::Absent, 2024)
            .await
            .unwrap();
        assert!(res.created);
        let row = store.get("time_periods", res.id).unwrap();
        assert_eq!(row["year"], SqlValue::Int(2024));
        assert_eq!(row["quarter"], SqlValue::Text(None));
    }
}
