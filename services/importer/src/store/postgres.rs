//! PostgreSQL store backed by an `sqlx` pool.

use super::{identifier, SqlValue, Store, Table};
use crate::activity::{ActivityProfile, FieldKind};
use crate::config::Settings;
use crate::error::StoreError;
use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use tracing::{debug, info};
use uuid::Uuid;

const DIMENSION_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS offices (
    office_id UUID PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS categories (
    category_id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT
);
CREATE TABLE IF NOT EXISTS time_periods (
    time_period_id UUID PRIMARY KEY,
    year INTEGER NOT NULL,
    quarter TEXT,
    month TEXT,
    label TEXT
);
"#;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(settings: &Settings) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .connect(&settings.db_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Create the dimension tables and the profile's fact table if missing.
    pub async fn ensure_schema(&self, profile: &ActivityProfile) -> Result<(), StoreError> {
        sqlx::raw_sql(DIMENSION_DDL).execute(&self.pool).await?;
        let ddl = fact_table_ddl(profile)?;
        debug!(%ddl, "ensuring fact table");
        sqlx::raw_sql(&ddl).execute(&self.pool).await?;
        info!(table = %profile.fact_table, "schema ready");
        Ok(())
    }
}

fn fact_table_ddl(profile: &ActivityProfile) -> Result<String, StoreError> {
    let mut columns = vec![
        "fact_id UUID PRIMARY KEY".to_string(),
        "office_id UUID NOT NULL REFERENCES offices (office_id)".to_string(),
        "time_period_id UUID NOT NULL REFERENCES time_periods (time_period_id)".to_string(),
        "category_id UUID NOT NULL REFERENCES categories (category_id)".to_string(),
    ];
    for field in &profile.fields {
        let sql_type = match field.kind {
            FieldKind::Text => "TEXT",
            FieldKind::Number => "DOUBLE PRECISION",
        };
        columns.push(format!("{} {}", identifier(&field.name)?, sql_type));
    }
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        identifier(&profile.fact_table)?,
        columns.join(",\n    ")
    ))
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        SqlValue::Uuid(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
    }
}

fn insert_sql(table: &Table, columns: &[&str]) -> Result<String, StoreError> {
    let mut names = vec![identifier(&table.key)?];
    for column in columns {
        names.push(identifier(column)?);
    }
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("${}", i)).collect();
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        identifier(&table.name)?,
        names.join(", "),
        placeholders.join(", ")
    ))
}

#[async_trait]
impl Store for PgStore {
    async fn find_id(
        &mut self,
        table: &Table,
        filter: &[(&str, SqlValue)],
    ) -> Result<Option<Uuid>, StoreError> {
        let mut predicates = Vec::with_capacity(filter.len());
        for (i, (column, _)) in filter.iter().enumerate() {
            predicates.push(format!("{} = ${}", identifier(column)?, i + 1));
        }
        let sql = format!(
            "SELECT {} FROM {} WHERE {} LIMIT 1",
            identifier(&table.key)?,
            identifier(&table.name)?,
            predicates.join(" AND ")
        );

        let mut query = sqlx::query(&sql);
        for (_, value) in filter {
            query = bind_value(query, value);
        }
        let row = query.fetch_optional(&self.pool).await?;
        match row {
            Some(row) => Ok(Some(row.try_get::<Uuid, _>(0)?)),
            None => Ok(None),
        }
    }

    async fn insert(
        &mut self,
        table: &Table,
        values: &[(&str, SqlValue)],
    ) -> Result<Uuid, StoreError> {
        let columns: Vec<&str> = values.iter().map(|(c, _)| *c).collect();
        let sql = insert_sql(table, &columns)?;
        let id = Uuid::new_v4();

        let mut query = sqlx::query(&sql).bind(id);
        for (_, value) in values {
            query = bind_value(query, value);
        }
        query.execute(&self.pool).await?;
        Ok(id)
    }

    async fn insert_batch(
        &mut self,
        table: &Table,
        columns: &[&str],
        rows: &[Vec<SqlValue>],
    ) -> Result<u64, StoreError> {
        let sql = insert_sql(table, columns)?;
        let mut tx = self.pool.begin().await?;

        let mut written = 0u64;
        for row in rows {
            if row.len() != columns.len() {
                return Err(StoreError::Rejected(format!(
                    "row has {} values for {} columns",
                    row.len(),
                    columns.len()
                )));
            }
            let mut query = sqlx::query(&sql).bind(Uuid::new_v4());
            for value in row {
                query = bind_value(query, value);
            }
            written += query.execute(&mut *tx).await?.rows_affected();
        }

        // Dropping `tx` on an early return above rolls the batch back.
        tx.commit().await?;
        Ok(written)
    }

    fn atomic_batches(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::building_fuel;
    use crate::store::{offices, time_periods};

    #[test]
    fn test_insert_sql_prepends_key() {
        let sql = insert_sql(&time_periods(), &["year", "quarter"]).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO time_periods (time_period_id, year, quarter) VALUES ($1, $2, $3)"
        );
    }

    #[test]
    fn test_insert_sql_rejects_bad_identifier() {
        let result = insert_sql(&offices(), &["name; --"]);
        assert!(matches!(result, Err(StoreError::Rejected(_))));
    }

    #[test]
    fn test_fact_table_ddl() {
        let ddl = fact_table_ddl(&building_fuel()).unwrap();
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS fuel_buildings ("));
        assert!(ddl.contains("office_id UUID NOT NULL REFERENCES offices (office_id)"));
        assert!(ddl.contains("consumption DOUBLE PRECISION"));
        assert!(ddl.contains("facility_type TEXT"));
    }
}
