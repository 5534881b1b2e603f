//! In-memory store for exercising the pipeline without a database.

use super::{SqlValue, Store, Table};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

pub type Record = HashMap<String, SqlValue>;

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<String, Vec<(Uuid, Record)>>,
    /// Fail the n-th (zero-based) row written to the named table.
    fail_at: Option<(String, usize)>,
    non_atomic: bool,
    writes: HashMap<String, usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that writes batches row by row, like a store without transactions.
    pub fn non_atomic() -> Self {
        Self {
            non_atomic: true,
            ..Self::default()
        }
    }

    pub fn fail_at(mut self, table: &str, row: usize) -> Self {
        self.fail_at = Some((table.to_string(), row));
        self
    }

    pub fn seed(&mut self, table: &Table, values: &[(&str, SqlValue)]) -> Uuid {
        let id = Uuid::new_v4();
        self.push(table, id, values.iter().map(|(c, v)| (c.to_string(), v.clone())).collect());
        id
    }

    pub fn rows(&self, table: &str) -> Vec<&Record> {
        self.tables
            .get(table)
            .map(|rows| rows.iter().map(|(_, r)| r).collect())
            .unwrap_or_default()
    }

    pub fn get(&self, table: &str, id: Uuid) -> Option<&Record> {
        self.tables
            .get(table)
            .and_then(|rows| rows.iter().find(|(row_id, _)| *row_id == id))
            .map(|(_, r)| r)
    }

    fn push(&mut self, table: &Table, id: Uuid, mut record: Record) {
        record.insert(table.key.clone(), SqlValue::Uuid(id));
        self.tables
            .entry(table.name.clone())
            .or_default()
            .push((id, record));
    }

    fn check_write(&mut self, table: &Table) -> Result<(), StoreError> {
        let count = self.writes.entry(table.name.clone()).or_default();
        let current = *count;
        *count += 1;
        match &self.fail_at {
            Some((name, row)) if *name == table.name && *row == current => Err(
                StoreError::Rejected(format!("simulated failure writing row {}", current)),
            ),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_id(
        &mut self,
        table: &Table,
        filter: &[(&str, SqlValue)],
    ) -> Result<Option<Uuid>, StoreError> {
        let Some(rows) = self.tables.get(&table.name) else {
            return Ok(None);
        };
        // SQL semantics: NULL never equals anything.
        let found = rows.iter().find(|(_, record)| {
            filter
                .iter()
                .all(|(col, want)| !want.is_null() && record.get(*col) == Some(want))
        });
        Ok(found.map(|(id, _)| *id))
    }

    async fn insert(
        &mut self,
        table: &Table,
        values: &[(&str, SqlValue)],
    ) -> Result<Uuid, StoreError> {
        self.check_write(table)?;
        Ok(self.seed(table, values))
    }

    async fn insert_batch(
        &mut self,
        table: &Table,
        columns: &[&str],
        rows: &[Vec<SqlValue>],
    ) -> Result<u64, StoreError> {
        let mut staged = Vec::with_capacity(rows.len());
        for row in rows {
            self.check_write(table)?;
            let record: Record = columns
                .iter()
                .zip(row)
                .map(|(c, v)| (c.to_string(), v.clone()))
                .collect();
            staged.push(record);
        }
        let written = staged.len() as u64;
        for record in staged {
            self.push(table, Uuid::new_v4(), record);
        }
        Ok(written)
    }

    fn atomic_batches(&self) -> bool {
        !self.non_atomic
    }
}
