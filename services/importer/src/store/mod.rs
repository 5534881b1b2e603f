//! The relational store the importer writes to.
//!
//! The pipeline only needs three primitives: an exact-match point lookup, an
//! insert that returns the row identity, and a batch insert. Identities are
//! UUIDs generated here, the same way the rest of the schema keys its rows.

pub mod postgres;

#[cfg(test)]
pub mod memory;

use crate::error::StoreError;
use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

/// A table together with its primary key column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub key: String,
}

impl Table {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }
}

pub fn offices() -> Table {
    Table::new("offices", "office_id")
}

pub fn categories() -> Table {
    Table::new("categories", "category_id")
}

pub fn time_periods() -> Table {
    Table::new("time_periods", "time_period_id")
}

/// Fact tables are keyed by `fact_id`.
pub fn fact_table(name: &str) -> Table {
    Table::new(name, "fact_id")
}

/// Result of a get-or-create lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub id: Uuid,
    pub created: bool,
}

impl Resolution {
    pub fn found(id: Uuid) -> Self {
        Self { id, created: false }
    }

    pub fn created(id: Uuid) -> Self {
        Self { id, created: true }
    }
}

/// A typed column value. NULLs keep their type so the database can bind them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Uuid(Uuid),
    Int(i32),
    Float(Option<f64>),
    Text(Option<String>),
}

impl SqlValue {
    pub fn text(value: impl Into<String>) -> Self {
        SqlValue::Text(Some(value.into()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Float(None) | SqlValue::Text(None))
    }
}

#[async_trait]
pub trait Store: Send {
    /// Identity of the first row whose columns equal every `filter` value.
    async fn find_id(
        &mut self,
        table: &Table,
        filter: &[(&str, SqlValue)],
    ) -> Result<Option<Uuid>, StoreError>;

    /// Insert one row and return its new identity.
    async fn insert(
        &mut self,
        table: &Table,
        values: &[(&str, SqlValue)],
    ) -> Result<Uuid, StoreError>;

    /// Insert many rows with the same columns. When [`Store::atomic_batches`]
    /// is true either every row is written or none is.
    async fn insert_batch(
        &mut self,
        table: &Table,
        columns: &[&str],
        rows: &[Vec<SqlValue>],
    ) -> Result<u64, StoreError>;

    fn atomic_batches(&self) -> bool;
}

/// Reject anything that is not a plain lowercase SQL identifier.
pub(crate) fn identifier(name: &str) -> Result<&str, StoreError> {
    if crate::activity::is_identifier(name) {
        Ok(name)
    } else {
        Err(StoreError::Rejected(format!("invalid identifier '{}'", name)))
    }
}
