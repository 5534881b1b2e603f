//! Process settings and per-run parameters.

use crate::error::IngestError;
use anyhow::{Context, Result};
use std::ops::RangeInclusive;

/// Reporting years accepted for a run.
pub const YEAR_RANGE: RangeInclusive<i32> = 2000..=2100;

/// Settings read from the environment (`.env` is loaded by the binary).
#[derive(Debug, Clone)]
pub struct Settings {
    pub db_url: String,
    pub max_connections: u32,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            db_url: std::env::var("DB_URL").context("DB_URL env var missing")?,
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
        })
    }
}

/// Who and when a table is being imported for. Supplied by the operator for
/// every run; there are no implicit defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub office_name: String,
    pub year: i32,
}

impl RunConfig {
    pub fn new(office_name: impl Into<String>, year: i32) -> Self {
        Self {
            office_name: office_name.into(),
            year,
        }
    }

    /// Trimmed copy of the parameters, or a `Config` error.
    pub fn validated(&self) -> Result<RunConfig, IngestError> {
        let office_name = self.office_name.trim();
        if office_name.is_empty() {
            return Err(IngestError::Config("office name is empty".to_string()));
        }
        if !YEAR_RANGE.contains(&self.year) {
            return Err(IngestError::Config(format!(
                "reporting year {} outside {}..={}",
                self.year,
                YEAR_RANGE.start(),
                YEAR_RANGE.end()
            )));
        }
        Ok(RunConfig::new(office_name, self.year))
    }
}
