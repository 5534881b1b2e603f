//! Activity profiles: which columns an activity's source table must carry,
//! how they may be spelled, and where the resulting facts are stored.
//!
//! Built-in profiles cover the three reporting templates (electricity,
//! vehicle fuel, building fuel). A profile can also be loaded from JSON:
//!
//! ```json
//! {
//!   "key": "electricity",
//!   "category": { "name": "Electricity", "description": "Electricity consumption" },
//!   "fact_table": "electricity",
//!   "fields": [
//!     { "name": "month", "kind": "text", "aliases": ["Month"] },
//!     { "name": "quarter", "kind": "text", "aliases": ["Quarter", "Qtr"] },
//!     { "name": "consumption_kwh", "kind": "number", "aliases": ["Consumption (kWh)", "kWh"] }
//!   ]
//! }
//! ```

use crate::error::IngestError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Value used for `facility_type` when the source table has no such column.
pub const DEFAULT_FACILITY_TYPE: &str = "Office";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Electricity,
    VehicleFuel,
    BuildingFuel,
}

impl ActivityType {
    pub fn profile(self) -> ActivityProfile {
        match self {
            ActivityType::Electricity => electricity(),
            ActivityType::VehicleFuel => vehicle_fuel(),
            ActivityType::BuildingFuel => building_fuel(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
}

/// One logical field. `name` is also the fact table column it is written to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    /// Accepted header spellings, most specific first.
    pub aliases: Vec<String>,
    #[serde(default = "default_true")]
    pub required: bool,
    /// Only meaningful for optional fields missing from the header row.
    #[serde(default)]
    pub default: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityProfile {
    pub key: String,
    pub category: CategorySpec,
    pub fact_table: String,
    #[serde(default = "default_month_field")]
    pub month_field: String,
    #[serde(default = "default_quarter_field")]
    pub quarter_field: String,
    /// Default worksheet holding the source table.
    #[serde(default)]
    pub sheet: Option<String>,
    /// Default Excel table name inside `sheet`.
    #[serde(default)]
    pub table: Option<String>,
    pub fields: Vec<FieldSpec>,
}

fn default_month_field() -> String {
    "month".to_string()
}

fn default_quarter_field() -> String {
    "quarter".to_string()
}

impl ActivityProfile {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Load a profile from a JSON file and validate it.
    pub fn from_json_file(path: &Path) -> Result<Self, IngestError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            IngestError::Config(format!("cannot read profile {}: {}", path.display(), e))
        })?;
        let profile: ActivityProfile = serde_json::from_str(&content)
            .map_err(|e| IngestError::Config(format!("invalid profile {}: {}", path.display(), e)))?;
        profile.validate().map_err(IngestError::Config)?;
        Ok(profile)
    }

    /// Check the profile is usable before anything touches the store.
    /// Table and column names end up in SQL, so they must be plain identifiers.
    pub fn validate(&self) -> Result<(), String> {
        if !is_identifier(&self.fact_table) {
            return Err(format!("fact table '{}' is not a valid identifier", self.fact_table));
        }
        if self.category.name.trim().is_empty() {
            return Err("category name is empty".to_string());
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !is_identifier(&field.name) {
                return Err(format!("field '{}' is not a valid identifier", field.name));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(format!("field '{}' is declared twice", field.name));
            }
            if field.aliases.is_empty() {
                return Err(format!("field '{}' has no aliases", field.name));
            }
            if field.required && field.default.is_some() {
                return Err(format!("required field '{}' cannot have a default", field.name));
            }
        }

        for period_field in [&self.month_field, &self.quarter_field] {
            if self.field(period_field).is_none() {
                return Err(format!("period field '{}' is not declared", period_field));
            }
        }
        Ok(())
    }
}

/// `[a-z_][a-z0-9_]*`
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn field(name: &str, kind: FieldKind, aliases: &[&str]) -> FieldSpec {
    FieldSpec {
        name: name.to_string(),
        kind,
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
        required: true,
        default: None,
    }
}

fn optional(name: &str, kind: FieldKind, aliases: &[&str], default: Option<&str>) -> FieldSpec {
    FieldSpec {
        required: false,
        default: default.map(str::to_string),
        ..field(name, kind, aliases)
    }
}

fn facility_type() -> FieldSpec {
    optional(
        "facility_type",
        FieldKind::Text,
        &["Facility Type", "Facility", "facility_type"],
        Some(DEFAULT_FACILITY_TYPE),
    )
}

fn month() -> FieldSpec {
    field("month", FieldKind::Text, &["Month"])
}

fn quarter() -> FieldSpec {
    field("quarter", FieldKind::Text, &["Quarter", "Qtr"])
}

fn fuel_type() -> FieldSpec {
    field("fuel_type", FieldKind::Text, &["Fuel Type", "Fuel"])
}

fn consumption() -> FieldSpec {
    field("consumption", FieldKind::Number, &["Consumption", "Amount", "Value", "kWh"])
}

fn unit() -> FieldSpec {
    field("unit", FieldKind::Text, &["Unit"])
}

pub fn electricity() -> ActivityProfile {
    ActivityProfile {
        key: "electricity".to_string(),
        category: CategorySpec {
            name: "Electricity".to_string(),
            description: "Electricity consumption".to_string(),
        },
        fact_table: "electricity".to_string(),
        month_field: default_month_field(),
        quarter_field: default_quarter_field(),
        sheet: Some("2.3a Electricity".to_string()),
        table: Some("Electricity".to_string()),
        fields: vec![
            facility_type(),
            month(),
            quarter(),
            field(
                "consumption_kwh",
                FieldKind::Number,
                &["Consumption (kWh)", "Consumption", "kWh"],
            ),
            optional("unit", FieldKind::Text, &["Unit"], Some("kWh")),
            optional("cost_php", FieldKind::Number, &["Cost (PHP)", "Cost", "PHP"], None),
            optional(
                "utility_provider",
                FieldKind::Text,
                &["Utility Provider", "Provider"],
                None,
            ),
        ],
    }
}

pub fn vehicle_fuel() -> ActivityProfile {
    ActivityProfile {
        key: "vehicle_fuel".to_string(),
        category: CategorySpec {
            name: "Fuel - Vehicles".to_string(),
            description: "Fuel consumption for vehicles".to_string(),
        },
        fact_table: "fuel_vehicles".to_string(),
        month_field: default_month_field(),
        quarter_field: default_quarter_field(),
        sheet: Some("2.1b Fuel - Vehicles".to_string()),
        table: Some("Fuel_Veh".to_string()),
        fields: vec![
            facility_type(),
            field("vehicle_type", FieldKind::Text, &["Vehicle Type", "Vehicle"]),
            fuel_type(),
            month(),
            quarter(),
            consumption(),
            unit(),
            field(
                "total_kilometers_travelled",
                FieldKind::Number,
                &[
                    "Total Kilometers Travelled",
                    "Total kilometers travelled (all vehicles)",
                    "KM Travelled",
                ],
            ),
            field("unit2", FieldKind::Text, &["Unit2"]),
        ],
    }
}

pub fn building_fuel() -> ActivityProfile {
    ActivityProfile {
        key: "building_fuel".to_string(),
        category: CategorySpec {
            name: "Fuel - Buildings".to_string(),
            description: "Fuel consumption for buildings/stationary sources".to_string(),
        },
        fact_table: "fuel_buildings".to_string(),
        month_field: default_month_field(),
        quarter_field: default_quarter_field(),
        sheet: Some("2.1a Fuel - Buildings".to_string()),
        table: Some("Fuel_Blg".to_string()),
        fields: vec![
            facility_type(),
            fuel_type(),
            month(),
            quarter(),
            consumption(),
            unit(),
        ],
    }
}
