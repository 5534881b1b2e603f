//! Header resolution: map the headers a spreadsheet author happened to use
//! onto the logical fields of an activity profile.

use crate::activity::ActivityProfile;
use crate::error::SchemaError;
use std::collections::HashMap;

/// Comparison key for a header: lowercase alphanumerics only, so
/// "Facility Type", "facility_type" and "FACILITY-TYPE" compare equal.
pub fn header_key(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Find the header matching the first alias that matches any header.
/// Alias order decides, not header order.
pub fn resolve<'h, S: AsRef<str>>(headers: &'h [String], aliases: &[S]) -> Option<&'h str> {
    resolve_index(headers, aliases).map(|idx| headers[idx].as_str())
}

fn resolve_index<S: AsRef<str>>(headers: &[String], aliases: &[S]) -> Option<usize> {
    let keys: Vec<String> = headers.iter().map(|h| header_key(h)).collect();
    aliases.iter().find_map(|alias| {
        let wanted = header_key(alias.as_ref());
        keys.iter().position(|k| !k.is_empty() && *k == wanted)
    })
}

/// Where a logical field comes from in one particular source table.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSource {
    /// Column index and the header text it was matched on.
    Column { index: usize, header: String },
    /// Optional field missing from the table, filled with its default (if any).
    Default(Option<String>),
}

/// Logical field name → source column, built once per table.
#[derive(Debug, Clone)]
pub struct FieldMap {
    sources: HashMap<String, FieldSource>,
}

impl FieldMap {
    /// Resolve every field of `profile` against `headers`.
    ///
    /// Fails with every unresolved required field listed, so an operator can
    /// fix the source table in one pass.
    pub fn build(headers: &[String], profile: &ActivityProfile) -> Result<Self, SchemaError> {
        let mut sources = HashMap::new();
        let mut missing = Vec::new();

        for field in &profile.fields {
            match resolve_index(headers, &field.aliases) {
                Some(index) => {
                    sources.insert(
                        field.name.clone(),
                        FieldSource::Column {
                            index,
                            header: headers[index].clone(),
                        },
                    );
                }
                None if field.required => missing.push(field.name.clone()),
                None => {
                    sources.insert(field.name.clone(), FieldSource::Default(field.default.clone()));
                }
            }
        }

        if !missing.is_empty() {
            return Err(SchemaError::MissingColumns {
                missing,
                detected: headers.to_vec(),
            });
        }
        Ok(Self { sources })
    }

    pub fn source(&self, field: &str) -> Option<&FieldSource> {
        self.sources.get(field)
    }

    /// Matched header for `field`, if it was found in the table.
    pub fn header(&self, field: &str) -> Option<&str> {
        match self.sources.get(field) {
            Some(FieldSource::Column { header, .. }) => Some(header.as_str()),
            _ => None,
        }
    }
}
