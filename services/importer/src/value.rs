//! Cell values and their canonical cleaning.

use serde::Serialize;
use std::fmt;

/// Placeholder strings spreadsheet exports use for "no value".
const PLACEHOLDERS: &[&str] = &["", "nan", "none"];

/// One spreadsheet cell, raw or cleaned.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Number(f64),
    Absent,
}

impl Cell {
    /// Text rendering used for text columns. Integral numbers lose their
    /// fractional part so a year typed as `2024` does not become `"2024.0"`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(format!("{}", *n as i64))
            }
            Cell::Number(n) => Some(n.to_string()),
            Cell::Absent => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(s) => f.write_str(&s),
            None => f.write_str(""),
        }
    }
}

/// Canonicalize a raw cell: blanks, placeholder strings and NaN become
/// [`Cell::Absent`]; text is trimmed; other numbers pass through.
pub fn normalize(value: &Cell) -> Cell {
    match value {
        Cell::Absent => Cell::Absent,
        Cell::Number(n) if n.is_nan() => Cell::Absent,
        Cell::Number(n) => Cell::Number(*n),
        Cell::Text(s) => {
            let trimmed = s.trim();
            let lowered = trimmed.to_lowercase();
            if PLACEHOLDERS.contains(&lowered.as_str()) {
                Cell::Absent
            } else {
                Cell::Text(trimmed.to_string())
            }
        }
    }
}

/// Convert a cleaned cell to a number for numeric columns.
///
/// Thousands separators are accepted (`"1,100"`). Returns `Err` with a reason
/// when the text is not a finite decimal number.
pub fn parse_number(value: &Cell) -> Result<Option<f64>, String> {
    match value {
        Cell::Absent => Ok(None),
        Cell::Number(n) if n.is_finite() => Ok(Some(*n)),
        Cell::Number(_) => Err("not a finite number".to_string()),
        Cell::Text(s) => {
            let cleaned = s.trim().replace(',', "");
            match cleaned.parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(Some(n)),
                Ok(_) => Err("not a finite number".to_string()),
                Err(e) => Err(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn test_normalize_blank_is_absent() {
        assert_eq!(normalize(&text("")), Cell::Absent);
        assert_eq!(normalize(&text("   ")), Cell::Absent);
        assert_eq!(normalize(&Cell::Absent), Cell::Absent);
    }

    #[test]
    fn test_normalize_placeholders_any_case() {
        assert_eq!(normalize(&text("NaN")), Cell::Absent);
        assert_eq!(normalize(&text("nan")), Cell::Absent);
        assert_eq!(normalize(&text("None")), Cell::Absent);
        assert_eq!(normalize(&text(" NONE ")), Cell::Absent);
    }

    #[test]
    fn test_normalize_nan_number_is_absent() {
        assert_eq!(normalize(&Cell::Number(f64::NAN)), Cell::Absent);
    }

    #[test]
    fn test_normalize_trims_text() {
        assert_eq!(normalize(&text("  x ")), text("x"));
        assert_eq!(normalize(&text("Diesel")), text("Diesel"));
    }

    #[test]
    fn test_normalize_keeps_numbers() {
        assert_eq!(normalize(&Cell::Number(3.14)), Cell::Number(3.14));
        assert_eq!(normalize(&Cell::Number(0.0)), Cell::Number(0.0));
    }

    #[test]
    fn test_as_text_integral_number() {
        assert_eq!(Cell::Number(2024.0).as_text().as_deref(), Some("2024"));
        assert_eq!(Cell::Number(1.5).as_text().as_deref(), Some("1.5"));
        assert_eq!(Cell::Absent.as_text(), None);
    }

    #[test]
    fn test_parse_number_variants() {
        assert_eq!(parse_number(&Cell::Number(1000.0)), Ok(Some(1000.0)));
        assert_eq!(parse_number(&text("1100")), Ok(Some(1100.0)));
        assert_eq!(parse_number(&text("1,100.50")), Ok(Some(1100.5)));
        assert_eq!(parse_number(&Cell::Absent), Ok(None));
    }

    #[test]
    fn test_parse_number_rejects_garbage() {
        assert!(parse_number(&text("oops")).is_err());
        assert!(parse_number(&text("inf")).is_err());
        assert!(parse_number(&Cell::Number(f64::INFINITY)).is_err());
    }
}
