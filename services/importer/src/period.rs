//! Month and quarter parsing.
//!
//! These never fail: anything unrecognizable is `None`.

use crate::value::Cell;
use chrono::Month;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Parse a month cell to its number in `1..=12`.
///
/// Accepts in-range integers (or integral floats), digit strings such as
/// `"02"`, and any text whose first three letters name a month
/// (`"Feb"`, `"february"`, `"Sept."`).
pub fn parse_month(raw: &Cell) -> Option<u32> {
    match raw {
        Cell::Number(n) => month_from_number(*n),
        Cell::Text(s) => {
            let cleaned: String = s.trim().to_lowercase().replace('.', "");
            if !cleaned.is_empty() && cleaned.chars().all(|c| c.is_ascii_digit()) {
                return cleaned.parse::<u32>().ok().filter(|m| (1..=12).contains(m));
            }
            let prefix: String = cleaned.chars().take(3).collect();
            MONTH_ABBREVIATIONS
                .iter()
                .position(|abbr| *abbr == prefix)
                .map(|idx| idx as u32 + 1)
        }
        Cell::Absent => None,
    }
}

fn month_from_number(n: f64) -> Option<u32> {
    if n.fract() != 0.0 || !(1.0..=12.0).contains(&n) {
        return None;
    }
    Some(n as u32)
}

/// Full English month name, e.g. `2` → `"February"`.
pub fn month_name(month: u32) -> Option<&'static str> {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name())
}

/// Canonical quarter label.
///
/// `"q1"`, `"Q 1"`, `"1"` and `1.0` all become `"Q1"`. Other non-empty text
/// is kept, trimmed and upper-cased, so unusual labels still group together.
pub fn parse_quarter(raw: &Cell) -> Option<String> {
    match raw {
        Cell::Number(n) if n.fract() == 0.0 && (1.0..=4.0).contains(n) => {
            Some(format!("Q{}", *n as u32))
        }
        other @ Cell::Number(_) => other.as_text(),
        Cell::Text(s) => {
            let upper = s.trim().to_uppercase();
            if upper.is_empty() {
                return None;
            }
            let compact: String = upper.chars().filter(|c| !c.is_whitespace()).collect();
            let digits = compact.strip_prefix('Q').unwrap_or(&compact);
            match digits {
                "1" | "2" | "3" | "4" => Some(format!("Q{digits}")),
                _ => Some(upper),
            }
        }
        Cell::Absent => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    // -------------------------------------------------------------------------
    // MONTH PARSING
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_month_abbreviation() {
        assert_eq!(parse_month(&text("Feb")), Some(2));
        assert_eq!(parse_month(&text("jan")), Some(1));
        assert_eq!(parse_month(&text("DEC")), Some(12));
    }

    #[test]
    fn test_parse_month_full_name() {
        assert_eq!(parse_month(&text("february")), Some(2));
        assert_eq!(parse_month(&text("  September ")), Some(9));
        assert_eq!(parse_month(&text("Sept.")), Some(9));
    }

    #[test]
    fn test_parse_month_numbers() {
        assert_eq!(parse_month(&Cell::Number(3.0)), Some(3));
        assert_eq!(parse_month(&Cell::Number(12.0)), Some(12));
        assert_eq!(parse_month(&Cell::Number(13.0)), None);
        assert_eq!(parse_month(&Cell::Number(0.0)), None);
        assert_eq!(parse_month(&Cell::Number(2.5)), None);
    }

    #[test]
    fn test_parse_month_digit_text() {
        assert_eq!(parse_month(&text("02")), Some(2));
        assert_eq!(parse_month(&text("13")), None);
    }

    #[test]
    fn test_parse_month_rejects_garbage() {
        assert_eq!(parse_month(&text("")), None);
        assert_eq!(parse_month(&text("bad")), None);
        assert_eq!(parse_month(&text("Q1")), None);
        assert_eq!(parse_month(&Cell::Absent), None);
    }

    #[test]
    fn test_month_name() {
        assert_eq!(month_name(1), Some("January"));
        assert_eq!(month_name(2), Some("February"));
        assert_eq!(month_name(12), Some("December"));
        assert_eq!(month_name(0), None);
        assert_eq!(month_name(13), None);
    }

    // -------------------------------------------------------------------------
    // QUARTER PARSING
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_quarter_canonical() {
        assert_eq!(parse_quarter(&text("Q1")).as_deref(), Some("Q1"));
        assert_eq!(parse_quarter(&text("q2")).as_deref(), Some("Q2"));
        assert_eq!(parse_quarter(&text(" Q 3 ")).as_deref(), Some("Q3"));
        assert_eq!(parse_quarter(&text("4")).as_deref(), Some("Q4"));
        assert_eq!(parse_quarter(&Cell::Number(1.0)).as_deref(), Some("Q1"));
    }

    #[test]
    fn test_parse_quarter_keeps_unknown_labels() {
        assert_eq!(parse_quarter(&text("h1")).as_deref(), Some("H1"));
        assert_eq!(parse_quarter(&text("")), None);
        assert_eq!(parse_quarter(&Cell::Absent), None);
    }
}
