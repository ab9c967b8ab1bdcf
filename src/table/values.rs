//! Value coercion for raw text cells
//!
//! Every helper here is total: a value that cannot be coerced yields `None` and the
//! caller picks the documented default (0, the sentinel, or null).

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Rendering format for calendar dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Rendering format for timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Rendering format for times of day
pub const TIME_FORMAT: &str = "%H:%M:%S";

// ISO forms come first so already-cleaned values re-parse to themselves.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d/%m/%y %H:%M:%S",
    "%d/%m/%y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%Y%m%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%d/%m/%y", "%d-%m-%y",
    "%d.%m.%y",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M:%S%.f", "%H:%M"];

/// Destination type of a column, used to render cells for export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// Free text, written as-is
    Text,
    /// Integer, truncated toward zero
    Integer,
    /// Arbitrary-precision number
    Numeric,
    /// Calendar date
    Date,
    /// Time of day
    Time,
}

impl ColumnKind {
    /// SQL type used in the destination schema
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INT",
            Self::Numeric => "NUMERIC",
            Self::Date => "DATE",
            Self::Time => "TIME",
        }
    }

    /// Render a raw cell into the literal form of this kind, or null
    pub fn render(&self, raw: Option<&str>) -> Option<String> {
        let raw = raw?;
        match self {
            Self::Text => Some(raw.to_string()),
            Self::Integer => parse_integer(raw).map(|n| n.to_string()),
            Self::Numeric => canonical_number(raw),
            Self::Date => parse_datetime_dayfirst(raw).map(|dt| dt.format(DATE_FORMAT).to_string()),
            Self::Time => parse_time_of_day(raw).map(|t| t.format(TIME_FORMAT).to_string()),
        }
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sql_type())
    }
}

/// Parse a finite number
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse a number and truncate it to an integer
pub fn parse_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Some(n);
    }
    let n = parse_number(trimmed)?.trunc();
    if n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Some(n as i64)
    } else {
        None
    }
}

/// Canonical text form of a number: integral values lose their fraction
///
/// `"3"`, `"3.0"` and `" 3 "` all become `"3"`; `"2.50"` becomes `"2.5"`.
pub fn canonical_number(raw: &str) -> Option<String> {
    let n = parse_number(raw)?;
    if n.fract() == 0.0 && n.abs() < 1e15 {
        Some(format!("{}", n as i64))
    } else {
        Some(format!("{n}"))
    }
}

fn plausible(date: NaiveDate) -> bool {
    date.year() >= 1000
}

/// Parse a date or timestamp, resolving ambiguous forms day-first
///
/// ISO forms (`2004-03-12`) are year-first and unambiguous. Slash, dash and dot forms
/// are read as day/month/year, so `04/03/2012` is the 4th of March. Date-only values get
/// a midnight time component.
pub fn parse_datetime_dayfirst(raw: &str) -> Option<NaiveDateTime> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            if plausible(dt.date()) {
                return Some(dt);
            }
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            if plausible(date) {
                return Some(date.and_time(NaiveTime::MIN));
            }
        }
    }

    None
}

/// Parse a calendar date (day-first)
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    parse_datetime_dayfirst(raw).map(|dt| dt.date())
}

/// Parse a time of day from a timestamp or a bare time
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    if let Some(dt) = parse_datetime_dayfirst(raw) {
        return Some(dt.time());
    }
    let value = raw.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(value, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("3"), Some(3));
        assert_eq!(parse_integer(" 3.9 "), Some(3));
        assert_eq!(parse_integer("-2.5"), Some(-2));
        assert_eq!(parse_integer("abc"), None);
        assert_eq!(parse_integer("NaN"), None);
        assert_eq!(parse_integer(""), None);
    }

    #[test]
    fn test_canonical_number() {
        assert_eq!(canonical_number("3"), Some("3".to_string()));
        assert_eq!(canonical_number("3.0"), Some("3".to_string()));
        assert_eq!(canonical_number("2.50"), Some("2.5".to_string()));
        assert_eq!(canonical_number("x"), None);
    }

    #[test]
    fn test_parse_dayfirst() {
        let dt = parse_datetime_dayfirst("04/03/2012").unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2012, 3, 4).unwrap());

        let dt = parse_datetime_dayfirst("2012-03-04").unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2012, 3, 4).unwrap());

        let dt = parse_datetime_dayfirst("12.03.04").unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2004, 3, 12).unwrap());

        let dt = parse_datetime_dayfirst("25/12/2003 14:05").unwrap();
        assert_eq!(dt.format(TIMESTAMP_FORMAT).to_string(), "2003-12-25 14:05:00");

        assert!(parse_datetime_dayfirst("31/02/2004").is_none());
        assert!(parse_datetime_dayfirst("Non précisé").is_none());
    }

    #[test]
    fn test_parse_time_of_day() {
        let t = parse_time_of_day("2003-12-25 14:05:09").unwrap();
        assert_eq!(t.format(TIME_FORMAT).to_string(), "14:05:09");

        let t = parse_time_of_day("08:30").unwrap();
        assert_eq!(t.format(TIME_FORMAT).to_string(), "08:30:00");

        assert!(parse_time_of_day("soon").is_none());
    }

    #[test]
    fn test_render_by_kind() {
        assert_eq!(ColumnKind::Integer.render(Some("12.0")), Some("12".to_string()));
        assert_eq!(ColumnKind::Integer.render(Some("Non précisé")), None);
        assert_eq!(ColumnKind::Numeric.render(Some("1.50")), Some("1.5".to_string()));
        assert_eq!(
            ColumnKind::Date.render(Some("05/06/2001")),
            Some("2001-06-05".to_string())
        );
        assert_eq!(ColumnKind::Text.render(Some("GH")), Some("GH".to_string()));
        assert_eq!(ColumnKind::Text.render(None), None);
    }
}
