//! CSV Row Parser: header normalization and per-row field extraction,
//! ported from `_resolve_import_columns`/`_parse_import_row`/
//! `_parse_import_timestamp` in `services/orders/importer.py`.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use geo_tax_models::error::{OrderError, ValidationError};
use rust_decimal::Decimal;

use crate::date_rules::ensure_min_supported_datetime;

const REQUIRED_KEYS: [&str; 4] = ["longitude", "latitude", "timestamp", "subtotal"];

/// Maps a required logical column name to the actual header text it was
/// found under.
pub type ImportColumns = HashMap<&'static str, String>;

/// Normalizes a CSV header (`strip().lower()`, then drop `_` and
/// spaces) and resolves the four required columns against it.
///
/// # Errors
///
/// Returns [`OrderError::ParseError`] if the header is empty or missing
/// any of `longitude`, `latitude`, `timestamp`, `subtotal`.
pub fn resolve_import_columns(fieldnames: &[String]) -> Result<ImportColumns, OrderError> {
    if fieldnames.is_empty() {
        return Err(OrderError::ParseError(
            "CSV file is empty or has no header.".to_string(),
        ));
    }

    let mut normalized: HashMap<String, String> = HashMap::with_capacity(fieldnames.len());
    for field in fieldnames {
        let key: String = field
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| *c != '_' && !c.is_whitespace())
            .collect();
        normalized.insert(key, field.clone());
    }

    let missing: Vec<&str> = REQUIRED_KEYS
        .iter()
        .filter(|key| !normalized.contains_key(**key))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(OrderError::ParseError(format!(
            "Missing required CSV columns: {}",
            missing.join(", ")
        )));
    }

    Ok(REQUIRED_KEYS
        .iter()
        .map(|key| (*key, normalized[*key].clone()))
        .collect())
}

/// One successfully parsed CSV row, ready for the Order Calculator.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    /// Parsed latitude.
    pub latitude: f64,
    /// Parsed longitude.
    pub longitude: f64,
    /// Parsed, validated timestamp.
    pub timestamp: DateTime<Utc>,
    /// Parsed, non-negative subtotal.
    pub subtotal: Decimal,
}

/// Parses one CSV row's required fields, matching `_parse_import_row`.
///
/// # Errors
///
/// Returns [`OrderError::ParseError`] for any malformed field, or
/// [`OrderError::Validation`] if the subtotal is negative or the
/// timestamp predates the minimum supported date.
pub fn parse_import_row(
    row: &HashMap<String, String>,
    columns: &ImportColumns,
) -> Result<ParsedRow, OrderError> {
    let longitude = field(row, columns, "longitude")?
        .trim()
        .parse::<f64>()
        .map_err(|err| OrderError::ParseError(format!("invalid longitude: {err}")))?;
    let latitude = field(row, columns, "latitude")?
        .trim()
        .parse::<f64>()
        .map_err(|err| OrderError::ParseError(format!("invalid latitude: {err}")))?;
    let timestamp = parse_import_timestamp(field(row, columns, "timestamp")?.trim())?;
    let subtotal = field(row, columns, "subtotal")?
        .trim()
        .parse::<Decimal>()
        .map_err(|err| OrderError::ParseError(format!("invalid subtotal: {err}")))?;

    if subtotal.is_sign_negative() {
        return Err(OrderError::Validation(ValidationError::NegativeSubtotal {
            subtotal: subtotal.to_string(),
        }));
    }

    Ok(ParsedRow {
        latitude,
        longitude,
        timestamp,
        subtotal,
    })
}

fn field<'a>(
    row: &'a HashMap<String, String>,
    columns: &ImportColumns,
    key: &str,
) -> Result<&'a String, OrderError> {
    let header = columns
        .get(key)
        .ok_or_else(|| OrderError::ParseError(format!("column '{key}' was not resolved")))?;
    row.get(header)
        .ok_or_else(|| OrderError::ParseError(format!("row is missing column '{header}'")))
}

/// Parses an ISO-8601 timestamp, padding a fractional-second component
/// to 6 digits and normalizing a trailing `Z`/`z` to `+00:00`, matching
/// `_parse_import_timestamp`.
///
/// # Errors
///
/// Returns [`OrderError::ParseError`] if the string is empty or cannot
/// be parsed, or [`OrderError::Validation`] if it predates the minimum
/// supported date.
pub fn parse_import_timestamp(raw: &str) -> Result<DateTime<Utc>, OrderError> {
    let clean = raw.trim();
    if clean.is_empty() {
        return Err(OrderError::ParseError("timestamp is empty".to_string()));
    }

    let normalized = normalize_fractional_seconds(clean);
    let parsed = parse_offset_aware_or_naive_utc(&normalized)
        .ok_or_else(|| OrderError::ParseError(format!("invalid timestamp '{raw}'")))?;

    ensure_min_supported_datetime(parsed, "timestamp")?;
    Ok(parsed)
}

/// Parses `normalized` as an offset-aware RFC 3339 timestamp; if no
/// offset is present, falls back to a naive `YYYY-MM-DDTHH:MM:SS[.ffffff]`
/// parse assumed to already be UTC, matching `datetime.fromisoformat`
/// accepting offset-less timestamps.
fn parse_offset_aware_or_naive_utc(normalized: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(normalized) {
        return Some(parsed.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(normalized, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Some(naive.and_utc())
}

fn normalize_fractional_seconds(clean: &str) -> String {
    let Some(dot) = clean.find('.') else {
        return clean.to_string();
    };

    let (base, rest) = clean.split_at(dot);
    let rest = &rest[1..];

    let tz_start = ['+', '-', 'Z', 'z']
        .iter()
        .filter_map(|marker| rest.find(*marker))
        .min()
        .unwrap_or(rest.len());

    let (frac, tz) = rest.split_at(tz_start);
    let mut padded_frac = frac.to_string();
    padded_frac.push_str("000000");
    padded_frac.truncate(6);

    let mut normalized = format!("{base}.{padded_frac}{tz}");
    if normalized.ends_with('Z') || normalized.ends_with('z') {
        normalized.truncate(normalized.len() - 1);
        normalized.push_str("+00:00");
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn resolves_columns_ignoring_case_underscores_and_spaces() {
        let fields = vec![
            "Longitude".to_string(),
            "Latitude".to_string(),
            "time_stamp".to_string(),
            "sub total".to_string(),
        ];
        let columns = resolve_import_columns(&fields).unwrap();
        assert_eq!(columns["timestamp"], "time_stamp");
        assert_eq!(columns["subtotal"], "sub total");
    }

    #[test]
    fn reports_every_missing_required_column() {
        let err = resolve_import_columns(&["latitude".to_string()]).unwrap_err();
        match err {
            OrderError::ParseError(msg) => {
                assert!(msg.contains("longitude"));
                assert!(msg.contains("timestamp"));
                assert!(msg.contains("subtotal"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parses_a_well_formed_row() {
        let fields = vec![
            "longitude".to_string(),
            "latitude".to_string(),
            "timestamp".to_string(),
            "subtotal".to_string(),
        ];
        let columns = resolve_import_columns(&fields).unwrap();
        let mut row = HashMap::new();
        row.insert("longitude".to_string(), "-73.9857".to_string());
        row.insert("latitude".to_string(), "40.7484".to_string());
        row.insert("timestamp".to_string(), "2025-06-01T12:00:00Z".to_string());
        row.insert("subtotal".to_string(), "19.99".to_string());

        let parsed = parse_import_row(&row, &columns).unwrap();
        assert_eq!(parsed.longitude, -73.9857);
        assert_eq!(parsed.subtotal, Decimal::new(1999, 2));
    }

    #[test]
    fn rejects_negative_subtotal() {
        let fields = vec![
            "longitude".to_string(),
            "latitude".to_string(),
            "timestamp".to_string(),
            "subtotal".to_string(),
        ];
        let columns = resolve_import_columns(&fields).unwrap();
        let mut row = HashMap::new();
        row.insert("longitude".to_string(), "0".to_string());
        row.insert("latitude".to_string(), "0".to_string());
        row.insert("timestamp".to_string(), "2025-06-01T12:00:00Z".to_string());
        row.insert("subtotal".to_string(), "-1.00".to_string());

        let err = parse_import_row(&row, &columns).unwrap_err();
        assert!(matches!(
            err,
            OrderError::Validation(ValidationError::NegativeSubtotal { .. })
        ));
    }

    #[test]
    fn pads_fractional_seconds_and_normalizes_zulu() {
        let parsed = parse_import_timestamp("2025-06-01T12:00:00.5Z").unwrap();
        assert_eq!(parsed.timestamp_subsec_micros(), 500_000);
    }

    #[test]
    fn accepts_an_offset_less_timestamp_as_utc() {
        let parsed = parse_import_timestamp("2025-06-01T10:00:00").unwrap();
        assert_eq!(parsed.hour(), 10);
    }

    #[test]
    fn accepts_an_offset_less_timestamp_with_fractional_seconds() {
        let parsed = parse_import_timestamp("2025-06-01T10:00:00.25").unwrap();
        assert_eq!(parsed.timestamp_subsec_micros(), 250_000);
    }

    #[test]
    fn rejects_timestamps_before_the_minimum_supported_date() {
        let err = parse_import_timestamp("2025-01-01T00:00:00Z").unwrap_err();
        assert!(matches!(
            err,
            OrderError::Validation(ValidationError::TimestampTooEarly { .. })
        ));
    }
}
