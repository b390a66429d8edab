//! Earliest supported order date, ported from `core/date_rules.py`.

use chrono::{DateTime, NaiveDate, Utc};
use geo_tax_models::error::ValidationError;

/// No order timestamp may predate this date.
pub fn min_supported_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).expect("2025-03-01 is a valid calendar date")
}

/// Rejects `value` if its calendar date falls before [`min_supported_date`].
///
/// # Errors
///
/// Returns [`ValidationError::TimestampTooEarly`] with the exact wording
/// `"{field_name} cannot be earlier than 2025-03-01"`, matching
/// `ensure_min_supported_datetime`.
pub fn ensure_min_supported_datetime(
    value: DateTime<Utc>,
    field_name: &str,
) -> Result<(), ValidationError> {
    let min_date = min_supported_date();
    if value.date_naive() < min_date {
        return Err(ValidationError::TimestampTooEarly {
            field_name: field_name.to_string(),
            min_date: min_date.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn accepts_the_boundary_date() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        assert!(ensure_min_supported_datetime(ts, "timestamp").is_ok());
    }

    #[test]
    fn rejects_a_date_before_the_boundary() {
        let ts = Utc.with_ymd_and_hms(2025, 2, 28, 23, 59, 59).unwrap();
        let err = ensure_min_supported_datetime(ts, "timestamp").unwrap_err();
        match err {
            ValidationError::TimestampTooEarly { field_name, min_date } => {
                assert_eq!(field_name, "timestamp");
                assert_eq!(min_date, "2025-03-01");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
