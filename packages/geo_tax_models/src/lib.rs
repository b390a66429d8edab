#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Shared plain-data types for the NY tax order import pipeline.
//!
//! No I/O and no business logic live here; this crate exists so that the
//! resolver, rates, orders, database, and server crates agree on one set
//! of shapes without depending on each other.

pub mod error;
pub mod order;
pub mod polygon;
pub mod task;
pub mod tax;

/// A region classification tier. City jurisdictions are consulted before
/// county jurisdictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionType {
    /// A city-level tax jurisdiction.
    City,
    /// A county-level tax jurisdiction.
    County,
}

/// Normalizes a raw reporting code.
///
/// Purely numeric codes of at most 4 digits are zero-padded to 4 digits
/// (`zfill(4)` in the source implementation); anything else is trimmed
/// and kept verbatim, up to 32 characters. An empty code (after
/// trimming) is an error.
///
/// # Errors
///
/// Returns [`error::ValidationError::EmptyReportingCode`] or
/// [`error::ValidationError::ReportingCodeTooLong`].
pub fn normalize_reporting_code(raw: &str) -> Result<String, error::ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(error::ValidationError::EmptyReportingCode);
    }

    if trimmed.len() <= 4 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Ok(format!("{trimmed:0>4}"));
    }

    if trimmed.len() > 32 {
        return Err(error::ValidationError::ReportingCodeTooLong {
            len: trimmed.len(),
        });
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_pads_short_numeric_codes() {
        assert_eq!(normalize_reporting_code("36").unwrap(), "0036");
        assert_eq!(normalize_reporting_code("3600").unwrap(), "3600");
        assert_eq!(normalize_reporting_code(" 7 ").unwrap(), "0007");
    }

    #[test]
    fn keeps_non_numeric_codes_verbatim() {
        assert_eq!(normalize_reporting_code(" NYC-36061 ").unwrap(), "NYC-36061");
    }

    #[test]
    fn rejects_empty_code() {
        assert!(matches!(
            normalize_reporting_code("   "),
            Err(error::ValidationError::EmptyReportingCode)
        ));
    }

    #[test]
    fn rejects_overlong_code() {
        let long = "a".repeat(33);
        assert!(matches!(
            normalize_reporting_code(&long),
            Err(error::ValidationError::ReportingCodeTooLong { len: 33 })
        ));
    }
}
