//! Error taxonomy shared across the pipeline.
//!
//! Mirrors the kinds enumerated in the governing specification: per-row
//! failures never propagate above the Import Executor, task-level
//! failures are logged but never prevent a Task from reaching
//! `completed`, and only request-level failures (the gateway's job) are
//! mapped to transport status codes.

use thiserror::Error;

/// Input validation failed before any lookup was attempted.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    /// Latitude or longitude fell outside `[-90, 90] x [-180, 180]`.
    #[error("coordinate out of range: lat={lat}, lon={lon}")]
    CoordinateOutOfRange {
        /// The offending latitude.
        lat: f64,
        /// The offending longitude.
        lon: f64,
    },

    /// Subtotal was negative.
    #[error("subtotal must be >= 0, got {subtotal}")]
    NegativeSubtotal {
        /// The offending subtotal, formatted for display.
        subtotal: String,
    },

    /// Timestamp fell before the minimum supported date.
    #[error("{field_name} cannot be earlier than {min_date}")]
    TimestampTooEarly {
        /// The field name being validated (`timestamp`, `from`, `to`, ...).
        field_name: String,
        /// The minimum supported date, ISO-8601 (`2025-03-01`).
        min_date: String,
    },

    /// Reporting code was empty after trimming.
    #[error("reporting code cannot be empty")]
    EmptyReportingCode,

    /// Reporting code exceeded the 32-character limit.
    #[error("reporting code too long ({len} chars, max 32)")]
    ReportingCodeTooLong {
        /// The offending length.
        len: usize,
    },

    /// CSV header was missing required columns.
    #[error("missing required CSV columns: {0}")]
    MissingCsvColumns(String),

    /// A tax-rate payload section had missing or unknown category keys.
    #[error("{0}")]
    InvalidRatePayload(String),
}

/// The top-level error kind, one variant per taxonomy entry in the
/// specification's error-handling design.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Coordinates, subtotal, or timestamp failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The Reporting-Code Resolver found no covering polygon.
    #[error("Delivery point is outside New York State coverage.")]
    OutsideCoverage,

    /// The Tax-Rate Catalog has no entry for a resolved reporting code.
    #[error("Tax rate not found for reporting code {0}.")]
    RateNotFound(String),

    /// A CSV row could not be decoded or a field failed to parse.
    #[error("row parse error: {0}")]
    ParseError(String),

    /// A referenced entity (task, order, user) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An external collaborator (object store, cache) failed.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),

    /// Anything else; always logged with full context before being
    /// folded into this variant.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}
