//! The Tax Rate Entry data model (spec. Data Model, "Tax Rate Entry",
//! "Jurisdiction Rate Item").

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single named jurisdiction rate, e.g. `{"name": "New York City", "rate": 0.045}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JurisdictionRateItem {
    /// Non-empty jurisdiction name.
    pub name: String,
    /// The raw (unrounded) rate contributed by this jurisdiction.
    pub rate: f64,
}

/// The four-category jurisdiction payload stored verbatim on every Order
/// row. Exactly these four keys are permitted; see
/// [`crate::error::ValidationError::InvalidRatePayload`] for the load-time
/// validation this supports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JurisdictionsPayload {
    /// State-level rate items.
    pub state_rate: Vec<JurisdictionRateItem>,
    /// County-level rate items.
    pub county_rate: Vec<JurisdictionRateItem>,
    /// City-level rate items.
    pub city_rate: Vec<JurisdictionRateItem>,
    /// Special-district rate items.
    pub special_rates: Vec<JurisdictionRateItem>,
}

/// A fully resolved tax-rate breakdown for one reporting code: the raw
/// jurisdiction payload plus per-category sums and the composite, all
/// rounded to 5 decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxRateBreakdown {
    /// Normalized reporting code this breakdown was resolved for.
    pub reporting_code: String,
    /// The raw four-category jurisdiction payload.
    pub jurisdictions: JurisdictionsPayload,
    /// `round5(sum(state_rate))`.
    pub state_rate: Decimal,
    /// `round5(sum(county_rate))`.
    pub county_rate: Decimal,
    /// `round5(sum(city_rate))`.
    pub city_rate: Decimal,
    /// `round5(sum(special_rates))`.
    pub special_rates: Decimal,
    /// `round5(state_rate + county_rate + city_rate + special_rates)`.
    pub composite_tax_rate: Decimal,
}
