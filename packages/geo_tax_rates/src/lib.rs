#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! The Tax-Rate Catalog: an in-memory map from normalized reporting code
//! to its four-category jurisdiction payload, with per-category and
//! composite rates rounded to 5 decimal places.
//!
//! Grounded on `services/tax_rate_service.py` /
//! `services/tax/tax_rate.py`'s `TaxRateByReportingCodeService`, which
//! this catalog is a direct Rust counterpart of: same four required
//! categories, same `round(..., 5)` semantics (here `ROUND_HALF_UP` via
//! [`rust_decimal`], matching Python's `round()` tie-breaking for the
//! positive rates this catalog holds).

use std::collections::HashMap;

use geo_tax_models::error::ValidationError;
use geo_tax_models::normalize_reporting_code;
use geo_tax_models::tax::{JurisdictionRateItem, JurisdictionsPayload, TaxRateBreakdown};
use rust_decimal::{Decimal, RoundingStrategy};

const RATE_SCALE: u32 = 5;

fn round_rate(value: f64) -> Decimal {
    Decimal::from_f64_retain(value)
        .unwrap_or(Decimal::ZERO)
        .round_dp_with_strategy(RATE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

fn sum_category(items: &[JurisdictionRateItem]) -> Decimal {
    items.iter().map(|item| round_rate(item.rate)).sum()
}

/// The validated, load-once Tax-Rate Catalog.
pub struct TaxRateCatalog {
    rates_by_code: HashMap<String, JurisdictionsPayload>,
}

impl TaxRateCatalog {
    /// Parses a raw JSON payload (reporting code -> four-category rate
    /// object) into a validated catalog.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRatePayload`] if the JSON root
    /// is not an object, a code normalizes to empty, or any entry is
    /// missing one of the four required categories.
    pub fn from_json(raw: &serde_json::Value) -> Result<Self, ValidationError> {
        let root = raw
            .as_object()
            .ok_or_else(|| ValidationError::InvalidRatePayload("root must be a JSON object".to_string()))?;

        let mut rates_by_code = HashMap::with_capacity(root.len());
        for (raw_code, raw_payload) in root {
            let code = normalize_reporting_code(raw_code)?;
            let payload = parse_jurisdictions_payload(raw_payload, &code)?;
            rates_by_code.insert(code, payload);
        }

        Ok(Self { rates_by_code })
    }

    /// Looks up the rate breakdown for a reporting code, normalizing it
    /// first. Returns `None` if the catalog has no entry for it (the
    /// caller maps this to `tax_rate_not_found`).
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if `reporting_code` fails
    /// normalization (empty or over-length).
    pub fn lookup(&self, reporting_code: &str) -> Result<Option<TaxRateBreakdown>, ValidationError> {
        let code = normalize_reporting_code(reporting_code)?;
        let Some(payload) = self.rates_by_code.get(&code) else {
            return Ok(None);
        };

        let state_rate = sum_category(&payload.state_rate).round_dp_with_strategy(
            RATE_SCALE,
            RoundingStrategy::MidpointAwayFromZero,
        );
        let county_rate = sum_category(&payload.county_rate).round_dp_with_strategy(
            RATE_SCALE,
            RoundingStrategy::MidpointAwayFromZero,
        );
        let city_rate = sum_category(&payload.city_rate).round_dp_with_strategy(
            RATE_SCALE,
            RoundingStrategy::MidpointAwayFromZero,
        );
        let special_rates = sum_category(&payload.special_rates).round_dp_with_strategy(
            RATE_SCALE,
            RoundingStrategy::MidpointAwayFromZero,
        );
        let composite_tax_rate = (state_rate + county_rate + city_rate + special_rates)
            .round_dp_with_strategy(RATE_SCALE, RoundingStrategy::MidpointAwayFromZero);

        Ok(Some(TaxRateBreakdown {
            reporting_code: code,
            jurisdictions: payload.clone(),
            state_rate,
            county_rate,
            city_rate,
            special_rates,
            composite_tax_rate,
        }))
    }

    /// Number of reporting codes held in this catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rates_by_code.len()
    }

    /// Returns `true` if the catalog has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rates_by_code.is_empty()
    }
}

const CATEGORIES: [&str; 4] = ["state_rate", "county_rate", "city_rate", "special_rates"];

fn parse_jurisdictions_payload(
    raw: &serde_json::Value,
    code: &str,
) -> Result<JurisdictionsPayload, ValidationError> {
    let root = raw.as_object().ok_or_else(|| {
        ValidationError::InvalidRatePayload(format!("rate payload for {code} must be an object"))
    })?;

    let unknown: Vec<&str> = root
        .keys()
        .map(String::as_str)
        .filter(|key| !CATEGORIES.contains(key))
        .collect();
    if !unknown.is_empty() {
        return Err(ValidationError::InvalidRatePayload(format!(
            "rate payload for {code} has unknown categories: {}",
            unknown.join(", ")
        )));
    }

    for category in CATEGORIES {
        if !root.contains_key(category) {
            return Err(ValidationError::InvalidRatePayload(format!(
                "rate payload for {code} is missing required category '{category}'"
            )));
        }
    }

    serde_json::from_value(raw.clone()).map_err(|err| {
        ValidationError::InvalidRatePayload(format!("rate payload for {code} is malformed: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_payload() -> serde_json::Value {
        json!({
            "36": {
                "state_rate": [{ "name": "New York State", "rate": 0.04 }],
                "county_rate": [{ "name": "Sample County", "rate": 0.01875 }],
                "city_rate": [],
                "special_rates": [{ "name": "MCTD", "rate": 0.00375 }]
            }
        })
    }

    #[test]
    fn normalizes_and_looks_up_short_numeric_codes() {
        let catalog = TaxRateCatalog::from_json(&sample_payload()).unwrap();
        let breakdown = catalog.lookup("36").unwrap().unwrap();
        assert_eq!(breakdown.reporting_code, "0036");
        assert_eq!(breakdown.composite_tax_rate, Decimal::new(625, 4));
    }

    #[test]
    fn missing_code_returns_none() {
        let catalog = TaxRateCatalog::from_json(&sample_payload()).unwrap();
        assert!(catalog.lookup("9999").unwrap().is_none());
    }

    #[test]
    fn rejects_payload_missing_a_required_category() {
        let raw = json!({ "36": { "state_rate": [] } });
        let err = TaxRateCatalog::from_json(&raw).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidRatePayload(_)));
    }

    #[test]
    fn rejects_payload_with_an_unknown_category() {
        let raw = json!({
            "36": {
                "state_rate": [],
                "county_rate": [],
                "city_rate": [],
                "special_rates": [],
                "district_rate": []
            }
        });
        let err = TaxRateCatalog::from_json(&raw).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidRatePayload(_)));
    }

    #[test]
    fn rejects_non_object_root() {
        let raw = json!([1, 2, 3]);
        let err = TaxRateCatalog::from_json(&raw).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidRatePayload(_)));
    }
}
