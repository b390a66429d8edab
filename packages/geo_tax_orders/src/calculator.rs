//! The Order Calculator: resolves a coordinate and subtotal into a full
//! computed payload, ported from `services/orders/calculator.py`'s
//! `compute_order_values`.

use chrono::{DateTime, Utc};
use geo_tax_cache::{CacheStore, TaxRateCache};
use geo_tax_models::error::{OrderError, ValidationError};
use geo_tax_models::order::OrderComputedPayload;
use geo_tax_rates::TaxRateCatalog;
use geo_tax_resolver::ReportingCodeResolver;
use rust_decimal::{Decimal, RoundingStrategy};

const MONEY_SCALE: u32 = 2;
const RATE_SCALE: u32 = 5;

fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

fn round_rate(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(RATE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Resolves `(lat, lon)` to a jurisdiction, looks up its rate
/// breakdown, and derives every money/rate field an [`OrderComputedPayload`]
/// carries.
///
/// # Errors
///
/// Returns [`OrderError::Validation`] for an out-of-range coordinate or
/// negative subtotal (the caller is expected to have already validated
/// the subtotal sign and timestamp via the CSV Row Parser; this
/// function re-derives nothing it was already given),
/// [`OrderError::OutsideCoverage`] if the point resolves to no
/// jurisdiction, and [`OrderError::RateNotFound`] if the resolved
/// reporting code has no catalog entry.
pub fn compute_order_values<S: CacheStore>(
    latitude: f64,
    longitude: f64,
    timestamp: DateTime<Utc>,
    subtotal_raw: Decimal,
    resolver: &ReportingCodeResolver,
    cache: &TaxRateCache<S>,
    catalog: &TaxRateCatalog,
) -> Result<OrderComputedPayload, OrderError> {
    if subtotal_raw.is_sign_negative() {
        return Err(OrderError::Validation(ValidationError::NegativeSubtotal {
            subtotal: subtotal_raw.to_string(),
        }));
    }

    let reporting_code = match resolver.resolve(latitude, longitude) {
        Ok(code) => code,
        Err(geo_tax_resolver::ResolverErrorOrValidation::Validation(err)) => {
            return Err(OrderError::Validation(err));
        }
        Err(err) => return Err(OrderError::Unexpected(err.to_string())),
    }
    .ok_or(OrderError::OutsideCoverage)?;

    let rates = cache
        .lookup(catalog, &reporting_code)?
        .ok_or_else(|| OrderError::RateNotFound(reporting_code.clone()))?;

    let subtotal = round_money(subtotal_raw);
    let composite_tax_rate = round_rate(rates.composite_tax_rate);
    let tax_amount = round_money(subtotal * composite_tax_rate);
    let total_amount = round_money(subtotal + tax_amount);

    Ok(OrderComputedPayload {
        latitude,
        longitude,
        timestamp,
        subtotal,
        reporting_code: rates.reporting_code,
        jurisdictions: rates.jurisdictions,
        composite_tax_rate,
        state_rate: round_rate(rates.state_rate),
        county_rate: round_rate(rates.county_rate),
        city_rate: round_rate(rates.city_rate),
        special_rates: round_rate(rates.special_rates),
        tax_amount,
        total_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use geo_tax_cache::MemoryCacheStore;
    use geo_tax_models::RegionType;
    use geo_tax_models::polygon::{Bbox, RegionPolygon};
    use serde_json::json;

    fn resolver_with_one_city() -> ReportingCodeResolver {
        let city = RegionPolygon {
            region_type: RegionType::City,
            reporting_code: "0036".to_string(),
            bbox: Bbox {
                min_x: -75.0,
                min_y: 40.0,
                max_x: -73.0,
                max_y: 41.0,
            },
            points: vec![
                (-75.0, 40.0),
                (-73.0, 40.0),
                (-73.0, 41.0),
                (-75.0, 41.0),
            ],
            part_starts: vec![0],
        };
        ReportingCodeResolver::new(&[city], &[], "EPSG:4326", "EPSG:4326").unwrap()
    }

    fn catalog_with_rate() -> TaxRateCatalog {
        TaxRateCatalog::from_json(&json!({
            "0036": {
                "state_rate": [{ "name": "New York State", "rate": 0.04 }],
                "county_rate": [],
                "city_rate": [{ "name": "Sample City", "rate": 0.02 }],
                "special_rates": []
            }
        }))
        .unwrap()
    }

    #[test]
    fn computes_tax_and_total_for_a_covered_point() {
        let resolver = resolver_with_one_city();
        let catalog = catalog_with_rate();
        let cache = TaxRateCache::new(MemoryCacheStore::default());
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        let result = compute_order_values(
            40.5,
            -74.0,
            ts,
            Decimal::new(10000, 2),
            &resolver,
            &cache,
            &catalog,
        )
        .unwrap();

        assert_eq!(result.reporting_code, "0036");
        assert_eq!(result.composite_tax_rate, Decimal::new(6000, 5));
        assert_eq!(result.tax_amount, Decimal::new(600, 2));
        assert_eq!(result.total_amount, Decimal::new(10600, 2));
    }

    #[test]
    fn reports_outside_coverage_for_an_uncovered_point() {
        let resolver = resolver_with_one_city();
        let catalog = catalog_with_rate();
        let cache = TaxRateCache::new(MemoryCacheStore::default());
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        let err = compute_order_values(
            10.0,
            10.0,
            ts,
            Decimal::new(10000, 2),
            &resolver,
            &cache,
            &catalog,
        )
        .unwrap_err();
        assert!(matches!(err, OrderError::OutsideCoverage));
    }

    #[test]
    fn reports_rate_not_found_for_a_covered_point_with_no_catalog_entry() {
        let resolver = resolver_with_one_city();
        let catalog = TaxRateCatalog::from_json(&json!({})).unwrap();
        let cache = TaxRateCache::new(MemoryCacheStore::default());
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        let err = compute_order_values(
            40.5,
            -74.0,
            ts,
            Decimal::new(10000, 2),
            &resolver,
            &cache,
            &catalog,
        )
        .unwrap_err();
        assert!(matches!(err, OrderError::RateNotFound(code) if code == "0036"));
    }
}
