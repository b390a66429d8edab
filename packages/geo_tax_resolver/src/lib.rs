#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! The Reporting-Code Resolver: an in-memory point-in-polygon index over
//! a two-layer (cities -> counties) jurisdiction hierarchy with CRS
//! reprojection and batch lookup.
//!
//! The point-in-polygon engine is grounded on the native acceleration
//! layer of the source implementation
//! (`services/tax/reporting_code.py` / `native/geozone.py`): a flat
//! columnar dataset (bbox array, per-polygon point/part offsets, flat
//! point and part-offset arrays) so the tight query loop has no
//! indirection and no per-polygon allocation, per the performance
//! contract.

pub mod bootstrap;
mod dataset;
mod pointinpoly;

pub use dataset::PolygonDataset;
use geo_tax_models::error::ValidationError;
use geo_tax_models::polygon::RegionPolygon;
use proj::Proj;

/// Errors the resolver can raise during construction.
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    /// The source or target CRS could not be resolved by PROJ.
    #[error("failed to build CRS transform {from} -> {to}: {source}")]
    Crs {
        /// Source CRS identifier, e.g. `EPSG:4326`.
        from: String,
        /// Target CRS identifier, e.g. `EPSG:26918`.
        to: String,
        /// Underlying PROJ error.
        source: proj::ProjCreateError,
    },

    /// A coordinate could not be reprojected.
    #[error("failed to reproject ({lon}, {lat}): {source}")]
    Transform {
        /// Input longitude.
        lon: f64,
        /// Input latitude.
        lat: f64,
        /// Underlying PROJ error.
        source: proj::ProjError,
    },
}

/// Geographic coordinate bounds: `lat in [-90, 90]`, `lon in [-180, 180]`,
/// both finite.
fn validate_coordinates(lat: f64, lon: f64) -> Result<(), ValidationError> {
    if !lat.is_finite()
        || !lon.is_finite()
        || !(-90.0..=90.0).contains(&lat)
        || !(-180.0..=180.0).contains(&lon)
    {
        return Err(ValidationError::CoordinateOutOfRange { lat, lon });
    }
    Ok(())
}

/// Maps `(lat, lon)` to a reporting code using a two-tier (city, then
/// county) polygon hierarchy. Immutable and thread-safe once built: the
/// polygon dataset is never mutated after construction, so lookups need
/// no synchronization (spec §5, "Shared resources").
pub struct ReportingCodeResolver {
    cities: PolygonDataset,
    counties: PolygonDataset,
    transform: Proj,
}

impl ReportingCodeResolver {
    /// Builds a resolver from two ordered sequences of Region Polygons.
    ///
    /// Polygon order is part of the contract: when tiers overlap, the
    /// earlier polygon in insertion order wins (spec §4.1, "Tie-breaks").
    /// Corrupt polygons (empty part table, ring with fewer than 3
    /// points) are skipped rather than rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Crs`] if `source_crs`/`target_crs` are
    /// not resolvable by PROJ.
    pub fn new(
        cities: &[RegionPolygon],
        counties: &[RegionPolygon],
        source_crs: &str,
        target_crs: &str,
    ) -> Result<Self, ResolverError> {
        let transform =
            Proj::new_known_crs(source_crs, target_crs, None).map_err(|source| ResolverError::Crs {
                from: source_crs.to_string(),
                to: target_crs.to_string(),
                source,
            })?;

        Ok(Self {
            cities: PolygonDataset::build(cities),
            counties: PolygonDataset::build(counties),
            transform,
        })
    }

    /// Resolves a single coordinate to a reporting code, or `None` if
    /// the point falls outside all known jurisdictions.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::CoordinateOutOfRange`] if the
    /// coordinate is out of bounds, or [`ResolverError::Transform`] if
    /// reprojection fails.
    pub fn resolve(&self, lat: f64, lon: f64) -> Result<Option<String>, ResolverErrorOrValidation> {
        validate_coordinates(lat, lon)?;
        let (x, y) = self
            .transform
            .convert((lon, lat))
            .map_err(|source| ResolverError::Transform { lon, lat, source })?;

        if let Some(code) = self.cities.find_first_match(x, y) {
            return Ok(Some(code.to_string()));
        }
        Ok(self.counties.find_first_match(x, y).map(str::to_string))
    }

    /// Resolves many coordinates in one call, preserving input order.
    ///
    /// Uses a single batched CRS transform call and reuses the native
    /// polygon index for the inner loop, per the performance contract
    /// in spec §4.1.
    ///
    /// # Errors
    ///
    /// Returns an error for the first coordinate that fails validation
    /// or reprojection; callers that need per-row error isolation
    /// should validate rows individually before batching (the Import
    /// Executor's CSV Row Parser already does this upstream).
    pub fn resolve_batch(
        &self,
        coords: &[(f64, f64)],
    ) -> Result<Vec<Option<String>>, ResolverErrorOrValidation> {
        let mut projected = Vec::with_capacity(coords.len());
        for &(lat, lon) in coords {
            validate_coordinates(lat, lon)?;
            let (x, y) = self
                .transform
                .convert((lon, lat))
                .map_err(|source| ResolverError::Transform { lon, lat, source })?;
            projected.push((x, y));
        }

        Ok(projected
            .into_iter()
            .map(|(x, y)| {
                self.cities
                    .find_first_match(x, y)
                    .or_else(|| self.counties.find_first_match(x, y))
                    .map(str::to_string)
            })
            .collect())
    }
}

/// Combines [`ValidationError`] and [`ResolverError`] so `resolve`/
/// `resolve_batch` can return a single error type without a manual enum
/// at every call site.
#[derive(Debug, thiserror::Error)]
pub enum ResolverErrorOrValidation {
    /// See [`ValidationError`].
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// See [`ResolverError`].
    #[error(transparent)]
    Resolver(#[from] ResolverError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_tax_models::RegionType;
    use geo_tax_models::polygon::Bbox;

    fn square(region_type: RegionType, code: &str, min: f64, max: f64) -> RegionPolygon {
        RegionPolygon {
            region_type,
            reporting_code: code.to_string(),
            bbox: Bbox {
                min_x: min,
                min_y: min,
                max_x: max,
                max_y: max,
            },
            points: vec![(min, min), (max, min), (max, max), (min, max)],
            part_starts: vec![0],
        }
    }

    #[test]
    fn city_wins_over_overlapping_county() {
        let cities = vec![square(RegionType::City, "CITY", 0.0, 10.0)];
        let counties = vec![square(RegionType::County, "COUNTY", 0.0, 10.0)];
        let resolver =
            ReportingCodeResolver::new(&cities, &counties, "EPSG:4326", "EPSG:4326").unwrap();
        // identity transform: (lat, lon) maps to PROJ's (x=lon, y=lat).
        let result = resolver.resolve(5.0, 5.0).unwrap();
        assert_eq!(result.as_deref(), Some("CITY"));
    }

    #[test]
    fn falls_back_to_county_outside_any_city() {
        let cities = vec![square(RegionType::City, "CITY", 0.0, 1.0)];
        let counties = vec![square(RegionType::County, "COUNTY", 0.0, 10.0)];
        let resolver =
            ReportingCodeResolver::new(&cities, &counties, "EPSG:4326", "EPSG:4326").unwrap();
        let result = resolver.resolve(5.0, 5.0).unwrap();
        assert_eq!(result.as_deref(), Some("COUNTY"));
    }

    #[test]
    fn returns_none_outside_all_coverage() {
        let cities = vec![square(RegionType::City, "CITY", 0.0, 1.0)];
        let counties = vec![square(RegionType::County, "COUNTY", 0.0, 1.0)];
        let resolver =
            ReportingCodeResolver::new(&cities, &counties, "EPSG:4326", "EPSG:4326").unwrap();
        let result = resolver.resolve(50.0, 50.0).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn first_insertion_order_wins_among_overlapping_cities() {
        let cities = vec![
            square(RegionType::City, "FIRST", 0.0, 10.0),
            square(RegionType::City, "SECOND", 5.0, 15.0),
        ];
        let resolver =
            ReportingCodeResolver::new(&cities, &[], "EPSG:4326", "EPSG:4326").unwrap();
        let result = resolver.resolve(7.0, 7.0).unwrap();
        assert_eq!(result.as_deref(), Some("FIRST"));
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let resolver = ReportingCodeResolver::new(&[], &[], "EPSG:4326", "EPSG:4326").unwrap();
        let err = resolver.resolve(200.0, 0.0).unwrap_err();
        assert!(matches!(
            err,
            ResolverErrorOrValidation::Validation(ValidationError::CoordinateOutOfRange { .. })
        ));
    }

    #[test]
    fn point_on_edge_resolves_to_city_not_county() {
        let cities = vec![square(RegionType::City, "CITY", 0.0, 10.0)];
        let counties = vec![square(RegionType::County, "COUNTY", 0.0, 20.0)];
        let resolver =
            ReportingCodeResolver::new(&cities, &counties, "EPSG:4326", "EPSG:4326").unwrap();
        // (10.0, 5.0) lies exactly on the right edge of the city square.
        let result = resolver.resolve(5.0, 10.0).unwrap();
        assert_eq!(result.as_deref(), Some("CITY"));
    }
}
