//! First-start region seeding from shapefile-derived GeoJSON, folding
//! the teacher's boundary-ingest module shape directly into the
//! resolver crate rather than keeping it as a standalone multi-source
//! geography pipeline.
//!
//! Consumes plain `serde_json::Value` GeoJSON rather than a dedicated
//! GeoJSON crate, matching the teacher's own boundary-ingest code,
//! which also parses coordinate arrays out of raw JSON.

use geo_tax_models::RegionType;
use geo_tax_models::normalize_reporting_code;
use geo_tax_models::polygon::{Bbox, RegionPolygon};

/// Errors that can occur while parsing a seed GeoJSON file.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// The file could not be read from disk.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file was not valid JSON.
    #[error("failed to parse {path} as JSON: {source}")]
    Json {
        /// Path that failed to parse.
        path: String,
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// The document was not a GeoJSON `FeatureCollection`.
    #[error("{path} is not a GeoJSON FeatureCollection")]
    NotAFeatureCollection {
        /// Path of the offending file.
        path: String,
    },
}

/// Loads region polygons from a GeoJSON `FeatureCollection` file.
///
/// Each feature's `properties.reporting_code` (or `properties.GEOID` as
/// a fallback) supplies the jurisdiction code; geometry must be
/// `Polygon` or `MultiPolygon` in `EPSG:4326` lon/lat coordinates.
/// Features missing a usable reporting code, or with a geometry type
/// other than `Polygon`/`MultiPolygon`, are skipped with a warning
/// rather than aborting the whole file, mirroring the resolver's own
/// "corrupt polygon is skipped" contract (spec §4.1, "Failures").
///
/// # Errors
///
/// Returns [`BootstrapError`] if the file cannot be read or does not
/// parse as a GeoJSON `FeatureCollection`.
pub fn load_region_polygons(
    path: &std::path::Path,
    region_type: RegionType,
) -> Result<Vec<RegionPolygon>, BootstrapError> {
    let raw = std::fs::read_to_string(path).map_err(|source| BootstrapError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let doc: serde_json::Value =
        serde_json::from_str(&raw).map_err(|source| BootstrapError::Json {
            path: path.display().to_string(),
            source,
        })?;

    let features = doc
        .get("features")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| BootstrapError::NotAFeatureCollection {
            path: path.display().to_string(),
        })?;

    let mut polygons = Vec::with_capacity(features.len());
    for (index, feature) in features.iter().enumerate() {
        match feature_to_polygon(feature, region_type) {
            Some(polygon) => polygons.push(polygon),
            None => log::warn!(
                "skipping feature {index} in {}: missing reporting code or unsupported geometry",
                path.display()
            ),
        }
    }

    log::info!(
        "loaded {} {region_type:?} polygons from {}",
        polygons.len(),
        path.display()
    );
    Ok(polygons)
}

fn feature_to_polygon(
    feature: &serde_json::Value,
    region_type: RegionType,
) -> Option<RegionPolygon> {
    let raw_code = feature
        .get("properties")?
        .get("reporting_code")
        .or_else(|| feature.get("properties")?.get("GEOID"))
        .and_then(serde_json::Value::as_str)?;
    let reporting_code = normalize_reporting_code(raw_code).ok()?;

    let geometry = feature.get("geometry")?;
    let geometry_type = geometry.get("type")?.as_str()?;
    let coordinates = geometry.get("coordinates")?;

    let rings: Vec<Vec<(f64, f64)>> = match geometry_type {
        "Polygon" => parse_polygon_rings(coordinates)?,
        "MultiPolygon" => coordinates
            .as_array()?
            .iter()
            .map(parse_polygon_rings)
            .collect::<Option<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect(),
        _ => return None,
    };

    if rings.is_empty() || rings.iter().any(|ring| ring.len() < 3) {
        return None;
    }

    let mut points = Vec::new();
    let mut part_starts = Vec::with_capacity(rings.len());
    for ring in rings {
        part_starts.push(points.len());
        points.extend(ring);
    }

    let bbox = bounding_box(&points)?;

    Some(RegionPolygon {
        region_type,
        reporting_code,
        bbox,
        points,
        part_starts,
    })
}

/// Parses a GeoJSON `Polygon`'s `coordinates` array (a list of linear
/// rings, each a list of `[lon, lat]` pairs) into flat `(lon, lat)`
/// rings. The closing point (equal to the first) is dropped if present.
fn parse_polygon_rings(coordinates: &serde_json::Value) -> Option<Vec<Vec<(f64, f64)>>> {
    coordinates
        .as_array()?
        .iter()
        .map(|ring| {
            let mut points: Vec<(f64, f64)> = ring
                .as_array()?
                .iter()
                .map(|pair| {
                    let pair = pair.as_array()?;
                    let lon = pair.first()?.as_f64()?;
                    let lat = pair.get(1)?.as_f64()?;
                    Some((lon, lat))
                })
                .collect::<Option<Vec<_>>>()?;
            if points.len() > 1 && points.first() == points.last() {
                points.pop();
            }
            Some(points)
        })
        .collect()
}

fn bounding_box(points: &[(f64, f64)]) -> Option<Bbox> {
    let mut iter = points.iter();
    let &(first_x, first_y) = iter.next()?;
    let mut bbox = Bbox {
        min_x: first_x,
        min_y: first_y,
        max_x: first_x,
        max_y: first_y,
    };
    for &(x, y) in iter {
        bbox.min_x = bbox.min_x.min(x);
        bbox.min_y = bbox.min_y.min(y);
        bbox.max_x = bbox.max_x.max(x);
        bbox.max_y = bbox.max_y.max(y);
    }
    Some(bbox)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp_geojson(contents: &str) -> tempfile_path::TempPath {
        tempfile_path::TempPath::with_contents(contents)
    }

    /// Minimal scoped temp-file helper so this crate does not take on a
    /// `tempfile` dependency just for two tests.
    mod tempfile_path {
        use std::io::Write as _;

        pub struct TempPath(std::path::PathBuf);

        impl TempPath {
            pub fn with_contents(contents: &str) -> Self {
                let path = std::env::temp_dir().join(format!(
                    "geo_tax_resolver_bootstrap_test_{}.geojson",
                    std::process::id()
                ));
                let mut file = std::fs::File::create(&path).unwrap();
                file.write_all(contents.as_bytes()).unwrap();
                Self(path)
            }
        }

        impl std::ops::Deref for TempPath {
            type Target = std::path::Path;
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl Drop for TempPath {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.0);
            }
        }
    }

    #[test]
    fn parses_a_polygon_feature_collection() {
        let geojson = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"reporting_code": "36"},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]]]
                    }
                }
            ]
        }"#;
        let path = write_temp_geojson(geojson);
        let polygons = load_region_polygons(&path, RegionType::City).unwrap();
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].reporting_code, "0036");
        assert_eq!(polygons[0].part_starts, vec![0]);
        assert_eq!(polygons[0].points.len(), 4);
    }

    #[test]
    fn skips_features_without_a_reporting_code() {
        let geojson = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]]]
                    }
                }
            ]
        }"#;
        let path = write_temp_geojson(geojson);
        let polygons = load_region_polygons(&path, RegionType::City).unwrap();
        assert!(polygons.is_empty());
    }
}
