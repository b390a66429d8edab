//! The flat columnar polygon dataset: no per-polygon `Vec` allocation,
//! no indirection through a `Box<dyn Geometry>` — every polygon's rings
//! are slices into one shared points array. This is the layout the
//! performance contract (spec §4.1) demands for batch point-in-polygon
//! lookup over tens of thousands of candidate polygons.

use geo_tax_models::polygon::{Bbox, RegionPolygon};

use crate::pointinpoly::point_in_shape;

/// An immutable, build-once index over one jurisdiction tier (cities or
/// counties). Polygon order is preserved from construction, so
/// first-match-wins tie-breaking falls out of a plain linear scan.
pub struct PolygonDataset {
    bboxes: Vec<Bbox>,
    reporting_codes: Vec<String>,
    /// One entry per polygon: `(start, count)` into `ring_offsets`.
    polygon_rings: Vec<(usize, usize)>,
    /// One entry per ring: `(start, count)` into `points`.
    ring_offsets: Vec<(usize, usize)>,
    points: Vec<(f64, f64)>,
}

impl PolygonDataset {
    /// Builds the dataset from a sequence of Region Polygons, preserving
    /// their order. Polygons that fail [`RegionPolygon::is_well_formed`]
    /// are skipped rather than rejected (spec §4.1, "Failures").
    #[must_use]
    pub fn build(polygons: &[RegionPolygon]) -> Self {
        let mut bboxes = Vec::new();
        let mut reporting_codes = Vec::new();
        let mut polygon_rings = Vec::new();
        let mut ring_offsets = Vec::new();
        let mut points = Vec::new();

        for polygon in polygons {
            if !polygon.is_well_formed() {
                log::warn!(
                    "skipping malformed region polygon for reporting code {}",
                    polygon.reporting_code
                );
                continue;
            }

            let rings_start = ring_offsets.len();
            let mut starts = polygon.part_starts.clone();
            starts.push(polygon.points.len());
            for window in starts.windows(2) {
                let (start, end) = (window[0], window[1]);
                let points_start = points.len();
                points.extend_from_slice(&polygon.points[start..end]);
                ring_offsets.push((points_start, end - start));
            }
            let rings_count = ring_offsets.len() - rings_start;

            bboxes.push(polygon.bbox);
            reporting_codes.push(polygon.reporting_code.clone());
            polygon_rings.push((rings_start, rings_count));
        }

        Self {
            bboxes,
            reporting_codes,
            polygon_rings,
            ring_offsets,
            points,
        }
    }

    /// Returns the reporting code of the first polygon (in insertion
    /// order) whose bounding box and ring set both contain `(x, y)`.
    #[must_use]
    pub fn find_first_match(&self, x: f64, y: f64) -> Option<&str> {
        for (index, bbox) in self.bboxes.iter().enumerate() {
            if !bbox.contains(x, y) {
                continue;
            }

            let (rings_start, rings_count) = self.polygon_rings[index];
            let ring_offsets = &self.ring_offsets[rings_start..rings_start + rings_count];

            if point_in_shape(&self.points, ring_offsets, x, y) {
                return Some(&self.reporting_codes[index]);
            }
        }
        None
    }

    /// Number of well-formed polygons held in this dataset.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bboxes.len()
    }

    /// Returns `true` if this dataset holds no polygons.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bboxes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_tax_models::RegionType;

    fn square(code: &str, min: f64, max: f64) -> RegionPolygon {
        RegionPolygon {
            region_type: RegionType::City,
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
    fn skips_malformed_polygons_without_panicking() {
        let degenerate = RegionPolygon {
            region_type: RegionType::City,
            reporting_code: "BAD".to_string(),
            bbox: Bbox {
                min_x: 0.0,
                min_y: 0.0,
                max_x: 1.0,
                max_y: 1.0,
            },
            points: vec![(0.0, 0.0), (1.0, 1.0)],
            part_starts: vec![0],
        };
        let dataset = PolygonDataset::build(&[degenerate]);
        assert!(dataset.is_empty());
        assert_eq!(dataset.find_first_match(0.5, 0.5), None);
    }

    #[test]
    fn finds_first_matching_polygon_in_order() {
        let polygons = vec![square("A", 0.0, 10.0), square("B", 5.0, 15.0)];
        let dataset = PolygonDataset::build(&polygons);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.find_first_match(7.0, 7.0), Some("A"));
        assert_eq!(dataset.find_first_match(12.0, 12.0), Some("B"));
        assert_eq!(dataset.find_first_match(50.0, 50.0), None);
    }
}
