//! The Region Polygon data model (spec. Data Model, "Region Polygon").
//!
//! A region polygon is immutable once constructed and stores its ring
//! structure as a flat point sequence plus ring-start offsets, matching
//! the `points`/`parts` JSON columns the database persists them under
//! (so the in-memory resolver index can be rebuilt at startup without
//! re-parsing shapefiles).

use serde::{Deserialize, Serialize};

use crate::RegionType;

/// An axis-aligned bounding box in the resolver's projected CRS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bbox {
    /// Minimum x (easting).
    pub min_x: f64,
    /// Minimum y (northing).
    pub min_y: f64,
    /// Maximum x (easting).
    pub max_x: f64,
    /// Maximum y (northing).
    pub max_y: f64,
}

impl Bbox {
    /// Returns `true` if `(x, y)` falls within this box (inclusive).
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// A single tax jurisdiction's polygon, as read from (or written to) the
/// `tax_regions` table.
///
/// `points` is a flat sequence of `(x, y)` pairs in the resolver's
/// projected CRS; `part_starts` holds the index into `points` where each
/// ring begins (the final ring implicitly ends at `points.len()`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionPolygon {
    /// City or county tier.
    pub region_type: RegionType,
    /// Normalized reporting code this polygon resolves to.
    pub reporting_code: String,
    /// Bounding box in projected coordinates, used to reject candidates
    /// before running the ring-level point-in-polygon test.
    pub bbox: Bbox,
    /// Flat `(x, y)` point sequence covering every ring, in order.
    pub points: Vec<(f64, f64)>,
    /// Start index into `points` of each ring.
    pub part_starts: Vec<usize>,
}

impl RegionPolygon {
    /// Returns `false` if this polygon is structurally corrupt: an empty
    /// part table, or any ring with fewer than 3 points. Corrupt
    /// polygons are skipped at index-build time rather than rejected at
    /// load time (spec §4.1, "Failures").
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        if self.part_starts.is_empty() {
            return false;
        }
        let mut starts = self.part_starts.clone();
        starts.push(self.points.len());
        starts.windows(2).all(|w| w[1] >= w[0] + 3)
    }
}
