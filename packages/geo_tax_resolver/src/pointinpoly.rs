//! Even-odd (ray-casting) point-in-polygon test with an edge-inclusion
//! short-circuit, ported from `_point_in_shape`/`_point_on_segment` in
//! the source implementation's `services/tax/reporting_code.py`.
//!
//! A point exactly on a ring edge counts as inside: the on-segment test
//! runs first in every loop iteration and short-circuits the whole
//! point-in-shape call, before the crossing-count update for that edge
//! ever runs.

const EPS: f64 = 1e-12;

/// Returns `true` if `(px, py)` lies on the closed segment `(ax, ay)`-`(bx, by)`,
/// within `EPS` of both the bounding box and the cross-product collinearity test.
fn point_on_segment(px: f64, py: f64, ax: f64, ay: f64, bx: f64, by: f64) -> bool {
    let min_x = ax.min(bx) - EPS;
    let max_x = ax.max(bx) + EPS;
    let min_y = ay.min(by) - EPS;
    let max_y = ay.max(by) + EPS;
    if px < min_x || px > max_x || py < min_y || py > max_y {
        return false;
    }

    let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
    cross.abs() <= EPS
}

/// Counts ring crossings for one ring (a flat point slice, implicitly
/// closed from the last point back to the first), setting `on_boundary`
/// if the point lies exactly on an edge.
///
/// Returns `(crossings, on_boundary)`. Callers should stop entirely as
/// soon as `on_boundary` is `true`.
fn ring_crossings(ring: &[(f64, f64)], x: f64, y: f64) -> (u32, bool) {
    let mut crossings = 0u32;
    let n = ring.len();
    for i in 0..n {
        let (ax, ay) = ring[i];
        let (bx, by) = ring[(i + 1) % n];

        if point_on_segment(x, y, ax, ay, bx, by) {
            return (crossings, true);
        }

        let straddles = (ay > y) != (by > y);
        if straddles {
            let x_intersect = ax + (y - ay) / (by - ay) * (bx - ax);
            if x < x_intersect {
                crossings += 1;
            }
        }
    }
    (crossings, false)
}

/// Tests whether `(x, y)` falls inside a multi-ring polygon using
/// even-odd parity across rings (so a point inside an outer ring but
/// also inside a hole ring is excluded).
///
/// `points` is the polygon's whole flat point buffer; `ring_offsets`
/// gives each ring's `(start, count)` span into `points`. Rings are
/// sliced directly off `points` with no intermediate allocation, so
/// this can sit in the per-point hot loop.
#[must_use]
pub fn point_in_shape(points: &[(f64, f64)], ring_offsets: &[(usize, usize)], x: f64, y: f64) -> bool {
    let mut inside = false;
    for &(start, count) in ring_offsets {
        let ring = &points[start..start + count];
        let (crossings, on_boundary) = ring_crossings(ring, x, y);
        if on_boundary {
            return true;
        }
        if crossings % 2 == 1 {
            inside = !inside;
        }
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &[(f64, f64)] = &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];
    const SQUARE_RING: &[(usize, usize)] = &[(0, 4)];

    #[test]
    fn interior_point_is_inside() {
        assert!(point_in_shape(SQUARE, SQUARE_RING, 5.0, 5.0));
    }

    #[test]
    fn exterior_point_is_outside() {
        assert!(!point_in_shape(SQUARE, SQUARE_RING, 50.0, 50.0));
    }

    #[test]
    fn point_on_edge_is_inside() {
        assert!(point_in_shape(SQUARE, SQUARE_RING, 10.0, 5.0));
        assert!(point_in_shape(SQUARE, SQUARE_RING, 0.0, 0.0));
    }

    #[test]
    fn hole_excludes_interior_point() {
        let square_and_hole: &[(f64, f64)] = &[
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (0.0, 10.0),
            (3.0, 3.0),
            (7.0, 3.0),
            (7.0, 7.0),
            (3.0, 7.0),
        ];
        let rings: &[(usize, usize)] = &[(0, 4), (4, 4)];
        assert!(!point_in_shape(square_and_hole, rings, 5.0, 5.0));
        assert!(point_in_shape(square_and_hole, rings, 1.0, 1.0));
    }
}
