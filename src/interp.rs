use crate::types::{Point, Value};

// Return the interpolation factor t corresponding to iso_val
#[inline]
pub fn find_t(v0: Value, v1: Value, iso_val: Value) -> Value {
    (iso_val - v0) / (v1 - v0)
}

// Linearly interpolate between two points by factor t
#[inline]
pub fn interpolate_points(p0: Point, p1: Point, t: Value) -> Point {
    p0 + (p1 - p0) * t
}

/// Lexicographic `p < q` on (x, y, z).
#[inline]
fn precedes(p: &Point, q: &Point) -> bool {
    (p.x, p.y, p.z) < (q.x, q.y, q.z)
}

/// Finds where the field crosses `iso` along the edge `p0`–`p1`.
///
/// The endpoints are put in lexicographic order first, so an edge shared by
/// neighbouring cells yields the bit-identical point whichever cell asks.
///
/// When the two values are within `tol` of each other the crossing is not
/// interpolated: the position of the endpoint with the smaller value is returned as is
/// (ties go to the lexicographically smaller endpoint).
///
/// ```text
///  v0 ●───────×───────────● v1      t = (iso - v0) / (v1 - v0)
///     p0      p            p1       p = p0 + (p1 - p0)·t
/// ```
#[inline]
pub fn interpolate_edge(
    p0: Point,
    p1: Point,
    v0: Value,
    v1: Value,
    iso: Value,
    tol: Value,
) -> Point {
    let ((p0, v0), (p1, v1)) = if precedes(&p1, &p0) {
        ((p1, v1), (p0, v0))
    } else {
        ((p0, v0), (p1, v1))
    };

    if (v1 - v0).abs() <= tol {
        return if v1 < v0 { p1 } else { p0 };
    }

    interpolate_points(p0, p1, find_t(v0, v1, iso))
}
