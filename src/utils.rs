use std::collections::HashMap;

use crate::{
    interp::interpolate_edge,
    tables::CORNER_OFFSETS,
    types::{Point, Value},
};

/// Returns the 8 lattice indices `[i, j, k]` of the corners of the cell at `(i, j, k)`.
///
/// Corners follow the ordering documented in [`tables`](crate::tables).
#[inline]
pub fn voxel_corner_indices(i: usize, j: usize, k: usize) -> [[usize; 3]; 8] {
    CORNER_OFFSETS.map(|[di, dj, dk]| [i + di, j + dj, k + dk])
}

/// Computes the case index of a cell or tetrahedron.
///
/// Bit `b` is set when corner `b` lies strictly **below** the threshold:
///
/// ```text
/// corner index:  7  6  5  4  3  2  1  0
/// state bits:   [_][_][_][_][_][_][_][_]
///                                      ^-- corner 0 below?
/// ```
#[inline]
pub fn get_state<const N: usize>(corner_values: &[Value; N], threshold: Value) -> usize {
    corner_values
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v < threshold)
        .fold(0, |state, (i, _)| state | (1 << i))
}

/// Mask of the edges whose two corners fall on different sides of the threshold.
#[inline]
pub fn crossed_edges<const E: usize>(state: usize, edges: &[[usize; 2]; E]) -> u16 {
    edges
        .iter()
        .enumerate()
        .filter(|&(_, &[a, b])| (state >> a) & 1 != (state >> b) & 1)
        .fold(0, |mask, (i, _)| mask | (1 << i))
}

/// Interpolates the crossing point on each edge set in `edges_mask`.
///
/// Every crossing is computed once per cell, however many triangles share it.
#[inline]
pub fn get_edge_points<const C: usize, const E: usize>(
    edges_mask: u16,
    edges: &[[usize; 2]; E],
    corner_positions: &[Point; C],
    corner_values: &[Value; C],
    threshold: Value,
    tolerance: Value,
) -> [Option<Point>; E] {
    let mut edge_points = [None; E];

    for (i, &[a, b]) in edges.iter().enumerate() {
        if edges_mask & (1 << i) == 0 {
            continue;
        }
        edge_points[i] = Some(interpolate_edge(
            corner_positions[a],
            corner_positions[b],
            corner_values[a],
            corner_values[b],
            threshold,
            tolerance,
        ));
    }

    edge_points
}

/// Resolves a `-1` terminated row of edge-index triples into triangles.
///
/// ```text
/// row = [e0, e1, e2,  e3, e4, e5,  -1, ...]
///        \___tri0__/   \___tri1__/
/// ```
#[inline]
pub fn triangles_from_state<'a>(
    row: &'a [i8],
    edge_points: &'a [Option<Point>],
) -> impl Iterator<Item = [Point; 3]> + 'a {
    row.chunks_exact(3)
        .take_while(|tri| tri[0] != -1)
        .filter_map(|tri| {
            Some([
                edge_points[tri[0] as usize]?,
                edge_points[tri[1] as usize]?,
                edge_points[tri[2] as usize]?,
            ])
        })
}

/// Spatial hash used to find points lying within a tolerance of each other.
///
/// With a positive tolerance points are bucketed on a grid of that spacing and a query
/// visits the 27 surrounding buckets. With a zero tolerance only bit-identical
/// positions share a bucket.
///
/// A coordinate whose cell index would not fit the grid (a tolerance that is
/// subnormal, or far below the float spacing at that coordinate) is keyed by its bits
/// instead. Any point within tolerance of it has the same coordinate on that axis.
pub(crate) struct PointBuckets {
    inv_cell: Option<Value>,
    buckets: HashMap<[i64; 3], Vec<usize>>,
}

/// Largest cell index magnitude, leaving room for the neighbour offsets.
const CELL_LIMIT: Value = (1u64 << 62) as Value;

impl PointBuckets {
    pub fn new(tolerance: Value) -> Self {
        Self {
            inv_cell: (tolerance > 0.0)
                .then(|| 1.0 / tolerance)
                .filter(|inv| inv.is_finite()),
            buckets: HashMap::new(),
        }
    }

    fn key(&self, p: &Point) -> Option<[i64; 3]> {
        if !p.iter().all(|c| c.is_finite()) {
            return None;
        }
        // Adding zero folds -0.0 into 0.0.
        let bits = |c: Value| (c + 0.0).to_bits() as i64;
        Some(match self.inv_cell {
            Some(inv) => [p.x, p.y, p.z].map(|c| {
                let cell = (c * inv).floor();
                if cell.abs() < CELL_LIMIT {
                    cell as i64
                } else {
                    bits(c)
                }
            }),
            None => [p.x, p.y, p.z].map(bits),
        })
    }

    /// Points with non-finite coordinates are never stored.
    pub fn insert(&mut self, p: &Point, id: usize) {
        if let Some(key) = self.key(p) {
            self.buckets.entry(key).or_default().push(id);
        }
    }

    /// Ids stored near `p`, a superset of those within the tolerance.
    pub fn candidates(&self, p: &Point) -> Vec<usize> {
        let Some(key) = self.key(p) else {
            return Vec::new();
        };
        let reach = if self.inv_cell.is_some() { 1 } else { 0 };
        let mut found = Vec::new();
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                for dz in -reach..=reach {
                    let lookup = [
                        key[0].saturating_add(dx),
                        key[1].saturating_add(dy),
                        key[2].saturating_add(dz),
                    ];
                    if let Some(ids) = self.buckets.get(&lookup) {
                        found.extend_from_slice(ids);
                    }
                }
            }
        }
        found
    }
}

/// Root of `i`'s group, compressing the path on the way.
pub(crate) fn find(parent: &mut [usize], mut i: usize) -> usize {
    let mut root = i;
    while parent[root] != root {
        root = parent[root];
    }
    while parent[i] != root {
        let next = parent[i];
        parent[i] = root;
        i = next;
    }
    root
}

/// Joins two groups under the lower of their two roots.
pub(crate) fn union(parent: &mut [usize], a: usize, b: usize) {
    let (ra, rb) = (find(parent, a), find(parent, b));
    if ra < rb {
        parent[rb] = ra;
    } else {
        parent[ra] = rb;
    }
}
