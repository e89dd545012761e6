use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::debug;

use crate::{
    lattice::Lattice,
    mesh::IsoMesh,
    tables::{CORNER_POINT_INDICES, EDGE_TABLE, TRI_TABLE},
    types::Value,
    utils::{get_edge_points, get_state, triangles_from_state, voxel_corner_indices},
};

/// Runs marching cubes over every cell of `lattice`.
///
/// Work is parallelised over X slabs using Rayon; each slab builds its own
/// [`IsoMesh`] fragment and fragments are returned in slab order. Vertices are not
/// shared between triangles yet.
///
/// ```text
/// Per cell:
/// 1. voxel_corner_indices       →  8 lattice corners
/// 2. Lattice::gather            →  8 positions, 8 values
/// 3. get_state                  →  256-entry lookup key
/// 4. EDGE_TABLE[state]          →  bitmask of crossed edges (0: skip the cell)
/// 5. get_edge_points            →  up to 12 interpolated points
/// 6. triangles_from_state       →  triangles from TRI_TABLE
/// ```
pub fn march_cubes(lattice: &Lattice, iso: Value, tolerance: Value) -> Vec<IsoMesh> {
    let [cx, cy, cz] = lattice.cells();

    let fragments: Vec<IsoMesh> = (0..cx)
        .into_par_iter()
        .map(|i| {
            let mut fragment = IsoMesh::new_empty();

            for j in 0..cy {
                for k in 0..cz {
                    let (corner_positions, corner_values) =
                        lattice.gather(&voxel_corner_indices(i, j, k));

                    let state = get_state(&corner_values, iso);
                    let edges_mask = EDGE_TABLE[state];
                    if edges_mask == 0 {
                        continue;
                    }

                    let edge_points = get_edge_points(
                        edges_mask,
                        &CORNER_POINT_INDICES,
                        &corner_positions,
                        &corner_values,
                        iso,
                        tolerance,
                    );

                    for tri in triangles_from_state(&TRI_TABLE[state], &edge_points) {
                        fragment.push_triangle(tri);
                    }
                }
            }
            fragment
        })
        .collect();

    debug!(
        slabs = fragments.len(),
        triangles = fragments.iter().map(|f| f.faces.len()).sum::<usize>(),
        "marched cubes"
    );
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, Point};

    fn lattice(dims: [usize; 3], field: impl Fn(Point) -> Value + Sync) -> Lattice {
        let bounds = BoundingBox::new(Point::new(-1., -1., -1.), Point::new(1., 1., 1.));
        Lattice::sample(&bounds, dims, &field, false).unwrap()
    }

    #[test]
    fn one_fragment_per_slab() {
        let lattice = lattice([5, 3, 3], |p| p.x);
        let fragments = march_cubes(&lattice, 0.1, 1e-6);
        assert_eq!(fragments.len(), 4);
        // The plane x = 0.1 only passes through the third slab.
        let counts: Vec<usize> = fragments.iter().map(|f| f.faces.len()).collect();
        assert_eq!(counts, vec![0, 0, 8, 0]);
    }

    #[test]
    fn uniform_fields_emit_nothing() {
        for value in [-3.0, 3.0] {
            let lattice = lattice([4, 4, 4], move |_| value);
            let fragments = march_cubes(&lattice, 0.0, 1e-6);
            assert!(fragments.iter().all(IsoMesh::is_empty));
        }
    }

    #[test]
    fn triangles_own_their_vertices() {
        let lattice = lattice([3, 3, 3], |p| p.coords.norm() - 0.5);
        let mesh = IsoMesh::join(march_cubes(&lattice, 0.0, 1e-6));
        assert_eq!(mesh.faces.len(), 8);
        assert_eq!(mesh.vertices.len(), 24);
        for p in &mesh.vertices {
            assert!((p.coords.norm() - 0.5).abs() < 1e-5);
        }
    }
}
