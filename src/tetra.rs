use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::debug;

use crate::{
    lattice::Lattice,
    mesh::IsoMesh,
    tables::{CUBE_TETRAHEDRA, TET_EDGE_INDICES, TET_TRI_TABLE},
    types::Value,
    utils::{crossed_edges, get_edge_points, get_state, triangles_from_state, voxel_corner_indices},
};

/// Runs marching tetrahedra over every cell of `lattice`.
///
/// Each cell is cut into the six tetrahedra of [`CUBE_TETRAHEDRA`] and each of those is
/// polygonized on its own. Tetrahedra have no saddle faces, so unlike
/// [`march_cubes`](crate::cube::march_cubes) the result has no ambiguous cases, at the
/// price of more triangles. Slabs and fragments work as in `march_cubes`.
pub fn march_tetrahedra(lattice: &Lattice, iso: Value, tolerance: Value) -> Vec<IsoMesh> {
    let [cx, cy, cz] = lattice.cells();

    let fragments: Vec<IsoMesh> = (0..cx)
        .into_par_iter()
        .map(|i| {
            let mut fragment = IsoMesh::new_empty();

            for j in 0..cy {
                for k in 0..cz {
                    let (positions, values) = lattice.gather(&voxel_corner_indices(i, j, k));

                    let cube_state = get_state(&values, iso);
                    if cube_state == 0 || cube_state == 0xff {
                        continue;
                    }

                    for tet in CUBE_TETRAHEDRA {
                        let tet_positions = tet.map(|c| positions[c]);
                        let tet_values = tet.map(|c| values[c]);

                        let state = get_state(&tet_values, iso);
                        if state == 0 || state == 0xf {
                            continue;
                        }

                        let edge_points = get_edge_points(
                            crossed_edges(state, &TET_EDGE_INDICES),
                            &TET_EDGE_INDICES,
                            &tet_positions,
                            &tet_values,
                            iso,
                            tolerance,
                        );

                        for tri in triangles_from_state(&TET_TRI_TABLE[state], &edge_points) {
                            fragment.push_triangle(tri);
                        }
                    }
                }
            }
            fragment
        })
        .collect();

    debug!(
        slabs = fragments.len(),
        triangles = fragments.iter().map(|f| f.faces.len()).sum::<usize>(),
        "marched tetrahedra"
    );
    fragments
}
