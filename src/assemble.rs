use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::debug;

use crate::{
    error::Result,
    field::ScalarField,
    mesh::IsoMesh,
    types::{Point, Value, Vector},
};

/// How the assembled mesh gets its vertex normals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalMode {
    /// Leave [`IsoMesh::normals`] empty.
    None,
    /// Average the normals of the faces around each vertex.
    Topological,
    /// Sample the field's gradient at each vertex and point against it, towards
    /// decreasing values. Costs one extra field evaluation per vertex.
    #[default]
    Gradient,
}

/// Turns polygonizer fragments into the final mesh.
///
/// ```text
/// fragments ─ join ─ weld(tolerance) ─ cull degenerate faces ─ compact ─ normals
/// ```
///
/// The result never has more vertices than the fragments had in total.
pub fn assemble<F: ScalarField + ?Sized>(
    fragments: Vec<IsoMesh>,
    tolerance: Value,
    normals: NormalMode,
    field: &F,
) -> Result<IsoMesh> {
    let _span = tracing::debug_span!("assemble", fragments = fragments.len()).entered();

    let mut mesh = IsoMesh::join(fragments);
    let raw_vertices = mesh.vertices.len();
    let welded = mesh.weld(tolerance);
    let culled = mesh.cull_degenerate_faces();
    let unused = mesh.compact();

    match normals {
        NormalMode::None => mesh.normals.clear(),
        NormalMode::Topological => mesh.create_normals(),
        NormalMode::Gradient => mesh.normals = gradient_normals(&mesh.vertices, field)?,
    }

    debug!(
        raw_vertices,
        welded,
        culled,
        unused,
        vertices = mesh.vertices.len(),
        faces = mesh.faces.len(),
        "assembled mesh"
    );
    Ok(mesh)
}

/// Unit vectors opposite to the field gradient at each point, computed in parallel.
///
/// Points where the gradient vanishes get the zero vector.
pub fn gradient_normals<F: ScalarField + ?Sized>(
    points: &[Point],
    field: &F,
) -> Result<Vec<Vector>> {
    points
        .par_iter()
        .map(|&p| -> Result<Vector> {
            let gradient = field.vector_at(p)?;
            Ok(-gradient
                .try_normalize(Value::EPSILON)
                .unwrap_or_else(Vector::zeros))
        })
        .collect()
}
