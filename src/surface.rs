use std::ops::Range;

use crate::{
    error::{IsosurfaceError, Result},
    mesh::IsoMesh,
    types::{Point, Value},
};

/// One polygon of a [`SurfaceMesh`], as indices into its vertex list.
///
/// Corners are listed in winding order; the contour tables rely on consecutive corners
/// sharing an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    Triangle([usize; 3]),
    Quad([usize; 4]),
}

impl Face {
    pub fn vertices(&self) -> &[usize] {
        match self {
            Face::Triangle(v) => v,
            Face::Quad(v) => v,
        }
    }
}

/// A polygon mesh of triangles and quads to be contoured.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceMesh {
    pub vertices: Vec<Point>,
    pub faces: Vec<Face>,
}

impl SurfaceMesh {
    pub fn new(vertices: Vec<Point>, faces: Vec<Face>) -> Self {
        Self { vertices, faces }
    }

    /// A flat `nu × nv` grid of quads in the `z = 0` plane covering `x × y`.
    ///
    /// Vertex `(u, v)` sits at index `u + v·(nu + 1)` and quads wind counter-clockwise
    /// seen from `+z`.
    pub fn grid(x: Range<Value>, y: Range<Value>, nu: usize, nv: usize) -> Self {
        let stride = nu + 1;
        let lerp = |r: &Range<Value>, i: usize, n: usize| {
            if n == 0 {
                r.start
            } else {
                r.start + (r.end - r.start) * (i as Value / n as Value)
            }
        };

        let vertices = (0..=nv)
            .flat_map(|v| (0..=nu).map(move |u| (u, v)))
            .map(|(u, v)| Point::new(lerp(&x, u, nu), lerp(&y, v, nv), 0.0))
            .collect();

        let faces = (0..nv)
            .flat_map(|v| (0..nu).map(move |u| (u, v)))
            .map(|(u, v)| {
                let a = u + v * stride;
                Face::Quad([a, a + 1, a + 1 + stride, a + stride])
            })
            .collect();

        Self { vertices, faces }
    }

    /// Checks that every face refers to existing vertices.
    pub fn validate(&self) -> Result<()> {
        for (face, f) in self.faces.iter().enumerate() {
            if let Some(&vertex) = f.vertices().iter().find(|&&v| v >= self.vertices.len()) {
                return Err(IsosurfaceError::InvalidFace { face, vertex });
            }
        }
        Ok(())
    }
}

impl From<&IsoMesh> for SurfaceMesh {
    fn from(mesh: &IsoMesh) -> Self {
        Self {
            vertices: mesh.vertices.clone(),
            faces: mesh.faces.iter().copied().map(Face::Triangle).collect(),
        }
    }
}
