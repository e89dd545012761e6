use tracing::warn;

use crate::{
    assemble::{NormalMode, assemble},
    contour::extract_mesh_contours,
    cube::march_cubes,
    error::{IsosurfaceError, Result},
    field::ScalarField,
    lattice::{Lattice, check_resolution},
    mesh::IsoMesh,
    surface::SurfaceMesh,
    tetra::march_tetrahedra,
    types::{BoundingBox, Polyline, Value},
};

/// Tolerance used when a request does not set one.
pub const DEFAULT_TOLERANCE: Value = 1e-4;

/// Grid polygonization algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    /// Marching cubes: 256 cases per cell.
    #[default]
    Cube,
    /// Marching tetrahedra: six tetrahedra per cell, no ambiguous faces.
    Tetrahedron,
}

/// Everything [`extract_isosurface`] needs besides the field.
///
/// ```rust,ignore
/// let request = GridRequest::default()
///     .with_bounds(BoundingBox::from_center(Point::origin(), Vector::repeat(4.0)))
///     .with_resolution([40, 40, 40])
///     .with_iso(0.0)
///     .with_algorithm(Algorithm::Tetrahedron);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridRequest {
    /// Region the lattice covers.
    pub bounds: BoundingBox,
    /// Lattice points along x, y and z. Each must be at least 2.
    pub resolution: [usize; 3],
    /// Isovalue; `None` picks the midpoint of the sampled range.
    pub iso: Option<Value>,
    /// Pin the outer layer of the lattice to `0` so the surface is capped at the box.
    pub close: bool,
    pub algorithm: Algorithm,
    pub normals: NormalMode,
    /// Interpolation snap distance and vertex weld distance.
    pub tolerance: Value,
}

impl Default for GridRequest {
    fn default() -> Self {
        Self {
            bounds: BoundingBox::default(),
            resolution: [20, 20, 20],
            iso: None,
            close: false,
            algorithm: Algorithm::default(),
            normals: NormalMode::default(),
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl GridRequest {
    pub fn with_bounds(mut self, bounds: BoundingBox) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_resolution(mut self, resolution: [usize; 3]) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_iso(mut self, iso: Value) -> Self {
        self.iso = Some(iso);
        self
    }

    pub fn with_close(mut self, close: bool) -> Self {
        self.close = close;
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_normals(mut self, normals: NormalMode) -> Self {
        self.normals = normals;
        self
    }

    pub fn with_tolerance(mut self, tolerance: Value) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Checks the request and returns it with a negative tolerance clamped to zero.
    pub fn validate(&self) -> Result<Self> {
        check_resolution(self.resolution)?;
        check_iso(self.iso)?;
        if !self.bounds.is_valid() {
            return Err(IsosurfaceError::InvalidBounds);
        }
        Ok(Self {
            tolerance: rectify_tolerance(self.tolerance)?,
            ..*self
        })
    }
}

/// Everything [`extract_contours`] needs besides the mesh and the field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContourRequest {
    /// Isovalue; `None` picks the midpoint of the values at the mesh vertices.
    pub iso: Option<Value>,
    /// Interpolation snap distance, shortest kept segment and endpoint join distance.
    pub tolerance: Value,
}

impl Default for ContourRequest {
    fn default() -> Self {
        Self {
            iso: None,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl ContourRequest {
    pub fn with_iso(mut self, iso: Value) -> Self {
        self.iso = Some(iso);
        self
    }

    pub fn with_tolerance(mut self, tolerance: Value) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Checks the request and returns it with a negative tolerance clamped to zero.
    pub fn validate(&self) -> Result<Self> {
        check_iso(self.iso)?;
        Ok(Self {
            iso: self.iso,
            tolerance: rectify_tolerance(self.tolerance)?,
        })
    }
}

fn check_iso(iso: Option<Value>) -> Result<()> {
    match iso {
        Some(iso) if !iso.is_finite() => Err(IsosurfaceError::InvalidIsovalue(iso)),
        _ => Ok(()),
    }
}

/// Negative tolerances become `0`; NaN and infinities are rejected.
fn rectify_tolerance(tolerance: Value) -> Result<Value> {
    if !tolerance.is_finite() {
        return Err(IsosurfaceError::InvalidTolerance(tolerance));
    }
    if tolerance < 0.0 {
        warn!(tolerance, "negative tolerance, using 0");
        return Ok(0.0);
    }
    Ok(tolerance)
}

/// Samples `field` on the lattice described by `request` and polygonizes the level
/// set into a welded triangle mesh.
///
/// The request is validated before the field is evaluated even once. A field that
/// never crosses the isovalue inside the box gives an empty mesh.
pub fn extract_isosurface<F: ScalarField + ?Sized>(
    field: &F,
    request: &GridRequest,
) -> Result<IsoMesh> {
    let request = request.validate()?;
    let _span = tracing::debug_span!(
        "extract_isosurface",
        algorithm = ?request.algorithm,
        resolution = ?request.resolution
    )
    .entered();

    let lattice = Lattice::sample(&request.bounds, request.resolution, field, request.close)?;
    let iso = request.iso.unwrap_or_else(|| lattice.mid_value());

    let fragments = match request.algorithm {
        Algorithm::Cube => march_cubes(&lattice, iso, request.tolerance),
        Algorithm::Tetrahedron => march_tetrahedra(&lattice, iso, request.tolerance),
    };

    assemble(fragments, request.tolerance, request.normals, field)
}

/// Traces the level set of `field` across the faces of `mesh` as polylines.
///
/// See [`extract_mesh_contours`] for the algorithm.
pub fn extract_contours<F: ScalarField + ?Sized>(
    mesh: &SurfaceMesh,
    field: &F,
    request: &ContourRequest,
) -> Result<Vec<Polyline>> {
    let request = request.validate()?;
    extract_mesh_contours(mesh, field, request.iso, request.tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Point, Vector};

    #[test]
    fn defaults() {
        let request = GridRequest::default();
        assert_eq!(request.resolution, [20, 20, 20]);
        assert_eq!(request.bounds.min, Point::new(-10., -10., -10.));
        assert_eq!(request.iso, None);
        assert_eq!(request.algorithm, Algorithm::Cube);
        assert_eq!(request.normals, NormalMode::Gradient);
        assert_eq!(request.tolerance, 1e-4);
        assert_eq!(ContourRequest::default().tolerance, 1e-4);
    }

    #[test]
    fn validation_rejects_bad_parameters() {
        let err = GridRequest::default()
            .with_resolution([20, 20, 0])
            .validate()
            .unwrap_err();
        assert!(matches!(err, IsosurfaceError::InvalidResolution { axis: 'z', count: 0 }));

        let err = GridRequest::default().with_iso(Value::INFINITY).validate().unwrap_err();
        assert!(matches!(err, IsosurfaceError::InvalidIsovalue(_)));

        let err = GridRequest::default()
            .with_tolerance(Value::NAN)
            .validate()
            .unwrap_err();
        assert!(matches!(err, IsosurfaceError::InvalidTolerance(_)));

        let mut inverted = GridRequest::default();
        inverted.bounds.min.x = 20.0;
        assert!(matches!(inverted.validate(), Err(IsosurfaceError::InvalidBounds)));

        let unbounded = GridRequest::default().with_bounds(BoundingBox::from_center(
            Point::origin(),
            Vector::new(1.0, Value::INFINITY, 1.0),
        ));
        assert!(matches!(unbounded.validate(), Err(IsosurfaceError::InvalidBounds)));

        let err = ContourRequest::default().with_iso(Value::NAN).validate().unwrap_err();
        assert!(matches!(err, IsosurfaceError::InvalidIsovalue(_)));
    }

    #[test]
    fn negative_tolerance_is_clamped() {
        let request = GridRequest::default().with_tolerance(-1.0).validate().unwrap();
        assert_eq!(request.tolerance, 0.0);
        let request = ContourRequest::default().with_tolerance(-1e-3).validate().unwrap();
        assert_eq!(request.tolerance, 0.0);
    }
}
