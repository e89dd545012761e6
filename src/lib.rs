pub mod assemble;
pub mod contour;
pub mod cube;
pub mod error;
pub mod extract;
pub mod field;
pub mod interp;
pub mod lattice;
pub mod mesh;
#[cfg(feature = "bevy")]
pub mod plugin;
pub mod polyline;
pub mod surface;
pub mod tables;
pub mod tetra;
pub mod types;
pub mod utils;

pub use assemble::NormalMode;
pub use error::{IsosurfaceError, Result};
pub use extract::{Algorithm, ContourRequest, GridRequest, extract_contours, extract_isosurface};
pub use field::{FnField, GradientField, ScalarField};
pub use mesh::IsoMesh;
#[cfg(feature = "bevy")]
pub use plugin::IsosurfacePlugin;
pub use surface::{Face, SurfaceMesh};
pub use types::{BoundingBox, LineSegment, Point, Polyline, Value, Vector};
