use derive_more::{Display, From};

use crate::{field::FieldError, types::Value};

pub type Result<T> = core::result::Result<T, IsosurfaceError>;

#[derive(Debug, Display, From)]
pub enum IsosurfaceError {
    /// A lattice axis has fewer than two sample points.
    #[display("resolution along {axis} must be at least 2, got {count}")]
    InvalidResolution { axis: char, count: usize },
    #[display("isovalue must be finite, got {_0}")]
    InvalidIsovalue(Value),
    #[display("tolerance must be a number, got {_0}")]
    InvalidTolerance(Value),
    #[display("bounding box must be finite with min <= max on every axis")]
    InvalidBounds,
    /// A contouring input face points at a vertex the mesh does not have.
    #[display("face {face} references missing vertex {vertex}")]
    InvalidFace { face: usize, vertex: usize },
    /// Error raised by the field itself, passed through untouched.
    #[display("field evaluation failed: {_0}")]
    #[from]
    Field(FieldError),
}

impl std::error::Error for IsosurfaceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IsosurfaceError::Field(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_parameter() {
        let err = IsosurfaceError::InvalidResolution { axis: 'x', count: 1 };
        assert_eq!(err.to_string(), "resolution along x must be at least 2, got 1");

        let err = IsosurfaceError::InvalidIsovalue(Value::NAN);
        assert_eq!(err.to_string(), "isovalue must be finite, got NaN");
    }

    #[test]
    fn field_errors_keep_their_source() {
        let inner: FieldError = "sensor out of range".into();
        let err = IsosurfaceError::from(inner);
        assert_eq!(err.to_string(), "field evaluation failed: sensor out of range");
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("sensor out of range"));
    }
}
