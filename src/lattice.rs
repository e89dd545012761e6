use ndarray::{Array3, Axis, parallel::prelude::*};
use tracing::debug;

use crate::{
    error::{IsosurfaceError, Result},
    field::ScalarField,
    types::{BoundingBox, Point, Value},
};

/// A regular grid of field samples stretched over a [`BoundingBox`].
///
/// The lattice has `nx × ny × nz` sample points and `(nx - 1) × (ny - 1) × (nz - 1)`
/// cells. Samples are stored as `[k, j, i]` in standard layout, so the flat slot of
/// point `(i, j, k)` is `i + j·nx + k·nx·ny`.
#[derive(Debug, Clone)]
pub struct Lattice {
    dims: [usize; 3],
    points: Array3<Point>,
    values: Array3<Value>,
}

/// Fails with [`IsosurfaceError::InvalidResolution`] naming the first axis below 2.
pub fn check_resolution(dims: [usize; 3]) -> Result<()> {
    for (axis, count) in ['x', 'y', 'z'].into_iter().zip(dims) {
        if count < 2 {
            return Err(IsosurfaceError::InvalidResolution { axis, count });
        }
    }
    Ok(())
}

impl Lattice {
    /// Samples `field` at every lattice point.
    ///
    /// Work is split into one task per X slab; each task writes only the points and
    /// values of its own slab. When `close` is set, points on the outer layer of the
    /// lattice are given the value `0` instead of being evaluated, so the surface is
    /// capped where it leaves the box.
    ///
    /// The first error raised by `field` aborts sampling and is returned as
    /// [`IsosurfaceError::Field`].
    pub fn sample<F: ScalarField + ?Sized>(
        bounds: &BoundingBox,
        dims: [usize; 3],
        field: &F,
        close: bool,
    ) -> Result<Self> {
        check_resolution(dims)?;
        if !bounds.is_valid() {
            return Err(IsosurfaceError::InvalidBounds);
        }

        let [nx, ny, nz] = dims;
        let _span = tracing::debug_span!("sample_lattice", nx, ny, nz, close).entered();

        let shape = (nz, ny, nx);
        let mut points = Array3::from_elem(shape, Point::origin());
        let mut values = Array3::<Value>::zeros(shape);
        let param = |index: usize, count: usize| index as Value / (count - 1) as Value;

        points
            .axis_iter_mut(Axis(2))
            .into_par_iter()
            .zip(values.axis_iter_mut(Axis(2)))
            .enumerate()
            .try_for_each(|(i, (mut slab_points, mut slab_values))| -> Result<()> {
                for k in 0..nz {
                    for j in 0..ny {
                        let p = bounds.point_at(param(i, nx), param(j, ny), param(k, nz));
                        slab_points[[k, j]] = p;
                        slab_values[[k, j]] = if close && Self::on_boundary(dims, i, j, k) {
                            0.0
                        } else {
                            field.scalar_at(p)?
                        };
                    }
                }
                Ok(())
            })?;

        debug!(points = nx * ny * nz, "sampled lattice");
        Ok(Self {
            dims,
            points,
            values,
        })
    }

    /// True when `(i, j, k)` lies on the first or last layer along any axis.
    #[inline]
    pub fn on_boundary(dims: [usize; 3], i: usize, j: usize, k: usize) -> bool {
        let [nx, ny, nz] = dims;
        i == 0 || j == 0 || k == 0 || i == nx - 1 || j == ny - 1 || k == nz - 1
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Number of cells along each axis.
    pub fn cells(&self) -> [usize; 3] {
        self.dims.map(|n| n - 1)
    }

    /// Flat slot of point `(i, j, k)`.
    #[inline]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        let [nx, ny, _] = self.dims;
        i + j * nx + k * nx * ny
    }

    #[inline]
    pub fn point(&self, i: usize, j: usize, k: usize) -> Point {
        self.points[[k, j, i]]
    }

    #[inline]
    pub fn value(&self, i: usize, j: usize, k: usize) -> Value {
        self.values[[k, j, i]]
    }

    /// Sampled values in flat slot order.
    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        self.values.iter().copied()
    }

    /// Positions and values of the given corners.
    #[inline]
    pub fn gather<const N: usize>(&self, corners: &[[usize; 3]; N]) -> ([Point; N], [Value; N]) {
        (
            corners.map(|[i, j, k]| self.point(i, j, k)),
            corners.map(|[i, j, k]| self.value(i, j, k)),
        )
    }

    /// Smallest and largest sampled value, ignoring NaNs.
    pub fn value_range(&self) -> (Value, Value) {
        self.values().fold((Value::INFINITY, Value::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        })
    }

    /// Midpoint of [`value_range`](Lattice::value_range), the default isovalue.
    pub fn mid_value(&self) -> Value {
        let (lo, hi) = self.value_range();
        (lo + hi) * 0.5
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn unit_box() -> BoundingBox {
        BoundingBox::new(Point::new(-1., -1., -1.), Point::new(1., 1., 1.))
    }

    #[test]
    fn points_span_the_box() {
        let lattice = Lattice::sample(&unit_box(), [3, 4, 5], &|p: Point| p.x + p.y + p.z, false)
            .unwrap();
        assert_eq!(lattice.dims(), [3, 4, 5]);
        assert_eq!(lattice.cells(), [2, 3, 4]);
        assert_eq!(lattice.point(0, 0, 0), Point::new(-1., -1., -1.));
        assert_eq!(lattice.point(2, 3, 4), Point::new(1., 1., 1.));
        assert_eq!(lattice.point(1, 0, 2), Point::new(0., -1., 0.));
        assert_eq!(lattice.value(2, 3, 4), 3.0);
    }

    #[test]
    fn flat_index_matches_storage_order() {
        let lattice = Lattice::sample(&unit_box(), [3, 4, 5], &|p: Point| p.x, false).unwrap();
        let flat: Vec<Value> = lattice.values().collect();
        for k in 0..5 {
            for j in 0..4 {
                for i in 0..3 {
                    assert_eq!(flat[lattice.index(i, j, k)], lattice.value(i, j, k));
                }
            }
        }
    }

    #[test]
    fn close_zeroes_the_outer_layer_without_evaluating_it() {
        let calls = AtomicUsize::new(0);
        let field = |_: Point| -> Value {
            calls.fetch_add(1, Ordering::Relaxed);
            -1.0
        };
        let lattice = Lattice::sample(&unit_box(), [4, 4, 4], &field, true).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 8);
        assert_eq!(lattice.value(0, 2, 2), 0.0);
        assert_eq!(lattice.value(3, 1, 1), 0.0);
        assert_eq!(lattice.value(1, 2, 1), -1.0);
        assert_eq!(lattice.value_range(), (-1.0, 0.0));
        assert_eq!(lattice.mid_value(), -0.5);
    }

    #[test]
    fn every_point_is_evaluated_once() {
        let calls = AtomicUsize::new(0);
        let field = |p: Point| {
            calls.fetch_add(1, Ordering::Relaxed);
            p.z
        };
        Lattice::sample(&unit_box(), [5, 6, 7], &field, false).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 5 * 6 * 7);
    }

    #[test]
    fn rejects_short_axes_before_sampling() {
        let calls = AtomicUsize::new(0);
        let field = |_: Point| -> Value {
            calls.fetch_add(1, Ordering::Relaxed);
            0.0
        };
        let err = Lattice::sample(&unit_box(), [2, 1, 2], &field, false).unwrap_err();
        assert!(matches!(err, IsosurfaceError::InvalidResolution { axis: 'y', count: 1 }));
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn field_errors_abort_sampling() {
        struct Failing;
        impl ScalarField for Failing {
            fn scalar_at(&self, p: Point) -> crate::field::FieldResult<Value> {
                if p.x > 0.5 {
                    Err("outside the sampled range".into())
                } else {
                    Ok(p.x)
                }
            }
        }
        let err = Lattice::sample(&unit_box(), [4, 4, 4], &Failing, false).unwrap_err();
        assert_eq!(err.to_string(), "field evaluation failed: outside the sampled range");
    }
}
