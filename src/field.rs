//! Scalar fields the extractors sample.
//!
//! A field only has to answer two questions: its value at a point, and a direction at
//! a point (the gradient, unless the field knows better). Both may be asked from many
//! threads at once and must return the same answer for the same point.

use crate::types::{Point, Value, Vector};

/// Error type a field may fail with. It reaches the caller unchanged.
pub type FieldError = Box<dyn std::error::Error + Send + Sync>;

pub type FieldResult<T> = core::result::Result<T, FieldError>;

/// Step used by [`ScalarField::vector_at`] when a field has no analytic gradient.
///
/// Steps are relative: away from the origin they grow with the largest coordinate of
/// the point, so the offset stays well above the float spacing there.
pub const DEFAULT_GRADIENT_STEP: Value = 1e-3;

/// A pure, thread-safe scalar field.
pub trait ScalarField: Sync {
    fn scalar_at(&self, p: Point) -> FieldResult<Value>;

    /// Direction of steepest ascent at `p`.
    ///
    /// Defaults to a central-difference gradient with [`DEFAULT_GRADIENT_STEP`].
    fn vector_at(&self, p: Point) -> FieldResult<Vector> {
        central_difference(self, p, DEFAULT_GRADIENT_STEP)
    }
}

/// Any `Fn(Point) -> Value + Sync` closure is an infallible field.
impl<F> ScalarField for F
where
    F: Fn(Point) -> Value + Sync,
{
    #[inline]
    fn scalar_at(&self, p: Point) -> FieldResult<Value> {
        Ok(self(p))
    }
}

fn central_difference<F: ScalarField + ?Sized>(
    field: &F,
    p: Point,
    step: Value,
) -> FieldResult<Vector> {
    let step = step * p.coords.amax().max(1.0);
    let mut gradient = Vector::zeros();
    for axis in 0..3 {
        let mut offset = Vector::zeros();
        offset[axis] = step;
        let ahead = field.scalar_at(p + offset)?;
        let behind = field.scalar_at(p - offset)?;
        gradient[axis] = (ahead - behind) / (2.0 * step);
    }
    Ok(gradient)
}

/// Wraps a field and answers [`vector_at`](ScalarField::vector_at) with a numeric
/// gradient taken at a chosen step.
pub struct GradientField<F> {
    inner: F,
    step: Value,
}

impl<F: ScalarField> GradientField<F> {
    /// A non-positive or non-finite `step` falls back to [`DEFAULT_GRADIENT_STEP`].
    pub fn new(inner: F, step: Value) -> Self {
        let step = if step.is_finite() && step > 0.0 {
            step
        } else {
            DEFAULT_GRADIENT_STEP
        };
        Self { inner, step }
    }

    pub fn step(&self) -> Value {
        self.step
    }

    pub fn into_inner(self) -> F {
        self.inner
    }
}

impl<F: ScalarField> ScalarField for GradientField<F> {
    fn scalar_at(&self, p: Point) -> FieldResult<Value> {
        self.inner.scalar_at(p)
    }

    fn vector_at(&self, p: Point) -> FieldResult<Vector> {
        central_difference(&self.inner, p, self.step)
    }
}

/// A field assembled from closures: a value function and, optionally, an analytic
/// gradient.
///
/// ```rust
/// use bevy_isosurface::{field::{FnField, ScalarField}, types::{Point, Vector}};
///
/// let field = FnField::new(|p: Point| p.z).with_gradient(|_| Vector::z());
/// assert_eq!(field.vector_at(Point::origin()).unwrap(), Vector::z());
/// ```
pub struct FnField<S, G = fn(Point) -> Vector> {
    scalar: S,
    gradient: Option<G>,
}

impl<S> FnField<S>
where
    S: Fn(Point) -> Value + Sync,
{
    pub fn new(scalar: S) -> Self {
        Self {
            scalar,
            gradient: None,
        }
    }
}

impl<S, G> FnField<S, G>
where
    S: Fn(Point) -> Value + Sync,
    G: Fn(Point) -> Vector + Sync,
{
    pub fn with_gradient<H>(self, gradient: H) -> FnField<S, H>
    where
        H: Fn(Point) -> Vector + Sync,
    {
        FnField {
            scalar: self.scalar,
            gradient: Some(gradient),
        }
    }
}

impl<S, G> ScalarField for FnField<S, G>
where
    S: Fn(Point) -> Value + Sync,
    G: Fn(Point) -> Vector + Sync,
{
    fn scalar_at(&self, p: Point) -> FieldResult<Value> {
        Ok((self.scalar)(p))
    }

    fn vector_at(&self, p: Point) -> FieldResult<Vector> {
        match &self.gradient {
            Some(gradient) => Ok(gradient(p)),
            None => central_difference(self, p, DEFAULT_GRADIENT_STEP),
        }
    }
}

/// Signed distance to a sphere: negative inside.
#[derive(Debug, Clone, Copy)]
pub struct Sphere {
    pub center: Point,
    pub radius: Value,
}

impl ScalarField for Sphere {
    fn scalar_at(&self, p: Point) -> FieldResult<Value> {
        Ok(nalgebra::distance(&p, &self.center) - self.radius)
    }

    fn vector_at(&self, p: Point) -> FieldResult<Vector> {
        Ok((p - self.center)
            .try_normalize(Value::EPSILON)
            .unwrap_or_else(Vector::zeros))
    }
}

/// Signed distance to the plane through `origin` with unit `normal`: negative behind.
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    pub origin: Point,
    pub normal: Vector,
}

impl Plane {
    pub fn new(origin: Point, normal: Vector) -> Self {
        Self {
            origin,
            normal: normal.try_normalize(Value::EPSILON).unwrap_or_else(Vector::z),
        }
    }
}

impl ScalarField for Plane {
    fn scalar_at(&self, p: Point) -> FieldResult<Value> {
        Ok((p - self.origin).dot(&self.normal))
    }

    fn vector_at(&self, _p: Point) -> FieldResult<Vector> {
        Ok(self.normal)
    }
}
