use nalgebra::{Point3, Vector3};

/// Scalar field value at a point in space.
pub type Value = f32;

/// A 3D point with [`Value`] components.
pub type Point = Point3<Value>;

/// A 3D vector with [`Value`] components.
pub type Vector = Vector3<Value>;

/// Axis-aligned box that a lattice is stretched over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new(Point::new(-10., -10., -10.), Point::new(10., 10., 10.))
    }
}

impl BoundingBox {
    /// Creates a box from two opposite corners, in any order.
    pub fn new(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Returns the box of size `dims` centred on `center`.
    ///
    /// ```text
    ///  min = center - dims/2
    ///  max = center + dims/2
    /// ```
    pub fn from_center(center: Point, dims: Vector) -> Self {
        let half = dims.abs() / 2.0;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Edge lengths along X, Y and Z.
    pub fn size(&self) -> Vector {
        self.max - self.min
    }

    pub fn center(&self) -> Point {
        nalgebra::center(&self.min, &self.max)
    }

    /// Maps normalized parameters in `[0, 1]` onto the box.
    ///
    /// `(0, 0, 0)` is `min`, `(1, 1, 1)` is `max`.
    #[inline]
    pub fn point_at(&self, u: Value, v: Value, w: Value) -> Point {
        let size = self.size();
        Point::new(
            self.min.x + size.x * u,
            self.min.y + size.y * v,
            self.min.z + size.z * w,
        )
    }

    pub fn contains(&self, p: &Point) -> bool {
        (self.min.x..=self.max.x).contains(&p.x)
            && (self.min.y..=self.max.y).contains(&p.y)
            && (self.min.z..=self.max.z).contains(&p.z)
    }

    /// Finite corners with `min <= max` on every axis.
    pub(crate) fn is_valid(&self) -> bool {
        self.min.iter().chain(self.max.iter()).all(|c| c.is_finite())
            && self.min.iter().zip(self.max.iter()).all(|(lo, hi)| lo <= hi)
    }
}

/// A straight segment between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    pub start: Point,
    pub end: Point,
}

impl LineSegment {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> Value {
        nalgebra::distance(&self.start, &self.end)
    }

    pub fn reversed(&self) -> Self {
        Self::new(self.end, self.start)
    }
}

/// An ordered chain of points. A closed polyline repeats its first point at the end.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polyline {
    pub points: Vec<Point>,
}

impl Polyline {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Number of segments in the chain.
    pub fn segment_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    pub fn length(&self) -> Value {
        self.points
            .windows(2)
            .map(|w| nalgebra::distance(&w[0], &w[1]))
            .sum()
    }

    /// True when the chain has at least three segments and ends where it starts.
    pub fn is_closed(&self) -> bool {
        self.points.len() > 3 && self.points.first() == self.points.last()
    }

    pub fn segments(&self) -> impl Iterator<Item = LineSegment> + '_ {
        self.points.windows(2).map(|w| LineSegment::new(w[0], w[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_is_normalized_and_parametrized() {
        let b = BoundingBox::new(Point::new(1., -1., 2.), Point::new(-1., 1., 0.));
        assert_eq!(b.min, Point::new(-1., -1., 0.));
        assert_eq!(b.max, Point::new(1., 1., 2.));
        assert_eq!(b.point_at(0.5, 0.5, 0.5), Point::new(0., 0., 1.));
        assert_eq!(b.point_at(1., 0., 1.), Point::new(1., -1., 2.));
        assert!(b.contains(&b.center()));
    }

    #[test]
    fn box_from_center() {
        let b = BoundingBox::from_center(Point::new(1., 2., 3.), Vector::new(2., 4., 6.));
        assert_eq!(b.min, Point::new(0., 0., 0.));
        assert_eq!(b.max, Point::new(2., 4., 6.));
    }

    #[test]
    fn polyline_metrics() {
        let open = Polyline::new(vec![
            Point::new(0., 0., 0.),
            Point::new(1., 0., 0.),
            Point::new(1., 1., 0.),
        ]);
        assert_eq!(open.segment_count(), 2);
        assert!((open.length() - 2.).abs() < 1e-6);
        assert!(!open.is_closed());

        let mut closed = open.clone();
        closed.points.push(Point::new(0., 1., 0.));
        closed.points.push(Point::new(0., 0., 0.));
        assert!(closed.is_closed());
        assert_eq!(closed.segments().count(), 4);
    }
}
