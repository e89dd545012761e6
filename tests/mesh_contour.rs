use std::f32::consts::PI;

use bevy_isosurface::{
    Algorithm, BoundingBox, ContourRequest, Face, GridRequest, IsosurfaceError, Point,
    SurfaceMesh, Value, Vector, extract_contours, extract_isosurface, field::Sphere,
};

fn unit_square(n: usize) -> SurfaceMesh {
    SurfaceMesh::grid(0.0..1.0, 0.0..1.0, n, n)
}

#[test]
fn straight_cut_across_a_quad_grid() {
    let request = ContourRequest::default().with_iso(0.0);
    let polylines = extract_contours(&unit_square(2), &|p: Point| p.x - 0.5, &request).unwrap();

    assert_eq!(polylines.len(), 1);
    let line = &polylines[0];
    assert!(!line.is_closed());
    for p in &line.points {
        assert!((p.x - 0.5).abs() <= request.tolerance, "{p:?}");
    }
    let ys: Vec<Value> = line.points.iter().map(|p| p.y).collect();
    let (lo, hi) = ys
        .iter()
        .fold((Value::INFINITY, Value::NEG_INFINITY), |(lo, hi), &y| {
            (lo.min(y), hi.max(y))
        });
    assert_eq!((lo, hi), (0.0, 1.0));
    assert!((line.length() - 1.0).abs() < 1e-5);
}

#[test]
fn circle_on_a_quad_grid_is_one_closed_loop() {
    let mesh = SurfaceMesh::grid(-1.0..1.0, -1.0..1.0, 40, 40);
    let center = Point::new(0.013, -0.021, 0.);
    let circle = |p: Point| (p - center).norm_squared() - 0.25;
    let request = ContourRequest::default().with_iso(0.0);
    let polylines = extract_contours(&mesh, &circle, &request).unwrap();

    assert_eq!(polylines.len(), 1);
    let contour = &polylines[0];
    assert!(contour.is_closed());
    let circumference = PI;
    assert!((contour.length() - circumference).abs() / circumference < 0.01);
    // Quadratic fields interpolate inside the circle, never outside it.
    for p in &contour.points {
        assert!((*p - center).norm() <= 0.5 + 1e-4);
    }
}

#[test]
fn separate_regions_give_separate_loops() {
    let mesh = SurfaceMesh::grid(-2.0..2.0, -1.0..1.0, 40, 20);
    let blobs = |p: Point| {
        let left = (p - Point::new(-1., 0., 0.)).norm();
        let right = (p - Point::new(1., 0., 0.)).norm();
        left.min(right) - 0.43
    };
    let polylines =
        extract_contours(&mesh, &blobs, &ContourRequest::default().with_iso(0.0)).unwrap();
    assert_eq!(polylines.len(), 2);
    assert!(polylines.iter().all(|l| l.is_closed()));
}

#[test]
fn contouring_an_extracted_isosurface() {
    let sphere = Sphere {
        center: Point::origin(),
        radius: 0.6,
    };
    let grid = GridRequest::default()
        .with_bounds(BoundingBox::from_center(Point::origin(), Vector::repeat(2.0)))
        .with_resolution([16, 16, 16])
        .with_iso(0.0)
        .with_algorithm(Algorithm::Tetrahedron);
    let surface = SurfaceMesh::from(&extract_isosurface(&sphere, &grid).unwrap());

    let height = 0.05;
    let request = ContourRequest::default().with_iso(height);
    let polylines = extract_contours(&surface, &|p: Point| p.z, &request).unwrap();

    assert_eq!(polylines.len(), 1);
    let ring = &polylines[0];
    assert!(ring.is_closed());
    for p in &ring.points {
        assert!((p.z - height).abs() <= request.tolerance);
    }
    let expected = 2.0 * PI * (0.6 * 0.6 - height * height).sqrt();
    assert!((ring.length() - expected).abs() / expected < 0.05);
}

#[test]
fn no_crossing_no_polylines() {
    let request = ContourRequest::default().with_iso(5.0);
    let polylines = extract_contours(&unit_square(3), &|p: Point| p.x + p.y, &request).unwrap();
    assert!(polylines.is_empty());

    let empty = SurfaceMesh::default();
    assert!(extract_contours(&empty, &|p: Point| p.x, &request).unwrap().is_empty());
}

#[test]
fn mixed_faces_and_bad_requests() {
    // A quad with a triangle fan attached along its right edge.
    let mesh = SurfaceMesh::new(
        vec![
            Point::new(0., 0., 0.),
            Point::new(1., 0., 0.),
            Point::new(1., 1., 0.),
            Point::new(0., 1., 0.),
            Point::new(2., 0.5, 0.),
        ],
        vec![Face::Quad([0, 1, 2, 3]), Face::Triangle([1, 4, 2])],
    );
    let request = ContourRequest::default().with_iso(0.0);
    let polylines = extract_contours(&mesh, &|p: Point| p.y - 0.3, &request).unwrap();
    assert_eq!(polylines.len(), 1);
    assert_eq!(polylines[0].points.len(), 3);

    let nan_tolerance = ContourRequest::default().with_tolerance(Value::NAN);
    let err = extract_contours(&mesh, &|p: Point| p.y, &nan_tolerance).unwrap_err();
    assert!(matches!(err, IsosurfaceError::InvalidTolerance(_)));

    let mut broken = mesh.clone();
    broken.faces.push(Face::Triangle([0, 2, 7]));
    let err = extract_contours(&broken, &|p: Point| p.y, &request).unwrap_err();
    assert!(matches!(err, IsosurfaceError::InvalidFace { face: 2, vertex: 7 }));
}
