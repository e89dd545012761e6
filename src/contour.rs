use std::collections::HashMap;

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::debug;

use crate::{
    error::{IsosurfaceError, Result},
    field::ScalarField,
    interp::interpolate_edge,
    polyline::join_segments,
    surface::{Face, SurfaceMesh},
    tables::{QUAD_SEGMENTS, TRIANGLE_SEGMENTS},
    types::{LineSegment, Point, Polyline, Value},
    utils::{find, union},
};

/// Traces the level set `field = iso` across the faces of `mesh`.
///
/// The field is evaluated once per vertex. Each face contributes up to two segments,
/// looked up from its below-iso corner pattern. Segments no longer than `tolerance`
/// are collapsed into a single point shared by their neighbours. The rest are then
/// chained by [`join_segments`]. Without an explicit
/// `iso` the midpoint of the smallest and largest vertex value is used.
///
/// ```text
/// vertices ─ scalar_at ─┐
/// faces ────────────────┴─ per-face segments ─ collapse short ─ join_segments
/// ```
pub fn extract_mesh_contours<F: ScalarField + ?Sized>(
    mesh: &SurfaceMesh,
    field: &F,
    iso: Option<Value>,
    tolerance: Value,
) -> Result<Vec<Polyline>> {
    mesh.validate()?;
    let _span = tracing::debug_span!(
        "contour_mesh",
        vertices = mesh.vertices.len(),
        faces = mesh.faces.len()
    )
    .entered();

    let values: Vec<Value> = mesh
        .vertices
        .par_iter()
        .map(|&p| field.scalar_at(p).map_err(IsosurfaceError::from))
        .collect::<Result<_>>()?;

    if values.is_empty() {
        return Ok(Vec::new());
    }
    let iso = iso.unwrap_or_else(|| {
        let (lo, hi) = values
            .iter()
            .fold((Value::INFINITY, Value::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        (lo + hi) * 0.5
    });

    // Per-task buffers, concatenated in face order.
    let segments = mesh
        .faces
        .par_iter()
        .fold(Vec::new, |mut buffer, face| {
            face_segments(mesh, &values, face, iso, tolerance, &mut buffer);
            buffer
        })
        .reduce(Vec::new, |mut left, mut right| {
            left.append(&mut right);
            left
        });

    let crossings = segments.len();
    let segments = collapse_short_segments(segments, tolerance);
    debug!(
        iso,
        crossings,
        segments = segments.len(),
        "contoured faces"
    );
    Ok(join_segments(&segments, tolerance))
}

/// Discards segments no longer than `tolerance`, merging both ends of each into one
/// point so the segments on either side still meet.
///
/// Ends are matched by exact position, which is what faces sharing an edge produce. A
/// run of short segments collapses onto the point met first. Longer segments whose
/// two ends end up merged are discarded too.
fn collapse_short_segments(segments: Vec<LineSegment>, tolerance: Value) -> Vec<LineSegment> {
    let mut index: HashMap<[u32; 3], usize> = HashMap::new();
    let mut points: Vec<Point> = Vec::new();
    let mut ends = Vec::with_capacity(segments.len());
    for segment in &segments {
        let [a, b] = [segment.start, segment.end].map(|p| {
            // Adding zero folds -0.0 into 0.0.
            let key = [p.x, p.y, p.z].map(|c| (c + 0.0).to_bits());
            *index.entry(key).or_insert_with(|| {
                points.push(p);
                points.len() - 1
            })
        });
        ends.push([a, b]);
    }

    let mut parent: Vec<usize> = (0..points.len()).collect();
    for (segment, &[a, b]) in segments.iter().zip(&ends) {
        if segment.length() <= tolerance {
            union(&mut parent, a, b);
        }
    }

    ends.into_iter()
        .filter_map(|[a, b]| {
            let (a, b) = (find(&mut parent, a), find(&mut parent, b));
            (a != b).then(|| LineSegment::new(points[a], points[b]))
        })
        .collect()
}

fn face_segments(
    mesh: &SurfaceMesh,
    values: &[Value],
    face: &Face,
    iso: Value,
    tolerance: Value,
    out: &mut Vec<LineSegment>,
) {
    let corners = face.vertices();
    let state = corners
        .iter()
        .enumerate()
        .filter(|&(_, &v)| values[v] < iso)
        .fold(0, |state, (i, _)| state | (1 << i));

    let table = match face {
        Face::Triangle(_) => TRIANGLE_SEGMENTS[state],
        Face::Quad(_) => QUAD_SEGMENTS[state],
    };

    let crossing = |[a, b]: [usize; 2]| {
        let (a, b) = (corners[a], corners[b]);
        interpolate_edge(
            mesh.vertices[a],
            mesh.vertices[b],
            values[a],
            values[b],
            iso,
            tolerance,
        )
    };

    for &[from, to] in table {
        out.push(LineSegment::new(crossing(from), crossing(to)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_quad() -> SurfaceMesh {
        SurfaceMesh::grid(0.0..1.0, 0.0..1.0, 1, 1)
    }

    #[test]
    fn single_crossing() {
        let field = |p: Point| p.y - 0.25;
        let polylines = extract_mesh_contours(&unit_quad(), &field, Some(0.0), 1e-6).unwrap();
        assert_eq!(polylines.len(), 1);
        let points = &polylines[0].points;
        assert_eq!(points.len(), 2);
        // The region below the isovalue lies to the left of the segment.
        assert!(points[0].x > points[1].x);
        assert!(points.iter().all(|p| (p.y - 0.25).abs() < 1e-6));
    }

    #[test]
    fn saddle_quads_cut_two_corners() {
        let saddle = |p: Point| -4.0 * (p.x - 0.5) * (p.y - 0.5);
        let polylines = extract_mesh_contours(&unit_quad(), &saddle, Some(0.0), 1e-6).unwrap();
        assert_eq!(polylines.len(), 2);
        assert!(polylines.iter().all(|l| l.points.len() == 2));
        assert_eq!(
            polylines[0].points,
            vec![Point::new(0.5, 0., 0.), Point::new(0., 0.5, 0.)]
        );
    }

    #[test]
    fn triangles_use_their_own_table() {
        let mesh = SurfaceMesh::new(
            vec![
                Point::new(0., 0., 0.),
                Point::new(1., 0., 0.),
                Point::new(0., 1., 0.),
            ],
            vec![Face::Triangle([0, 1, 2])],
        );
        let polylines = extract_mesh_contours(&mesh, &|p: Point| p.x, Some(0.5), 1e-6).unwrap();
        assert_eq!(polylines.len(), 1);
        assert_eq!(
            polylines[0].points,
            vec![Point::new(0.5, 0., 0.), Point::new(0.5, 0.5, 0.)]
        );
    }

    #[test]
    fn default_iso_is_the_vertex_midpoint() {
        let field = |p: Point| 10.0 * p.x;
        let polylines = extract_mesh_contours(&unit_quad(), &field, None, 1e-6).unwrap();
        assert_eq!(polylines.len(), 1);
        assert!(polylines[0].points.iter().all(|p| (p.x - 0.5).abs() < 1e-6));
    }

    #[test]
    fn degenerate_inputs() {
        let empty = SurfaceMesh::default();
        assert!(extract_mesh_contours(&empty, &|p: Point| p.x, None, 1e-6)
            .unwrap()
            .is_empty());

        let above = |p: Point| p.x + 1.0;
        let no_crossing = extract_mesh_contours(&unit_quad(), &above, Some(0.0), 1e-6).unwrap();
        assert!(no_crossing.is_empty());

        let mut broken = unit_quad();
        broken.faces.push(Face::Quad([0, 1, 2, 4]));
        let err = extract_mesh_contours(&broken, &|p: Point| p.x, None, 1e-6).unwrap_err();
        assert!(matches!(err, IsosurfaceError::InvalidFace { face: 1, vertex: 4 }));
    }

    fn seg(a: [Value; 2], b: [Value; 2]) -> LineSegment {
        LineSegment::new(Point::new(a[0], a[1], 0.), Point::new(b[0], b[1], 0.))
    }

    #[test]
    fn short_segments_do_not_open_gaps() {
        // Two consecutive short pieces span more than the tolerance together.
        let segments = vec![
            seg([0., 0.], [1., 0.]),
            seg([1., 0.], [1., 6e-5]),
            seg([1., 6e-5], [1., 1.2e-4]),
            seg([1., 1.2e-4], [1., 1.]),
            seg([1., 1.], [0., 1.]),
            seg([0., 1.], [0., 0.]),
        ];
        let collapsed = collapse_short_segments(segments, 1e-4);
        assert_eq!(collapsed.len(), 4);
        assert_eq!(collapsed[1].start, Point::new(1., 0., 0.));

        let polylines = join_segments(&collapsed, 1e-4);
        assert_eq!(polylines.len(), 1);
        assert!(polylines[0].is_closed());
        assert_eq!(polylines[0].segment_count(), 4);
    }

    #[test]
    fn zero_tolerance_only_drops_points() {
        let segments = vec![seg([0., 0.], [1., 0.]), seg([1., 0.], [1., 0.])];
        assert_eq!(
            collapse_short_segments(segments, 0.0),
            vec![seg([0., 0.], [1., 0.])]
        );
    }
}
