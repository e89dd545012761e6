use std::collections::VecDeque;

use tracing::debug;

use crate::{
    types::{LineSegment, Point, Polyline, Value},
    utils::PointBuckets,
};

/// Chains segments whose endpoints lie within `tolerance` of each other into maximal
/// polylines.
///
/// Segments are taken as seeds in input order. A seed is first grown at its end, then
/// at its start, one segment at a time; segments are reversed as needed to fit. When
/// several unused endpoints are in reach the nearest wins, and among equally near ones
/// the segment that came first in `segments` (its start before its end). A chain of at
/// least three segments whose two ends meet within `tolerance` is closed by setting
/// its last point to its first.
///
/// Every segment ends up in exactly one polyline.
pub fn join_segments(segments: &[LineSegment], tolerance: Value) -> Vec<Polyline> {
    let _span = tracing::debug_span!("join_segments", segments = segments.len()).entered();

    // Endpoint ids: 2·segment for the start, 2·segment + 1 for the end.
    let endpoint = |id: usize| {
        let segment = &segments[id / 2];
        if id % 2 == 0 { segment.start } else { segment.end }
    };

    let mut buckets = PointBuckets::new(tolerance);
    for (i, segment) in segments.iter().enumerate() {
        buckets.insert(&segment.start, 2 * i);
        buckets.insert(&segment.end, 2 * i + 1);
    }

    let mut used = vec![false; segments.len()];
    let nearest_free = |used: &[bool], at: &Point| -> Option<usize> {
        buckets
            .candidates(at)
            .into_iter()
            .filter(|&id| !used[id / 2])
            .map(|id| (nalgebra::distance(at, &endpoint(id)), id))
            .filter(|&(distance, _)| distance <= tolerance)
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
            .map(|(_, id)| id)
    };

    let mut polylines = Vec::new();
    let mut closed = 0;

    for seed in 0..segments.len() {
        if used[seed] {
            continue;
        }
        used[seed] = true;
        let mut chain = VecDeque::from([segments[seed].start, segments[seed].end]);

        while let Some(tail) = chain.back().copied() {
            let Some(id) = nearest_free(&used, &tail) else {
                break;
            };
            used[id / 2] = true;
            // Continue from the endpoint that was not matched.
            chain.push_back(endpoint(id ^ 1));
        }

        while let Some(head) = chain.front().copied() {
            let Some(id) = nearest_free(&used, &head) else {
                break;
            };
            used[id / 2] = true;
            chain.push_front(endpoint(id ^ 1));
        }

        let mut points: Vec<Point> = chain.into();
        let last = points.len() - 1;
        if last >= 3 && nalgebra::distance(&points[0], &points[last]) <= tolerance {
            points[last] = points[0];
        }
        let polyline = Polyline::new(points);
        if polyline.is_closed() {
            closed += 1;
        }
        polylines.push(polyline);
    }

    debug!(polylines = polylines.len(), closed, "joined segments");
    polylines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(a: [Value; 2], b: [Value; 2]) -> LineSegment {
        LineSegment::new(Point::new(a[0], a[1], 0.), Point::new(b[0], b[1], 0.))
    }

    #[test]
    fn joins_and_reverses_segments() {
        let segments = [
            seg([1., 0.], [2., 0.]),
            seg([3., 0.], [2., 0.]),
            seg([0., 0.], [1., 0.]),
        ];
        let polylines = join_segments(&segments, 1e-6);
        assert_eq!(polylines.len(), 1);
        let xs: Vec<Value> = polylines[0].points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0., 1., 2., 3.]);
        assert!(!polylines[0].is_closed());
        assert!((polylines[0].length() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn closes_loops() {
        let segments = [
            seg([0., 0.], [1., 0.]),
            seg([1., 1.], [0., 1.]),
            seg([1., 0.], [1., 1.]),
            seg([0., 1.], [0., 1e-5]),
        ];
        let polylines = join_segments(&segments, 1e-4);
        assert_eq!(polylines.len(), 1);
        assert!(polylines[0].is_closed());
        assert_eq!(polylines[0].segment_count(), 4);
    }

    #[test]
    fn separate_chains_stay_separate() {
        let segments = [
            seg([0., 0.], [1., 0.]),
            seg([0., 5.], [1., 5.]),
            seg([1., 0.], [2., 0.]),
        ];
        let polylines = join_segments(&segments, 1e-3);
        assert_eq!(polylines.len(), 2);
        assert_eq!(polylines[0].points.len(), 3);
        assert_eq!(polylines[1].points.len(), 2);
    }

    #[test]
    fn nearest_then_first_endpoint_wins() {
        // Both branches touch the tail of the seed; the nearer one is taken.
        let segments = [
            seg([0., 0.], [1., 0.]),
            seg([1.0005, 0.], [1., 1.]),
            seg([1.0001, 0.], [2., 0.]),
        ];
        let polylines = join_segments(&segments, 1e-3);
        assert_eq!(polylines[0].points.last(), Some(&Point::new(2., 0., 0.)));

        // At equal distance the earlier segment is taken.
        let segments = [
            seg([0., 0.], [1., 0.]),
            seg([1., 0.], [1., 1.]),
            seg([1., 0.], [2., 0.]),
        ];
        let polylines = join_segments(&segments, 1e-3);
        assert_eq!(polylines.len(), 2);
        assert_eq!(polylines[0].points.last(), Some(&Point::new(1., 1., 0.)));
        assert_eq!(polylines[1].points.len(), 2);
    }

    #[test]
    fn zero_tolerance_needs_exact_matches() {
        let segments = [seg([0., 0.], [1., 0.]), seg([1.0001, 0.], [2., 0.])];
        assert_eq!(join_segments(&segments, 0.0).len(), 2);
        assert_eq!(join_segments(&segments, 1e-3).len(), 1);
        assert!(join_segments(&[], 1e-3).is_empty());
    }
}
