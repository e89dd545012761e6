//! Extraction throughput on a sphere and a high-frequency field.
//!
//! Run with: cargo bench --bench extract_bench

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use bevy_isosurface::{
    Algorithm, BoundingBox, ContourRequest, GridRequest, NormalMode, Point, SurfaceMesh, Value,
    Vector, cube::march_cubes, extract_contours, extract_isosurface, field::Sphere,
    lattice::Lattice, tetra::march_tetrahedra,
};

const RESOLUTIONS: [usize; 3] = [16, 32, 64];

fn wavy(p: Point) -> Value {
    (7.0 * p.x).sin() * (5.0 * p.y).cos() + (6.0 * p.z).sin() * 0.5
}

fn bounds() -> BoundingBox {
    BoundingBox::from_center(Point::origin(), Vector::repeat(2.0))
}

/// Sampling alone, one field evaluation per lattice point.
fn bench_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_lattice");

    for n in RESOLUTIONS {
        group.throughput(Throughput::Elements((n * n * n) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| Lattice::sample(&bounds(), black_box([n; 3]), &wavy, false))
        });
    }

    group.finish();
}

/// Polygonization of an already sampled lattice, without assembly.
fn bench_polygonizers(c: &mut Criterion) {
    let mut group = c.benchmark_group("polygonize");

    for n in RESOLUTIONS {
        let lattice = Lattice::sample(&bounds(), [n; 3], &wavy, false).unwrap();
        let cells = (n - 1).pow(3) as u64;
        group.throughput(Throughput::Elements(cells));

        group.bench_with_input(BenchmarkId::new("cube", n), &lattice, |b, lattice| {
            b.iter(|| march_cubes(black_box(lattice), 0.0, 1e-4))
        });
        group.bench_with_input(BenchmarkId::new("tetrahedron", n), &lattice, |b, lattice| {
            b.iter(|| march_tetrahedra(black_box(lattice), 0.0, 1e-4))
        });
    }

    group.finish();
}

/// The whole pipeline, per normal mode.
fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_isosurface");
    group.sample_size(20);

    let sphere = Sphere {
        center: Point::origin(),
        radius: 0.7,
    };
    let base = GridRequest::default()
        .with_bounds(bounds())
        .with_resolution([48; 3])
        .with_iso(0.0);

    for algorithm in [Algorithm::Cube, Algorithm::Tetrahedron] {
        for normals in [NormalMode::Topological, NormalMode::Gradient] {
            let request = base.with_algorithm(algorithm).with_normals(normals);
            let id = BenchmarkId::new(format!("{algorithm:?}"), format!("{normals:?}"));
            group.bench_with_input(id, &request, |b, request| {
                b.iter(|| extract_isosurface(&sphere, black_box(request)))
            });
        }
    }

    group.finish();
}

fn bench_contours(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_contours");
    let request = ContourRequest::default().with_iso(0.0);

    for n in [64, 256] {
        let mesh = SurfaceMesh::grid(-1.0..1.0, -1.0..1.0, n, n);
        group.throughput(Throughput::Elements(mesh.faces.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &mesh, |b, mesh| {
            b.iter(|| extract_contours(black_box(mesh), &wavy, &request))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_sampling,
    bench_polygonizers,
    bench_extract,
    bench_contours
);
criterion_main!(benches);
