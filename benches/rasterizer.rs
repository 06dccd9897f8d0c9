/// Benchmark suite for the clipping rasterizer
/// Fill, near-clip and wireframe paths plus the depth-tested buffers.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{Mat4, UVec2, Vec2, Vec3, Vec4};
use soft_renderer::rendering::{ColorBuffer, DepthBuffer, Rasterizer, ShadedVertex, Triangle, FAR_DEPTH};
use soft_renderer::Vertex;

const RESOLUTION: UVec2 = UVec2::new(1280, 720);

fn ndc_triangle(scale: f32) -> [ShadedVertex; 3] {
    [(-0.9, -0.8), (0.85, -0.7), (0.1, 0.9)]
        .map(|(x, y)| ShadedVertex::new(Vertex::default(), Vec4::new(x * scale, y * scale, 0.5, 1.0)))
}

fn bench_fill_by_size(c: &mut Criterion) {
    let rasterizer = Rasterizer::new(RESOLUTION);
    let mut depth = DepthBuffer::new_depth(RESOLUTION);

    let mut group = c.benchmark_group("fill_triangle");
    for scale in [0.01f32, 0.1, 1.0] {
        let tri = ndc_triangle(scale);
        group.bench_with_input(BenchmarkId::from_parameter(scale), &tri, |b, tri| {
            b.iter(|| {
                depth.clear(FAR_DEPTH);
                rasterizer.fill(&depth, Triangle::new(&tri[0], &tri[1], &tri[2]), &|fragment, _| {
                    black_box(fragment);
                });
            });
        });
    }
    group.finish();
}

fn bench_near_clip(c: &mut Criterion) {
    c.bench_function("fill_near_clipped_floor", |b| {
        let projection = Mat4::perspective_lh(60f32.to_radians(), 16.0 / 9.0, 0.1, 100.0);
        let rasterizer = Rasterizer::new(RESOLUTION);
        let mut depth = DepthBuffer::new_depth(RESOLUTION);
        let floor = [Vec3::new(-20.0, -1.0, -5.0), Vec3::new(20.0, -1.0, -5.0), Vec3::new(0.0, -1.0, 60.0)]
            .map(|p| ShadedVertex::from_view(Vertex::new(p, Vec3::Y, Vec2::ZERO), &projection));

        b.iter(|| {
            depth.clear(FAR_DEPTH);
            rasterizer.fill(&depth, Triangle::new(&floor[0], &floor[1], &floor[2]), &|_, pixel| {
                black_box(pixel);
            });
        });
    });
}

fn bench_wireframe(c: &mut Criterion) {
    c.bench_function("wireframe_triangle", |b| {
        let rasterizer = Rasterizer::new(RESOLUTION);
        let mut depth = DepthBuffer::new_depth(RESOLUTION);
        let tri = ndc_triangle(1.0);

        b.iter(|| {
            depth.clear(FAR_DEPTH);
            rasterizer.wireframe(&depth, Triangle::new(&tri[0], &tri[1], &tri[2]), &|_, pixel| {
                black_box(pixel);
            });
        });
    });
}

fn bench_buffer_clear(c: &mut Criterion) {
    c.bench_function("color_buffer_clear", |b| {
        let mut color = ColorBuffer::new(RESOLUTION, Vec3::ZERO);
        b.iter(|| color.clear(black_box(Vec3::ONE)));
    });
}

fn bench_depth_test(c: &mut Criterion) {
    c.bench_function("depth_test_and_write", |b| {
        let depth = DepthBuffer::new_depth(RESOLUTION);
        let pixel = UVec2::new(100, 100);
        b.iter(|| black_box(depth.test_and_write(pixel, black_box(0.5), || {})));
    });
}

criterion_group!(
    benches,
    bench_fill_by_size,
    bench_near_clip,
    bench_wireframe,
    bench_buffer_clear,
    bench_depth_test
);
criterion_main!(benches);
