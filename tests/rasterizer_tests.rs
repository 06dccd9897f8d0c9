/// Coverage, tie-break, depth and near-clip behavior of the scanline
/// rasterizer, checked against straightforward per-pixel references.
use glam::{Mat4, UVec2, Vec2, Vec3, Vec4};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use soft_renderer::rendering::{DepthBuffer, Rasterizer, ShadedVertex, Triangle};
use soft_renderer::Vertex;
use std::cell::RefCell;
use std::collections::HashMap;

const SIZE: u32 = 64;

fn ndc(x: f32, y: f32) -> ShadedVertex {
    ShadedVertex::new(Vertex::default(), Vec4::new(x, y, 0.5, 1.0))
}

fn to_screen(p: Vec2) -> Vec2 {
    Vec2::new((p.x * 0.5 + 0.5) * SIZE as f32, (0.5 - p.y * 0.5) * SIZE as f32)
}

/// Signed distances (in pixels) from `p` to each edge of a convex polygon.
fn edge_distances(polygon: &[Vec2], p: Vec2) -> Vec<f32> {
    (0..polygon.len())
        .map(|i| {
            let a = polygon[i];
            let b = polygon[(i + 1) % polygon.len()];
            (b - a).perp_dot(p - a) / (b - a).length()
        })
        .collect()
}

/// Pixels whose centers lie strictly inside a convex screen-space polygon,
/// plus the set of pixels too close to an edge to judge.
fn reference_coverage(polygon: &[Vec2]) -> (Vec<UVec2>, Vec<UVec2>) {
    let mut inside = Vec::new();
    let mut ambiguous = Vec::new();
    for y in 0..SIZE {
        for x in 0..SIZE {
            let pixel = UVec2::new(x, y);
            let d = edge_distances(polygon, pixel.as_vec2() + 0.5);
            if d.iter().any(|d| d.abs() < 1e-3) {
                ambiguous.push(pixel);
            } else if d.iter().all(|&d| d > 0.0) || d.iter().all(|&d| d < 0.0) {
                inside.push(pixel);
            }
        }
    }
    (inside, ambiguous)
}

fn rasterize_counts(rasterizer: &Rasterizer, triangles: &[[ShadedVertex; 3]]) -> HashMap<UVec2, u32> {
    let depth = DepthBuffer::new_depth(rasterizer.resolution());
    let hits = RefCell::new(HashMap::new());
    for [a, b, c] in triangles {
        rasterizer.fill(&depth, Triangle::new(a, b, c), &|_, pixel| {
            *hits.borrow_mut().entry(pixel).or_insert(0) += 1;
        });
    }
    hits.into_inner()
}

fn assert_matches_reference(hits: &HashMap<UVec2, u32>, polygon: &[Vec2]) {
    let (inside, ambiguous) = reference_coverage(polygon);
    for pixel in &inside {
        assert!(hits.contains_key(pixel), "pixel {pixel} inside {polygon:?} was not covered");
    }
    for pixel in hits.keys() {
        assert!(
            inside.contains(pixel) || ambiguous.contains(pixel),
            "pixel {pixel} outside {polygon:?} was covered"
        );
    }
}

#[test]
fn fill_matches_pixel_center_reference_for_random_triangles() {
    let rasterizer = Rasterizer::new(UVec2::splat(SIZE));
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    let mut tested = 0;
    while tested < 200 {
        let mut p: [Vec2; 3] = std::array::from_fn(|_| Vec2::new(rng.gen_range(-1.2..1.2), rng.gen_range(-1.2..1.2)));
        let area = (p[1] - p[0]).perp_dot(p[2] - p[0]);
        if area.abs() < 0.05 {
            continue;
        }
        if area < 0.0 {
            p.swap(1, 2);
        }
        tested += 1;

        let tri = p.map(|p| ndc(p.x, p.y));
        let hits = rasterize_counts(&rasterizer, &[tri]);
        assert!(hits.values().all(|&n| n == 1), "a pixel was emitted twice for {p:?}");
        assert_matches_reference(&hits, &p.map(to_screen));
    }
}

#[test]
fn shared_edge_of_a_quad_is_covered_exactly_once() {
    let rasterizer = Rasterizer::new(UVec2::splat(SIZE));
    let corners = [
        Vec2::new(-0.69, -0.58),
        Vec2::new(0.66, -0.49),
        Vec2::new(0.57, 0.73),
        Vec2::new(-0.62, 0.61),
    ];
    let [a, b, c, d] = corners.map(|p| ndc(p.x, p.y));

    let hits = rasterize_counts(&rasterizer, &[[a, b, c], [a, c, d]]);

    let doubled: Vec<_> = hits.iter().filter(|(_, &n)| n > 1).map(|(p, _)| *p).collect();
    assert!(doubled.is_empty(), "pixels covered twice along the diagonal: {doubled:?}");
    assert_matches_reference(&hits, &corners.map(to_screen));
}

/// Vertex at a screen position given in pixels, exact for multiples of 1/64.
fn at_pixel(x: f32, y: f32) -> ShadedVertex {
    let half = SIZE as f32 / 2.0;
    ndc(x / half - 1.0, 1.0 - y / half)
}

#[test]
fn edge_through_pixel_centers_is_covered_exactly_once() {
    let rasterizer = Rasterizer::new(UVec2::splat(SIZE));
    let (a, b) = (at_pixel(15.5, 15.5), at_pixel(39.5, 35.5));
    let (below, right) = (at_pixel(37.5, 56.5), at_pixel(43.5, 22.5));

    let hits = rasterize_counts(&rasterizer, &[[a, below, b], [a, b, right]]);

    // Interior points of the shared edge that land on pixel centers.
    for k in 1..=4 {
        let pixel = UVec2::new(15 + 6 * k, 15 + 5 * k);
        assert_eq!(hits.get(&pixel), Some(&1), "pixel {pixel} on the shared edge");
    }
    assert!(hits.values().all(|&n| n == 1));
}

#[test]
fn jittered_grid_mesh_is_watertight() {
    const CELLS: u32 = 6;
    const SPACING: f32 = 8.0;
    const ORIGIN: f32 = 8.5;
    let rasterizer = Rasterizer::new(UVec2::splat(SIZE));

    // Interior vertices move by whole pixels so they stay on pixel centers;
    // the border stays a rectangle.
    let vertex = |i: u32, j: u32| {
        let mut p = Vec2::new(ORIGIN + SPACING * i as f32, ORIGIN + SPACING * j as f32);
        if (1..CELLS).contains(&i) && (1..CELLS).contains(&j) {
            p.x += ((i * 7 + j * 13) % 5) as f32 - 2.0;
            p.y += ((i * 11 + j * 3) % 5) as f32 - 2.0;
        }
        at_pixel(p.x, p.y)
    };
    let mut triangles = Vec::new();
    for j in 0..CELLS {
        for i in 0..CELLS {
            let (tl, tr, bl, br) = (vertex(i, j), vertex(i + 1, j), vertex(i, j + 1), vertex(i + 1, j + 1));
            if (i + j) % 2 == 0 {
                triangles.extend([[tl, bl, tr], [tr, bl, br]]);
            } else {
                triangles.extend([[tl, bl, br], [tl, br, tr]]);
            }
        }
    }

    let hits = rasterize_counts(&rasterizer, &triangles);

    // Centers in (8.5, 56.5] on both axes: top and left borders are exclusive.
    let covered = 9..=56;
    for y in 0..SIZE {
        for x in 0..SIZE {
            let pixel = UVec2::new(x, y);
            let expected = u32::from(covered.contains(&x) && covered.contains(&y));
            let count = hits.get(&pixel).copied().unwrap_or(0);
            assert_eq!(count, expected, "pixel {pixel} covered {count} times");
        }
    }
}

#[test]
fn redrawing_at_equal_depth_passes_every_fragment_again() {
    let rasterizer = Rasterizer::new(UVec2::splat(SIZE));
    let depth = DepthBuffer::new_depth(rasterizer.resolution());
    let tri = [ndc(-0.8, -0.7), ndc(0.9, -0.3), ndc(-0.1, 0.85)];
    let triangle = Triangle::new(&tri[0], &tri[1], &tri[2]);

    let first = RefCell::new(0u32);
    rasterizer.fill(&depth, triangle, &|_, _| *first.borrow_mut() += 1);
    let after_first = depth.to_vec();

    let second = RefCell::new(0u32);
    rasterizer.fill(&depth, triangle, &|_, _| *second.borrow_mut() += 1);

    assert!(*first.borrow() > 0);
    assert_eq!(first, second, "second pass must pass the same fragments");
    assert_eq!(after_first, depth.to_vec(), "depth must not change on a redraw");
}

#[test]
fn nearer_triangle_hides_farther_one_in_either_order() {
    let rasterizer = Rasterizer::new(UVec2::splat(SIZE));
    let near = [0.2f32; 3].map(|z| ShadedVertex::new(Vertex::default(), Vec4::new(0.0, 0.0, z, 1.0)));
    let far = near.map(|v| ShadedVertex::new(v.vertex, v.position.with_z(0.7)));
    let place = |tri: [ShadedVertex; 3]| {
        let corners = [Vec2::new(-0.9, -0.9), Vec2::new(0.9, -0.9), Vec2::new(0.0, 0.9)];
        let mut tri = tri;
        for (v, c) in tri.iter_mut().zip(corners) {
            v.position.x = c.x;
            v.position.y = c.y;
        }
        tri
    };
    let (near, far) = (place(near), place(far));

    for order in [[near, far], [far, near]] {
        let depth = DepthBuffer::new_depth(rasterizer.resolution());
        for [a, b, c] in &order {
            rasterizer.fill(&depth, Triangle::new(a, b, c), &|_, _| {});
        }
        let z = depth.get(UVec2::new(32, 32));
        assert!((z - 0.2).abs() < 1e-6, "depth {z} should come from the nearer triangle");
    }
}

#[test]
fn near_clipped_triangle_covers_what_a_ray_cast_sees() {
    let near = 1.0;
    let projection = Mat4::perspective_lh(90f32.to_radians(), 1.0, near, 100.0);
    let mut rasterizer = Rasterizer::new(UVec2::splat(SIZE));
    rasterizer.cull_back_faces = false;

    let view = [Vec3::new(-1.36, -0.69, 0.4), Vec3::new(2.01, -1.1, 6.3), Vec3::new(0.35, 2.2, 3.7)];
    let tri = view.map(|p| ShadedVertex::from_view(Vertex::new(p, Vec3::NEG_Z, Vec2::ZERO), &projection));
    let hits = rasterize_counts(&rasterizer, &[tri]);

    // The visible part of the triangle: cut at z = near, then projected.
    let mut visible = Vec::new();
    for i in 0..3 {
        let (a, b) = (view[i], view[(i + 1) % 3]);
        if a.z >= near {
            visible.push(a);
        }
        if (a.z >= near) != (b.z >= near) {
            visible.push(a.lerp(b, (near - a.z) / (b.z - a.z)));
        }
    }
    let polygon: Vec<Vec2> = visible.iter().map(|p| to_screen(Vec2::new(p.x, p.y) / p.z)).collect();
    let (inside, _) = reference_coverage(&polygon);

    let missing = inside.iter().filter(|p| !hits.contains_key(p)).count();
    let extra = hits.keys().filter(|p| !inside.contains(p)).count();
    assert!(inside.len() > 500, "reference unexpectedly small: {}", inside.len());
    assert!(missing + extra <= 2, "{missing} missing and {extra} extra pixels");
}

#[test]
fn near_clipped_fragments_have_depth_in_range() {
    let projection = Mat4::perspective_lh(90f32.to_radians(), 1.0, 1.0, 100.0);
    let mut rasterizer = Rasterizer::new(UVec2::splat(SIZE));
    rasterizer.cull_back_faces = false;
    let view = [Vec3::new(-2.0, -1.0, -3.0), Vec3::new(2.0, -1.0, -3.0), Vec3::new(0.0, -1.0, 20.0)];
    let tri = view.map(|p| ShadedVertex::from_view(Vertex::new(p, Vec3::Y, Vec2::ZERO), &projection));
    let depth = DepthBuffer::new_depth(rasterizer.resolution());

    let count = RefCell::new(0u32);
    rasterizer.fill(&depth, Triangle::new(&tri[0], &tri[1], &tri[2]), &|fragment, _| {
        let z = fragment.position.z;
        assert!((-1e-4..=1.0).contains(&z), "depth {z}");
        assert!(fragment.vertex.position.z >= 1.0 - 1e-3, "fragment in front of the near plane");
        *count.borrow_mut() += 1;
    });
    assert!(*count.borrow() > 0, "the part beyond the near plane must be drawn");
}
