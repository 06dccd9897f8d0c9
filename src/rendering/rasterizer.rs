/// Clipping scanline rasterizer.
///
/// Triangles arrive in clip space (D3D depth convention, w = view depth).
/// Only the near plane is clipped geometrically; the other planes are
/// handled by clamping scanlines and pixel spans to the resolution.
use super::framebuffer::DepthBuffer;
use crate::material::RasterizeMode;
use crate::perf::FUNCTION_COUNTERS;
use crate::scene::Vertex;
use crate::count_call;
use glam::{DVec2, DVec3, Mat4, UVec2, Vec2, Vec4, Vec4Swizzles};
use std::ops::{BitAnd, BitOr};

/// Sign of the NDC cross product `(v1 - v0) x (v2 - v0)` for a front face.
/// Positive: counter-clockwise with y up.
pub const FRONT_FACE_SIGN: f32 = 1.0;

/// Vertex attributes plus a homogeneous position. Before the viewport
/// transform the position is in clip space; after it, `(x, y)` are pixel
/// coordinates, `z` is depth and `w` holds `1 / view depth`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ShadedVertex {
    pub vertex: Vertex,
    pub position: Vec4,
}

impl ShadedVertex {
    pub const fn new(vertex: Vertex, position: Vec4) -> Self {
        Self { vertex, position }
    }

    /// Projects a view-space vertex into clip space.
    pub fn from_view(vertex: Vertex, projection: &Mat4) -> Self {
        Self {
            vertex,
            position: *projection * vertex.position.extend(1.0),
        }
    }

    #[inline]
    fn lerp(a: &ShadedVertex, b: &ShadedVertex, t: f32) -> ShadedVertex {
        ShadedVertex {
            vertex: Vertex::lerp(&a.vertex, &b.vertex, t),
            position: a.position.lerp(b.position, t),
        }
    }
}

/// Three borrowed vertices.
#[derive(Copy, Clone, Debug)]
pub struct Triangle<'a> {
    pub v0: &'a ShadedVertex,
    pub v1: &'a ShadedVertex,
    pub v2: &'a ShadedVertex,
}

impl<'a> Triangle<'a> {
    pub const fn new(v0: &'a ShadedVertex, v1: &'a ShadedVertex, v2: &'a ShadedVertex) -> Self {
        Self { v0, v1, v2 }
    }

    fn from_array(vertices: &'a [ShadedVertex; 3]) -> Self {
        Self::new(&vertices[0], &vertices[1], &vertices[2])
    }

    /// Same winding, starting at the next vertex.
    #[inline]
    fn rotated(self) -> Self {
        Self::new(self.v1, self.v2, self.v0)
    }

    #[inline]
    fn vertices(&self) -> [&'a ShadedVertex; 3] {
        [self.v0, self.v1, self.v2]
    }
}

/// One bit per frustum plane a clip-space position lies outside of.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ClipCode(u8);

impl ClipCode {
    pub const INSIDE: ClipCode = ClipCode(0);
    pub const LEFT: ClipCode = ClipCode(1);
    pub const RIGHT: ClipCode = ClipCode(1 << 1);
    pub const BOTTOM: ClipCode = ClipCode(1 << 2);
    pub const TOP: ClipCode = ClipCode(1 << 3);
    pub const NEAR: ClipCode = ClipCode(1 << 4);
    pub const FAR: ClipCode = ClipCode(1 << 5);

    pub fn compute(p: Vec4) -> ClipCode {
        let mut bits = 0;
        if p.x < -p.w {
            bits |= Self::LEFT.0;
        }
        if p.x > p.w {
            bits |= Self::RIGHT.0;
        }
        if p.y < -p.w {
            bits |= Self::BOTTOM.0;
        }
        if p.y > p.w {
            bits |= Self::TOP.0;
        }
        if p.z < 0.0 {
            bits |= Self::NEAR.0;
        }
        if p.z > p.w {
            bits |= Self::FAR.0;
        }
        ClipCode(bits)
    }

    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn is_inside(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn contains(self, other: ClipCode) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ClipCode {
    type Output = ClipCode;
    fn bitor(self, rhs: ClipCode) -> ClipCode {
        ClipCode(self.0 | rhs.0)
    }
}

impl BitAnd for ClipCode {
    type Output = ClipCode;
    fn bitand(self, rhs: ClipCode) -> ClipCode {
        ClipCode(self.0 & rhs.0)
    }
}

/// How a triangle relates to the frustum.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    /// Entirely outside one plane.
    Rejected,
    /// Crosses the near plane and must be split.
    NeedsNearClip,
    /// Rasterize as is.
    Accepted,
}

pub fn classify(triangle: &Triangle<'_>) -> Classification {
    let [c0, c1, c2] = triangle.vertices().map(|v| ClipCode::compute(v.position));
    if !(c0 & c1 & c2).is_inside() {
        Classification::Rejected
    } else if (c0 | c1 | c2).contains(ClipCode::NEAR) {
        Classification::NeedsNearClip
    } else {
        Classification::Accepted
    }
}

/// Point where the edge from `inside` to `outside` crosses clip z = 0.
#[inline]
fn near_intersection(inside: &ShadedVertex, outside: &ShadedVertex) -> ShadedVertex {
    let t = inside.position.z / (inside.position.z - outside.position.z);
    let mut clipped = ShadedVertex::lerp(inside, outside, t);
    clipped.position.z = 0.0;
    clipped
}

#[inline]
fn behind_near(v: &ShadedVertex) -> bool {
    v.position.z < 0.0
}

/// Splits a triangle crossing the near plane into the part in front of
/// it: one triangle when two vertices are behind, two when one is.
/// Winding is preserved.
pub fn clip_near(triangle: &Triangle<'_>) -> (usize, [[ShadedVertex; 3]; 2]) {
    let mut tri = *triangle;
    let behind = tri.vertices().into_iter().filter(|&v| behind_near(v)).count();
    let mut out = [[ShadedVertex::default(); 3]; 2];

    match behind {
        1 => {
            while !behind_near(tri.v0) {
                tri = tri.rotated();
            }
            let p01 = near_intersection(tri.v1, tri.v0);
            let p02 = near_intersection(tri.v2, tri.v0);
            out[0] = [p01, *tri.v1, p02];
            out[1] = [p02, *tri.v1, *tri.v2];
            (2, out)
        }
        2 => {
            while behind_near(tri.v2) {
                tri = tri.rotated();
            }
            let p0 = near_intersection(tri.v2, tri.v0);
            let p1 = near_intersection(tri.v2, tri.v1);
            out[0] = [p0, p1, *tri.v2];
            (1, out)
        }
        _ => (0, out),
    }
}

/// Part of an edge in front of the near plane.
fn clip_edge_near(a: &ShadedVertex, b: &ShadedVertex) -> Option<(ShadedVertex, ShadedVertex)> {
    match (behind_near(a), behind_near(b)) {
        (false, false) => Some((*a, *b)),
        (true, true) => None,
        (false, true) => Some((*a, near_intersection(a, b))),
        (true, false) => Some((near_intersection(b, a), *b)),
    }
}

/// Doubled signed area of `p` against the directed edge `a -> b`. The
/// endpoints are always taken in (y, x) order and the result negated for
/// the reverse direction, so two triangles sharing an edge compute exactly
/// opposite values at every point.
#[inline]
fn edge_function(a: DVec2, b: DVec2, p: DVec2) -> f64 {
    if (a.y, a.x) <= (b.y, b.x) {
        (b - a).perp_dot(p - a)
    } else {
        -(a - b).perp_dot(p - b)
    }
}

/// One edge of a screen-space triangle with positive area (clockwise on
/// screen, y down). Points strictly inside give positive values.
struct Edge {
    a: DVec2,
    b: DVec2,
    /// Right edges, and bottom edges when horizontal, own the pixel
    /// centers lying exactly on them.
    owns_boundary: bool,
}

impl Edge {
    fn new(a: DVec2, b: DVec2) -> Self {
        let d = b - a;
        Self {
            a,
            b,
            owns_boundary: d.y > 0.0 || (d.y == 0.0 && d.x < 0.0),
        }
    }

    #[inline]
    fn eval(&self, p: DVec2) -> f64 {
        edge_function(self.a, self.b, p)
    }

    #[inline]
    fn covers(&self, value: f64) -> bool {
        value > 0.0 || (value == 0.0 && self.owns_boundary)
    }

    /// x where a non-horizontal edge crosses the row at `y`.
    #[inline]
    fn crossing(&self, y: f64) -> Option<f64> {
        let (top, bottom) = if self.a.y < self.b.y { (self.a, self.b) } else { (self.b, self.a) };
        if top.y == bottom.y || y < top.y || y > bottom.y {
            return None;
        }
        Some(top.x + (y - top.y) * (bottom.x - top.x) / (bottom.y - top.y))
    }
}

/// Parametric range of `start + t * delta`, `t` in [0, 1], that stays
/// inside `[0, size]` on both axes.
fn clip_to_viewport(start: Vec2, delta: Vec2, size: Vec2) -> Option<(f32, f32)> {
    let (mut t0, mut t1) = (0.0f32, 1.0f32);
    for (p, q) in [
        (-delta.x, start.x),
        (delta.x, size.x - start.x),
        (-delta.y, start.y),
        (delta.y, size.y - start.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else if p < 0.0 {
            t0 = t0.max(q / p);
        } else {
            t1 = t1.min(q / p);
        }
    }
    (t0 <= t1).then_some((t0, t1))
}

/// Converts triangles into depth-tested fragments. Each fragment that
/// passes the depth test is handed to the caller's continuation with its
/// pixel coordinate, while the depth buffer still holds that pixel.
#[derive(Copy, Clone, Debug)]
pub struct Rasterizer {
    resolution: UVec2,
    pub cull_back_faces: bool,
}

impl Rasterizer {
    pub fn new(resolution: UVec2) -> Self {
        Self {
            resolution,
            cull_back_faces: true,
        }
    }

    #[inline]
    pub fn resolution(&self) -> UVec2 {
        self.resolution
    }

    pub fn rasterize<F>(&self, mode: RasterizeMode, depth: &DepthBuffer, triangle: Triangle<'_>, on_pixel: &F)
    where
        F: Fn(&ShadedVertex, UVec2),
    {
        match mode {
            RasterizeMode::Fill => self.fill(depth, triangle, on_pixel),
            RasterizeMode::Line => self.wireframe(depth, triangle, on_pixel),
        }
    }

    /// Filled triangle.
    pub fn fill<F>(&self, depth: &DepthBuffer, triangle: Triangle<'_>, on_pixel: &F)
    where
        F: Fn(&ShadedVertex, UVec2),
    {
        debug_assert_eq!(depth.size(), self.resolution, "depth buffer resolution mismatch");
        count_call!(FUNCTION_COUNTERS.triangles_submitted);

        match classify(&triangle) {
            Classification::Rejected => {
                count_call!(FUNCTION_COUNTERS.triangles_trivially_rejected);
            }
            Classification::NeedsNearClip => {
                count_call!(FUNCTION_COUNTERS.triangles_near_clipped);
                let (count, clipped) = clip_near(&triangle);
                for vertices in &clipped[..count] {
                    self.fill(depth, Triangle::from_array(vertices), on_pixel);
                }
            }
            Classification::Accepted => {
                if self.is_front_facing(&triangle) {
                    self.scan_convert(depth, &triangle, on_pixel);
                } else {
                    count_call!(FUNCTION_COUNTERS.triangles_backface_culled);
                }
            }
        }
    }

    /// Triangle edges only. Each edge is cut at the near plane on its own,
    /// so the near-plane cut itself is never drawn.
    pub fn wireframe<F>(&self, depth: &DepthBuffer, triangle: Triangle<'_>, on_pixel: &F)
    where
        F: Fn(&ShadedVertex, UVec2),
    {
        debug_assert_eq!(depth.size(), self.resolution, "depth buffer resolution mismatch");
        count_call!(FUNCTION_COUNTERS.triangles_submitted);

        let front = match classify(&triangle) {
            Classification::Rejected => {
                count_call!(FUNCTION_COUNTERS.triangles_trivially_rejected);
                return;
            }
            Classification::NeedsNearClip => {
                count_call!(FUNCTION_COUNTERS.triangles_near_clipped);
                match clip_near(&triangle) {
                    (0, _) => return,
                    (_, clipped) => self.is_front_facing(&Triangle::from_array(&clipped[0])),
                }
            }
            Classification::Accepted => self.is_front_facing(&triangle),
        };
        if !front {
            count_call!(FUNCTION_COUNTERS.triangles_backface_culled);
            return;
        }

        let Triangle { v0, v1, v2 } = triangle;
        for (a, b) in [(v0, v1), (v1, v2), (v2, v0)] {
            if let Some((a, b)) = clip_edge_near(a, b) {
                self.draw_line(depth, &a, &b, on_pixel);
            }
        }
    }

    pub fn is_front_facing(&self, triangle: &Triangle<'_>) -> bool {
        if !self.cull_back_faces {
            return true;
        }
        let [a, b, c] = triangle.vertices().map(|v| v.position.xy() / v.position.w);
        (b - a).perp_dot(c - a) * FRONT_FACE_SIGN > 0.0
    }

    /// Perspective divide and viewport mapping. Row 0 is the top row.
    #[inline]
    pub fn to_screen(&self, v: &ShadedVertex) -> ShadedVertex {
        let inv_w = 1.0 / v.position.w;
        let ndc = v.position.truncate() * inv_w;
        let size = self.resolution.as_vec2();
        ShadedVertex {
            vertex: v.vertex,
            position: Vec4::new(
                (ndc.x * 0.5 + 0.5) * size.x,
                (0.5 - ndc.y * 0.5) * size.y,
                ndc.z,
                inv_w,
            ),
        }
    }

    /// Covers every pixel whose center passes all three edge functions.
    /// Rows are walked over the triangle's vertical extent; each row only
    /// tests the columns between its edge crossings, widened by a pixel.
    fn scan_convert<F>(&self, depth: &DepthBuffer, triangle: &Triangle<'_>, on_pixel: &F)
    where
        F: Fn(&ShadedVertex, UVec2),
    {
        let mut v = triangle.vertices().map(|v| self.to_screen(v));
        let mut p = v.map(|v| v.position.xy().as_dvec2());
        let mut area = (p[1] - p[0]).perp_dot(p[2] - p[0]);
        if area == 0.0 || !area.is_finite() {
            count_call!(FUNCTION_COUNTERS.triangles_degenerate);
            return;
        }
        if area < 0.0 {
            v.swap(1, 2);
            p.swap(1, 2);
            area = -area;
        }

        // Edge i is opposite vertex i, so its value is that vertex's weight.
        let edges = [Edge::new(p[1], p[2]), Edge::new(p[2], p[0]), Edge::new(p[0], p[1])];
        let over_w = v.map(|v| (v.vertex.scaled(v.position.w), v.position));
        let inv_area = 1.0 / area;

        let min_y = p[0].y.min(p[1].y).min(p[2].y);
        let max_y = p[0].y.max(p[1].y).max(p[2].y);
        let last_row = f64::from(self.resolution.y) - 1.0;
        let last_column = f64::from(self.resolution.x) - 1.0;
        let y_start = (min_y - 0.5).floor().max(0.0);
        let y_end = (max_y - 0.5).ceil().min(last_row);
        if y_start > y_end {
            return;
        }

        for y in y_start as u32..=y_end as u32 {
            let center_y = f64::from(y) + 0.5;
            let mut span: Option<(f64, f64)> = None;
            for x in edges.iter().filter_map(|edge| edge.crossing(center_y)) {
                span = Some(match span {
                    Some((lo, hi)) => (lo.min(x), hi.max(x)),
                    None => (x, x),
                });
            }
            let Some((lo, hi)) = span else {
                continue;
            };
            let x_start = ((lo - 0.5).floor() - 1.0).max(0.0);
            let x_end = ((hi - 0.5).ceil() + 1.0).min(last_column);
            if x_start > x_end {
                continue;
            }

            for x in x_start as u32..=x_end as u32 {
                let center = DVec2::new(f64::from(x) + 0.5, center_y);
                let values = edges.each_ref().map(|edge| edge.eval(center));
                if !edges.iter().zip(values).all(|(edge, value)| edge.covers(value)) {
                    continue;
                }
                let w = (DVec3::from_array(values) * inv_area).as_vec3();
                let position = over_w[0].1 * w.x + over_w[1].1 * w.y + over_w[2].1 * w.z;
                let vertex = Vertex::blend3(&over_w[0].0, &over_w[1].0, &over_w[2].0, w)
                    .scaled(1.0 / position.w);
                let fragment = ShadedVertex { vertex, position };
                self.submit(depth, &fragment, UVec2::new(x, y), on_pixel);
            }
        }
    }

    /// DDA in one-pixel steps over the part of the segment inside the
    /// viewport; attributes step in `value / w` space, depth steps linearly.
    fn draw_line<F>(&self, depth: &DepthBuffer, a: &ShadedVertex, b: &ShadedVertex, on_pixel: &F)
    where
        F: Fn(&ShadedVertex, UVec2),
    {
        count_call!(FUNCTION_COUNTERS.lines_drawn);
        let a = self.to_screen(a);
        let b = self.to_screen(b);
        let size = self.resolution.as_vec2();
        let delta = (b.position - a.position).xy();
        let Some((t0, t1)) = clip_to_viewport(a.position.xy(), delta, size) else {
            return;
        };
        let steps = (delta * (t1 - t0)).abs().max_element() as u32;

        let a_over_w = a.vertex.scaled(a.position.w);
        let b_over_w = b.vertex.scaled(b.position.w);

        for step in 0..=steps {
            let t = if steps == 0 {
                t0
            } else {
                t0 + (t1 - t0) * (step as f32 / steps as f32)
            };
            let position = a.position.lerp(b.position, t);
            if position.x < 0.0 || position.y < 0.0 || position.x >= size.x || position.y >= size.y {
                continue;
            }
            let vertex = Vertex::lerp(&a_over_w, &b_over_w, t).scaled(1.0 / position.w);
            let fragment = ShadedVertex { vertex, position };
            let pixel = UVec2::new(position.x as u32, position.y as u32);
            self.submit(depth, &fragment, pixel, on_pixel);
        }
    }

    #[inline]
    fn submit<F>(&self, depth: &DepthBuffer, fragment: &ShadedVertex, pixel: UVec2, on_pixel: &F)
    where
        F: Fn(&ShadedVertex, UVec2),
    {
        let z = fragment.position.z;
        if z > 1.0 {
            return;
        }
        depth.test_and_write(pixel, z, || on_pixel(fragment, pixel));
    }
}
