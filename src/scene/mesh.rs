/// Vertex data, sub-meshes and a few procedural mesh builders.
use crate::error::{RenderError, Result};
use crate::material::Material;
use glam::{Vec2, Vec3};
use std::sync::Arc;

/// Position, normal and texture coordinate. Model space on input; the
/// pipelines emit view-space copies.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl Vertex {
    pub const fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self { position, normal, uv }
    }

    #[inline]
    pub fn scaled(&self, s: f32) -> Vertex {
        Vertex {
            position: self.position * s,
            normal: self.normal * s,
            uv: self.uv * s,
        }
    }

    #[inline]
    pub fn lerp(a: &Vertex, b: &Vertex, t: f32) -> Vertex {
        Vertex {
            position: a.position.lerp(b.position, t),
            normal: a.normal.lerp(b.normal, t),
            uv: a.uv.lerp(b.uv, t),
        }
    }

    /// Weighted sum of three vertices, each field blended on its own.
    #[inline]
    pub fn blend3(a: &Vertex, b: &Vertex, c: &Vertex, w: Vec3) -> Vertex {
        Vertex {
            position: a.position * w.x + b.position * w.y + c.position * w.z,
            normal: a.normal * w.x + b.normal * w.y + c.normal * w.z,
            uv: a.uv * w.x + b.uv * w.y + c.uv * w.z,
        }
    }
}

/// Indexed triangle list sharing one material.
#[derive(Clone, Debug)]
pub struct SubMesh {
    vertices: Vec<Vertex>,
    indices: Vec<u16>,
    pub material: Arc<Material>,
}

impl SubMesh {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u16>, material: Arc<Material>) -> Result<Self> {
        if vertices.len() > usize::from(u16::MAX) + 1 {
            return Err(RenderError::TooManyVertices(vertices.len()));
        }
        if indices.len() % 3 != 0 {
            return Err(RenderError::IndexCountNotTriangles(indices.len()));
        }
        if let Some(&index) = indices.iter().find(|&&i| usize::from(i) >= vertices.len()) {
            return Err(RenderError::IndexOutOfRange {
                index,
                vertex_count: vertices.len(),
            });
        }
        Ok(Self { vertices, indices, material })
    }

    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[inline]
    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Quad in the z = 0 plane facing -z, centered on the origin.
/// uv (0, 0) is the top-left corner.
pub fn quad(half_width: f32, half_height: f32, material: Arc<Material>) -> Result<SubMesh> {
    let normal = Vec3::NEG_Z;
    let vertices = vec![
        Vertex::new(Vec3::new(-half_width, -half_height, 0.0), normal, Vec2::new(0.0, 1.0)),
        Vertex::new(Vec3::new(half_width, -half_height, 0.0), normal, Vec2::new(1.0, 1.0)),
        Vertex::new(Vec3::new(half_width, half_height, 0.0), normal, Vec2::new(1.0, 0.0)),
        Vertex::new(Vec3::new(-half_width, half_height, 0.0), normal, Vec2::new(0.0, 0.0)),
    ];
    SubMesh::new(vertices, vec![0, 1, 2, 0, 2, 3], material)
}

/// Axis-aligned cube centered on the origin, four vertices per face so
/// every face carries its own normal and full uv range.
pub fn cube(half_extent: f32, material: Arc<Material>) -> Result<SubMesh> {
    const FACES: [(Vec3, Vec3); 6] = [
        (Vec3::NEG_Z, Vec3::Y),
        (Vec3::Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Y),
        (Vec3::X, Vec3::Y),
        (Vec3::Y, Vec3::Z),
        (Vec3::NEG_Y, Vec3::NEG_Z),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, up) in FACES {
        // Counter-clockwise when the face is viewed from outside.
        let right = normal.cross(up);
        let center = normal * half_extent;
        let base = vertices.len() as u16;
        for (sx, sy, uv) in [
            (-1.0, -1.0, Vec2::new(0.0, 1.0)),
            (1.0, -1.0, Vec2::new(1.0, 1.0)),
            (1.0, 1.0, Vec2::new(1.0, 0.0)),
            (-1.0, 1.0, Vec2::new(0.0, 0.0)),
        ] {
            let position = center + (right * sx + up * sy) * half_extent;
            vertices.push(Vertex::new(position, normal, uv));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    SubMesh::new(vertices, indices, material)
}
