/// Bounding volumes and plane tests used for entity and tile culling.
/// All planes store an outward-facing unit normal; a point is outside
/// when its signed distance `n·p + d` is positive.
use glam::{Mat4, Vec3};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    pub const fn new(normal: Vec3, d: f32) -> Self {
        Self { normal, d }
    }

    #[inline]
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// True unless the sphere lies entirely on the outer side of the plane.
    #[inline]
    pub fn intersects_plane(&self, plane: &Plane) -> bool {
        plane.signed_distance(self.center) <= self.radius
    }
}

/// Axis-aligned box in model space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing every point; an empty iterator yields a
    /// zero-sized box at the origin.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut iter = points.into_iter();
        let Some(first) = iter.next() else {
            return Self::new(Vec3::ZERO, Vec3::ZERO);
        };
        let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Self::new(min, max)
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Box after an affine transform, kept as center plus three half axes.
    pub fn transformed(&self, transform: &Mat4) -> RotatedBoundingBox {
        let half = self.half_extents();
        RotatedBoundingBox {
            center: transform.transform_point3(self.center()),
            axes: [
                transform.transform_vector3(Vec3::X * half.x),
                transform.transform_vector3(Vec3::Y * half.y),
                transform.transform_vector3(Vec3::Z * half.z),
            ],
        }
    }
}

/// Oriented box: center and three half-extent axis vectors.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RotatedBoundingBox {
    pub center: Vec3,
    pub axes: [Vec3; 3],
}

impl RotatedBoundingBox {
    /// Extent of the box projected onto the plane normal.
    #[inline]
    pub fn projected_radius(&self, normal: Vec3) -> f32 {
        self.axes.iter().map(|axis| axis.dot(normal).abs()).sum()
    }

    /// True unless the box lies entirely on the outer side of the plane.
    #[inline]
    pub fn intersects_plane(&self, plane: &Plane) -> bool {
        plane.signed_distance(self.center) - self.projected_radius(plane.normal) <= 0.0
    }
}

/// Six outward planes. Order: right, left, top, bottom, near, far.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    pub const RIGHT: usize = 0;
    pub const LEFT: usize = 1;
    pub const TOP: usize = 2;
    pub const BOTTOM: usize = 3;
    pub const NEAR: usize = 4;
    pub const FAR: usize = 5;

    pub const fn from_planes(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// View-space frustum of a left-handed perspective camera looking down +z.
    pub fn from_perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let top = (fov_y * 0.5).tan() * near;
        let right = top * aspect;

        // Side planes pass through the eye; the normals are perpendicular to
        // the edge running from the eye through (±right, ±top, near).
        let right_plane = Plane::new(Vec3::new(near, 0.0, -right).normalize(), 0.0);
        let left_plane = Plane::new(Vec3::new(-near, 0.0, -right).normalize(), 0.0);
        let top_plane = Plane::new(Vec3::new(0.0, near, -top).normalize(), 0.0);
        let bottom_plane = Plane::new(Vec3::new(0.0, -near, -top).normalize(), 0.0);

        Self {
            planes: [
                right_plane,
                left_plane,
                top_plane,
                bottom_plane,
                Plane::new(Vec3::NEG_Z, near),
                Plane::new(Vec3::Z, -far),
            ],
        }
    }

    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        self.planes.iter().all(|plane| sphere.intersects_plane(plane))
    }

    pub fn intersects_box(&self, bounds: &RotatedBoundingBox) -> bool {
        self.planes.iter().all(|plane| bounds.intersects_plane(plane))
    }
}
