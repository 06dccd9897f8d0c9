/// Perspective camera.
/// Left-handed view space: +x right, +y up, +z forward; clip depth in [0, 1].
use crate::geometry::Frustum;
use glam::{Mat4, Vec3};

#[derive(Clone, Debug)]
pub struct Camera {
    position: Vec3,
    direction: Vec3,
    up: Vec3,
    fov_y: f32,
    aspect_ratio: f32,
    near: f32,
    far: f32,

    view: Mat4,
    projection: Mat4,
    frustum: Frustum,
}

impl Camera {
    /// Camera at `position` looking down +z.
    pub fn new(position: Vec3, aspect_ratio: f32) -> Self {
        let mut camera = Self {
            position,
            direction: Vec3::Z,
            up: Vec3::Y,
            fov_y: 60f32.to_radians(),
            aspect_ratio,
            near: 0.1,
            far: 1000.0,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            frustum: Frustum::from_perspective(1.0, 1.0, 0.1, 1.0),
        };
        camera.update_view();
        camera.update_projection();
        camera
    }

    pub fn with_perspective(mut self, fov_y: f32, near: f32, far: f32) -> Self {
        self.set_perspective(fov_y, self.aspect_ratio, near, far);
        self
    }

    pub fn set_perspective(&mut self, fov_y: f32, aspect_ratio: f32, near: f32, far: f32) {
        debug_assert!(near > 0.0 && far > near, "invalid depth range {near}..{far}");
        self.fov_y = fov_y;
        self.aspect_ratio = aspect_ratio;
        self.near = near;
        self.far = far;
        self.update_projection();
    }

    /// Update aspect ratio (call when the target resolution changes)
    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
        self.update_projection();
    }

    pub fn look_to(&mut self, position: Vec3, direction: Vec3, up: Vec3) {
        self.position = position;
        self.direction = direction.normalize();
        self.up = up;
        self.update_view();
    }

    pub fn look_at(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        self.look_to(position, target - position, up);
    }

    fn update_view(&mut self) {
        self.view = Mat4::look_to_lh(self.position, self.direction, self.up);
    }

    fn update_projection(&mut self) {
        self.projection = Mat4::perspective_lh(self.fov_y, self.aspect_ratio, self.near, self.far);
        self.frustum = Frustum::from_perspective(self.fov_y, self.aspect_ratio, self.near, self.far);
    }

    #[inline]
    pub fn view_matrix(&self) -> &Mat4 {
        &self.view
    }

    #[inline]
    pub fn projection_matrix(&self) -> &Mat4 {
        &self.projection
    }

    /// View-space frustum.
    #[inline]
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn forward(&self) -> Vec3 {
        self.direction
    }

    pub fn fov_y(&self) -> f32 {
        self.fov_y
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec4;

    #[test]
    fn projection_maps_near_and_far_to_unit_depth_range() {
        let camera = Camera::new(Vec3::ZERO, 1.0).with_perspective(90f32.to_radians(), 1.0, 10.0);
        let near = *camera.projection_matrix() * Vec4::new(0.0, 0.0, 1.0, 1.0);
        let far = *camera.projection_matrix() * Vec4::new(0.0, 0.0, 10.0, 1.0);

        assert_relative_eq!(near.z / near.w, 0.0, epsilon = 1e-6);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-6);
        assert_relative_eq!(near.w, 1.0);
    }

    #[test]
    fn look_at_puts_target_on_the_view_axis() {
        let mut camera = Camera::new(Vec3::ZERO, 1.0);
        camera.look_at(Vec3::new(3.0, 2.0, -4.0), Vec3::new(3.0, 2.0, 6.0), Vec3::Y);

        let target = camera.view_matrix().transform_point3(Vec3::new(3.0, 2.0, 6.0));
        assert_relative_eq!(target.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(target.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(target.z, 10.0, epsilon = 1e-5);
    }

    #[test]
    fn frustum_follows_the_projection() {
        let camera = Camera::new(Vec3::ZERO, 16.0 / 9.0);
        let frustum = camera.frustum();
        let inside = Vec3::new(0.0, 0.0, 5.0);
        let behind = Vec3::new(0.0, 0.0, -5.0);

        assert!(frustum.planes.iter().all(|p| p.signed_distance(inside) <= 0.0));
        assert!(frustum.planes.iter().any(|p| p.signed_distance(behind) > 0.0));
    }
}
