/// Surface description: how a triangle is rasterized, where its diffuse
/// color comes from, and which shading model lights it.
pub mod texture;

pub use texture::{AddressMode, PointSampler, Texture2D};

use glam::{Vec2, Vec3};
use std::f32::consts::PI;
use std::fmt;
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum RasterizeMode {
    #[default]
    Fill,
    /// Wireframe: only triangle edges are drawn.
    Line,
}

/// Per-light surface response. All vectors are unit length and in view space.
pub trait SurfaceShader: Send + Sync + fmt::Debug {
    fn shade(
        &self,
        diffuse: Vec3,
        normal: Vec3,
        half_vector: Vec3,
        view_dir: Vec3,
        light_dir: Vec3,
    ) -> Vec3;
}

/// Energy-conserving diffuse.
#[derive(Copy, Clone, Debug, Default)]
pub struct Lambert;

impl SurfaceShader for Lambert {
    #[inline]
    fn shade(&self, diffuse: Vec3, _: Vec3, _: Vec3, _: Vec3, _: Vec3) -> Vec3 {
        diffuse / PI
    }
}

/// Normalized Blinn-Phong.
#[derive(Copy, Clone, Debug)]
pub struct BlinnPhong {
    pub exponent: f32,
}

impl Default for BlinnPhong {
    fn default() -> Self {
        Self { exponent: 10.0 }
    }
}

impl SurfaceShader for BlinnPhong {
    #[inline]
    fn shade(&self, diffuse: Vec3, normal: Vec3, half_vector: Vec3, _: Vec3, _: Vec3) -> Vec3 {
        let m = self.exponent;
        let specular = (m + 8.0) / (8.0 * PI) * half_vector.dot(normal).max(0.0).powf(m);
        diffuse * (1.0 / PI + specular)
    }
}

#[derive(Clone, Debug)]
pub struct Material {
    pub rasterize_mode: RasterizeMode,
    pub diffuse_texture: Option<Arc<Texture2D<Vec3>>>,
    pub sampler: PointSampler,
    pub shader: Arc<dyn SurfaceShader>,
}

impl Default for Material {
    fn default() -> Self {
        Self::new(Arc::new(Lambert))
    }
}

impl Material {
    pub fn new(shader: Arc<dyn SurfaceShader>) -> Self {
        Self {
            rasterize_mode: RasterizeMode::Fill,
            diffuse_texture: None,
            sampler: PointSampler::default(),
            shader,
        }
    }

    pub fn with_diffuse_texture(mut self, texture: Arc<Texture2D<Vec3>>) -> Self {
        self.diffuse_texture = Some(texture);
        self
    }

    pub fn with_sampler(mut self, sampler: PointSampler) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_rasterize_mode(mut self, mode: RasterizeMode) -> Self {
        self.rasterize_mode = mode;
        self
    }

    /// Diffuse color at `uv`, or `None` when the material has no texture.
    #[inline]
    pub fn diffuse_at(&self, uv: Vec2) -> Option<Vec3> {
        self.diffuse_texture
            .as_deref()
            .map(|texture| self.sampler.sample(texture, uv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn lambert_divides_diffuse_by_pi() {
        let color = Lambert.shade(Vec3::new(PI, 0.0, 2.0 * PI), Vec3::Z, Vec3::Z, Vec3::Z, Vec3::Z);
        assert_relative_eq!(color.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(color.z, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn blinn_phong_peaks_when_half_vector_matches_normal() {
        let shader = BlinnPhong::default();
        let aligned = shader.shade(Vec3::ONE, Vec3::Z, Vec3::Z, Vec3::Z, Vec3::Z);
        let grazing = shader.shade(Vec3::ONE, Vec3::Z, Vec3::X, Vec3::Z, Vec3::Z);

        assert_relative_eq!(aligned.x, 1.0 / PI + 18.0 / (8.0 * PI), epsilon = 1e-5);
        assert_relative_eq!(grazing.x, 1.0 / PI, epsilon = 1e-6);
    }

    #[test]
    fn untextured_material_has_no_diffuse() {
        let material = Material::default();
        assert!(material.diffuse_at(Vec2::ZERO).is_none());

        let texture = Arc::new(Texture2D::filled(1, 1, Vec3::ONE).unwrap());
        let material = material.with_diffuse_texture(texture);
        assert_eq!(material.diffuse_at(Vec2::new(0.3, 0.7)), Some(Vec3::ONE));
    }

    #[test]
    fn sampler_choice_decides_out_of_range_lookups() {
        let texture = Arc::new(Texture2D::from_texels(2, 1, vec![Vec3::X, Vec3::Y]).unwrap());
        let repeating = Material::default().with_diffuse_texture(texture);
        let clamped = repeating.clone().with_sampler(PointSampler::new(AddressMode::ClampToEdge));

        assert_eq!(repeating.diffuse_at(Vec2::new(1.25, 0.5)), Some(Vec3::X));
        assert_eq!(clamped.diffuse_at(Vec2::new(1.25, 0.5)), Some(Vec3::Y));
    }
}
