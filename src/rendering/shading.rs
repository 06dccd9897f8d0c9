/// Lighting evaluation.
/// Kept separate from the rasterizer so lighting models can evolve
/// independently of the rasterization pipeline.
use crate::geometry::Sphere;
use crate::material::Material;
use crate::scene::{Light, LightKind, Scene};
use glam::{Mat4, Vec2, Vec3};
use std::f32::consts::PI;

/// Point light moved into view space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointLightView {
    pub position: Vec3,
    pub radius: f32,
    pub intensity: Vec3,
    inverse_scale_sq: f32,
}

impl PointLightView {
    pub fn new(position: Vec3, radius: f32, intensity: Vec3, falloff_scale: f32) -> Self {
        Self {
            position,
            radius,
            intensity,
            inverse_scale_sq: 1.0 / (falloff_scale * falloff_scale),
        }
    }

    /// Windowed inverse-square falloff; exactly zero at and beyond the
    /// radius.
    #[inline]
    pub fn falloff(&self, distance_sq: f32) -> f32 {
        let radius_sq = self.radius * self.radius;
        if distance_sq >= radius_sq {
            return 0.0;
        }
        let ratio = distance_sq / radius_sq;
        let window = (1.0 - ratio * ratio).clamp(0.0, 1.0);
        window * window / (distance_sq * self.inverse_scale_sq + 1.0)
    }

    #[inline]
    pub fn bounding_sphere(&self) -> Sphere {
        Sphere::new(self.position, self.radius)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DirectionalLightView {
    /// Unit vector pointing towards the light, in view space.
    pub direction: Vec3,
    pub intensity: Vec3,
}

/// Per-frame, view-space copy of the scene's active lights.
#[derive(Clone, Debug, Default)]
pub struct SceneLights {
    pub ambient: Option<Vec3>,
    pub directional: Option<DirectionalLightView>,
    pub points: Vec<PointLightView>,
}

impl SceneLights {
    /// Rebuilds the snapshot in place, reusing the point light storage.
    /// When several ambient or directional lights are active the last one
    /// wins.
    pub fn gather(&mut self, scene: &Scene, view: &Mat4) {
        self.ambient = None;
        self.directional = None;
        self.points.clear();

        for light in scene.lights().iter().filter(|light| light.active) {
            self.add(light, view);
        }
        log::trace!(
            "light snapshot: {} point, ambient {}, directional {}",
            self.points.len(),
            self.ambient.is_some(),
            self.directional.is_some()
        );
    }

    pub fn from_scene(scene: &Scene, view: &Mat4) -> Self {
        let mut lights = Self::default();
        lights.gather(scene, view);
        lights
    }

    fn add(&mut self, light: &Light, view: &Mat4) {
        match light.kind {
            LightKind::Ambient => {
                self.ambient = Some(light.intensity);
            }
            LightKind::Directional { direction } => {
                let world = direction.try_normalize().unwrap_or(Vec3::Y);
                self.directional = Some(DirectionalLightView {
                    direction: view.transform_vector3(world).normalize_or(Vec3::Y),
                    intensity: light.intensity,
                });
            }
            LightKind::Point { position, radius, falloff_scale } => {
                self.points.push(PointLightView::new(
                    view.transform_point3(position),
                    radius,
                    light.intensity,
                    falloff_scale,
                ));
            }
        }
    }
}

/// View-space surface attributes at one pixel.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SurfaceSample {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

/// Lights a surface sample. `points` selects which point lights take
/// part; ambient and directional lights always do. A material without a
/// diffuse texture shades to black.
pub fn shade_surface<'a>(
    material: &Material,
    sample: &SurfaceSample,
    lights: &SceneLights,
    points: impl IntoIterator<Item = &'a PointLightView>,
) -> Vec3 {
    let Some(diffuse) = material.diffuse_at(sample.uv) else {
        return Vec3::ZERO;
    };
    let normal = sample.normal.normalize_or_zero();
    let view_dir = (-sample.position).normalize_or_zero();
    let mut color = Vec3::ZERO;

    for light in points {
        let to_light = light.position - sample.position;
        let distance_sq = to_light.length_squared();
        let falloff = light.falloff(distance_sq);
        if falloff <= 0.0 {
            continue;
        }
        let light_dir = to_light.normalize_or_zero();
        let n_dot_l = normal.dot(light_dir);
        if n_dot_l <= 0.0 {
            continue;
        }
        let half = (view_dir + light_dir).normalize_or_zero();
        color += light.intensity
            * falloff
            * n_dot_l
            * material.shader.shade(diffuse, normal, half, view_dir, light_dir);
    }

    if let Some(directional) = &lights.directional {
        let light_dir = directional.direction;
        let n_dot_l = normal.dot(light_dir);
        if n_dot_l > 0.0 {
            let half = (view_dir + light_dir).normalize_or_zero();
            color += directional.intensity
                * n_dot_l
                * material.shader.shade(diffuse, normal, half, view_dir, light_dir);
        }
    }

    if let Some(ambient) = lights.ambient {
        color += diffuse / PI * ambient;
    }

    color
}
