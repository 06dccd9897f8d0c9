/// Reproducible showcase scene: a grid of cubes on a floor, lit by an
/// ambient light, a directional light and randomly placed point lights.
use super::{cube, quad, Entity, Light, Scene};
use crate::camera::Camera;
use crate::error::Result;
use crate::material::{BlinnPhong, Lambert, Material, RasterizeMode, Texture2D};
use glam::{Mat4, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

#[derive(Copy, Clone, Debug)]
pub struct DemoSceneConfig {
    /// Cubes per side of the grid.
    pub grid: u32,
    pub spacing: f32,
    pub point_lights: usize,
    /// Every n-th cube is drawn as wireframe; 0 disables.
    pub wireframe_every: u32,
    pub seed: u64,
}

impl Default for DemoSceneConfig {
    fn default() -> Self {
        Self {
            grid: 6,
            spacing: 3.0,
            point_lights: 32,
            wireframe_every: 7,
            seed: 0x5EED,
        }
    }
}

/// Grid center; the demo camera looks here.
const GRID_CENTER: Vec3 = Vec3::new(0.0, 0.0, 12.0);

fn checker(light: Vec3, dark: Vec3) -> Result<Arc<Texture2D<Vec3>>> {
    let texture = Texture2D::from_fn(8, 8, |x, y| if (x + y) % 2 == 0 { light } else { dark })?;
    Ok(Arc::new(texture))
}

pub fn build_demo_scene(config: &DemoSceneConfig) -> Result<Scene> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut scene = Scene::new();

    let floor_material = Arc::new(
        Material::new(Arc::new(Lambert)).with_diffuse_texture(checker(Vec3::splat(0.8), Vec3::splat(0.4))?),
    );
    let cube_material = Arc::new(
        Material::new(Arc::new(BlinnPhong::default()))
            .with_diffuse_texture(checker(Vec3::new(0.9, 0.6, 0.3), Vec3::new(0.6, 0.3, 0.1))?),
    );
    let wire_material = Arc::new(
        Material::new(Arc::new(Lambert))
            .with_diffuse_texture(checker(Vec3::ONE, Vec3::ONE)?)
            .with_rasterize_mode(RasterizeMode::Line),
    );

    let extent = config.grid as f32 * config.spacing;
    let floor = quad(extent * 0.5 + 2.0, extent * 0.5 + 2.0, floor_material)?;
    let floor_transform = Mat4::from_translation(GRID_CENTER - Vec3::Y * 0.5)
        * Mat4::from_rotation_x(90f32.to_radians());
    scene.add_entity(Entity::new("floor", floor_transform, vec![floor])?);

    let origin = GRID_CENTER - Vec3::new(1.0, 0.0, 1.0) * (config.grid.saturating_sub(1) as f32 * config.spacing * 0.5);
    for gz in 0..config.grid {
        for gx in 0..config.grid {
            let n = gz * config.grid + gx;
            let material = if config.wireframe_every > 0 && n % config.wireframe_every == config.wireframe_every - 1 {
                wire_material.clone()
            } else {
                cube_material.clone()
            };
            let position = origin + Vec3::new(gx as f32, 0.0, gz as f32) * config.spacing;
            let transform = Mat4::from_translation(position) * Mat4::from_rotation_y(rng.gen_range(0.0..std::f32::consts::TAU));
            scene.add_entity(Entity::new(format!("cube_{gx}_{gz}"), transform, vec![cube(0.5, material)?])?);
        }
    }

    scene.add_light(Light::ambient(Vec3::splat(0.3)));
    scene.add_light(Light::directional(Vec3::splat(0.4), Vec3::new(0.3, 1.0, -0.5)));
    let half = extent * 0.5;
    for _ in 0..config.point_lights {
        let position = GRID_CENTER
            + Vec3::new(rng.gen_range(-half..half), rng.gen_range(0.5..3.0), rng.gen_range(-half..half));
        let color = Vec3::new(rng.gen(), rng.gen(), rng.gen());
        scene.add_light(Light::point(color * 4.0, position, rng.gen_range(3.0..7.0)));
    }

    log::debug!(
        "demo scene: {} entities, {} triangles, {} lights",
        scene.entities().len(),
        scene.triangle_count(),
        scene.lights().len()
    );
    Ok(scene)
}

/// Camera above and in front of the demo grid.
pub fn demo_camera(aspect_ratio: f32) -> Camera {
    let mut camera = Camera::new(Vec3::ZERO, aspect_ratio).with_perspective(60f32.to_radians(), 0.1, 200.0);
    camera.look_at(Vec3::new(0.0, 9.0, -6.0), GRID_CENTER, Vec3::Y);
    camera
}
