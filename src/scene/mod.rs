/// Scene content consumed by the pipelines: entities with sub-meshes,
/// and lights. The pipelines only read it.
pub mod demo;
pub mod light;
pub mod mesh;

pub use light::{Light, LightKind};
pub use mesh::{cube, quad, SubMesh, Vertex};

use crate::error::{RenderError, Result};
use crate::geometry::BoundingBox;
use glam::Mat4;

#[derive(Clone, Debug)]
pub struct Entity {
    pub name: String,
    transform: Mat4,
    bounds: BoundingBox,
    sub_meshes: Vec<SubMesh>,
    pub active: bool,
}

impl Entity {
    /// Bounds are the model-space box around every sub-mesh vertex.
    pub fn new(name: impl Into<String>, transform: Mat4, sub_meshes: Vec<SubMesh>) -> Result<Self> {
        let name = name.into();
        check_invertible(&name, &transform)?;
        let bounds = BoundingBox::from_points(
            sub_meshes
                .iter()
                .flat_map(|mesh| mesh.vertices().iter().map(|v| v.position)),
        );
        Ok(Self {
            name,
            transform,
            bounds,
            sub_meshes,
            active: true,
        })
    }

    #[inline]
    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Mat4) -> Result<()> {
        check_invertible(&self.name, &transform)?;
        self.transform = transform;
        Ok(())
    }

    #[inline]
    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    #[inline]
    pub fn sub_meshes(&self) -> &[SubMesh] {
        &self.sub_meshes
    }
}

fn check_invertible(name: &str, transform: &Mat4) -> Result<()> {
    let det = transform.determinant();
    if det == 0.0 || !det.is_finite() {
        return Err(RenderError::SingularTransform(name.to_owned()));
    }
    Ok(())
}

#[derive(Clone, Debug, Default)]
pub struct Scene {
    entities: Vec<Entity>,
    lights: Vec<Light>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&mut self, entity: Entity) -> usize {
        self.entities.push(entity);
        self.entities.len() - 1
    }

    pub fn add_light(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }

    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut [Entity] {
        &mut self.entities
    }

    #[inline]
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> &mut [Light] {
        &mut self.lights
    }

    pub fn triangle_count(&self) -> usize {
        self.entities
            .iter()
            .flat_map(|e| e.sub_meshes())
            .map(SubMesh::triangle_count)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;
    use glam::Vec3;
    use std::sync::Arc;

    #[test]
    fn entity_bounds_cover_all_sub_meshes() {
        let material = Arc::new(Material::default());
        let entity = Entity::new(
            "pair",
            Mat4::IDENTITY,
            vec![
                cube(1.0, material.clone()).unwrap(),
                quad(3.0, 0.5, material).unwrap(),
            ],
        )
        .unwrap();

        assert_eq!(entity.bounds().min, Vec3::new(-3.0, -1.0, -1.0));
        assert_eq!(entity.bounds().max, Vec3::new(3.0, 1.0, 1.0));
    }

    #[test]
    fn singular_transform_is_rejected() {
        let result = Entity::new("flat", Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0)), vec![]);
        assert!(matches!(result, Err(RenderError::SingularTransform(name)) if name == "flat"));
    }
}
