/// Deferred pipeline with tiled light culling.
///
/// The geometry pass rasterizes surface attributes into the geometry
/// buffer. The shading pass then splits the screen into square tiles and
/// shades each tile as one pool task: it bounds the tile's depth range,
/// builds a frustum around the tile, keeps only the point lights whose
/// spheres reach that frustum, and lights every covered pixel with them.
/// Pixels without geometry are written black.
use super::framebuffer::{DepthBuffer, GBufferElement, GeometryBuffer, MaterialId, FAR_DEPTH};
use super::pipeline::{FrameContext, GeometryStage, Pipeline};
use super::rasterizer::{Rasterizer, ShadedVertex};
use super::shading::{shade_surface, SceneLights, SurfaceSample};
use crate::config::{PipelineKind, DEFAULT_TILE_SIZE};
use crate::error::{RenderError, Result};
use crate::geometry::{Frustum, Plane};
use crate::material::Material;
use crate::perf::{PerfTerm, FUNCTION_COUNTERS};
use crate::scene::SubMesh;
use crate::{count_add, count_call};
use glam::{Mat4, UVec2, Vec3};
use parking_lot::Mutex;

/// Materials referenced by one frame's geometry buffer, indexed by
/// [`MaterialId`].
#[derive(Default)]
pub struct MaterialTable<'a> {
    materials: Vec<&'a Material>,
}

impl<'a> MaterialTable<'a> {
    pub fn push(&mut self, material: &'a Material) -> MaterialId {
        self.materials.push(material);
        MaterialId((self.materials.len() - 1) as u32)
    }

    #[inline]
    pub fn get(&self, id: MaterialId) -> Option<&'a Material> {
        self.materials.get(id.0 as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

/// Half-open pixel rectangle of one tile.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TileRect {
    pub min: UVec2,
    pub max: UVec2,
}

/// Frustum enclosing the pixels of `tile` between view depths `min_z` and
/// `max_z`.
///
/// The side planes pass through the eye. Each is the projection's x (or y)
/// row scaled and biased so that the tile's NDC edge becomes the plane
/// `ndc = edge`.
pub fn tile_frustum(projection: &Mat4, resolution: UVec2, tile: TileRect, min_z: f32, max_z: f32) -> Frustum {
    let size = resolution.as_vec2();
    let scale_x = projection.x_axis.x;
    let scale_y = projection.y_axis.y;
    let bias_x = projection.z_axis.x;
    let bias_y = projection.z_axis.y;

    let left = tile.min.x as f32 / size.x * 2.0 - 1.0;
    let right = tile.max.x as f32 / size.x * 2.0 - 1.0;
    // Row 0 is the top of the screen, NDC y points up.
    let top = 1.0 - tile.min.y as f32 / size.y * 2.0;
    let bottom = 1.0 - tile.max.y as f32 / size.y * 2.0;

    let side = |normal: Vec3| Plane::new(normal.normalize(), 0.0);
    Frustum::from_planes([
        side(Vec3::new(scale_x, 0.0, bias_x - right)),
        side(Vec3::new(-scale_x, 0.0, left - bias_x)),
        side(Vec3::new(0.0, scale_y, bias_y - top)),
        side(Vec3::new(0.0, -scale_y, bottom - bias_y)),
        Plane::new(Vec3::NEG_Z, min_z),
        Plane::new(Vec3::Z, -max_z),
    ])
}

pub struct DeferredPipeline {
    rasterizer: Rasterizer,
    depth: DepthBuffer,
    gbuffer: GeometryBuffer,
    lights: SceneLights,
    tile_size: u32,
    tiles: UVec2,
    /// Point light indices each tile kept in the last frame.
    tile_lights: Vec<Mutex<Vec<u32>>>,
}

impl DeferredPipeline {
    pub fn new(resolution: UVec2) -> Self {
        Self::build(resolution, DEFAULT_TILE_SIZE)
    }

    pub fn with_tile_size(resolution: UVec2, tile_size: u32) -> Result<Self> {
        if tile_size == 0 {
            return Err(RenderError::InvalidTileSize);
        }
        Ok(Self::build(resolution, tile_size))
    }

    fn build(resolution: UVec2, tile_size: u32) -> Self {
        let tiles = (resolution + (tile_size - 1)) / tile_size;
        Self {
            rasterizer: Rasterizer::new(resolution),
            depth: DepthBuffer::new_depth(resolution),
            gbuffer: GeometryBuffer::new_geometry(resolution),
            lights: SceneLights::default(),
            tile_size,
            tiles,
            tile_lights: (0..tiles.x * tiles.y).map(|_| Mutex::new(Vec::new())).collect(),
        }
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Tiles across and down; partial tiles at the right and bottom edges
    /// count.
    pub fn tile_count(&self) -> UVec2 {
        self.tiles
    }

    pub fn tile_rect(&self, tile: UVec2) -> TileRect {
        let min = tile * self.tile_size;
        TileRect {
            min,
            max: (min + self.tile_size).min(self.rasterizer.resolution()),
        }
    }

    /// Point light indices the tile kept during the last frame.
    pub fn tile_lights(&self, tile: UVec2) -> Vec<u32> {
        let index = (tile.y * self.tiles.x + tile.x) as usize;
        self.tile_lights[index].lock().clone()
    }

    pub fn geometry_buffer(&self) -> &GeometryBuffer {
        &self.gbuffer
    }

    pub fn depth_buffer(&self) -> &DepthBuffer {
        &self.depth
    }

    pub fn lights(&self) -> &SceneLights {
        &self.lights
    }

    pub fn rasterizer_mut(&mut self) -> &mut Rasterizer {
        &mut self.rasterizer
    }

    /// View-depth range of the geometry inside the tile, ignoring pixels
    /// beyond `far` (which hold no geometry).
    fn tile_depth_range(&self, rect: TileRect, far: f32) -> Option<(f32, f32)> {
        let mut range: Option<(f32, f32)> = None;
        for y in rect.min.y..rect.max.y {
            for x in rect.min.x..rect.max.x {
                let z = self.gbuffer.get(UVec2::new(x, y)).position.z;
                if z > far {
                    continue;
                }
                range = Some(match range {
                    Some((min_z, max_z)) => (min_z.min(z), max_z.max(z)),
                    None => (z, z),
                });
            }
        }
        range
    }

    fn shade_tile(&self, index: usize, frame: &FrameContext<'_>, materials: &MaterialTable<'_>) {
        let tile = UVec2::new(index as u32 % self.tiles.x, index as u32 / self.tiles.x);
        let rect = self.tile_rect(tile);
        let camera = frame.camera;
        let mut tile_lights = self.tile_lights[index].lock();
        tile_lights.clear();

        // --- LIGHT CULLING ---
        let depth_range = {
            let _cull = frame.perf.scope(PerfTerm::TiledFrustumCulling);
            let depth_range = self.tile_depth_range(rect, camera.far());
            if let Some((min_z, max_z)) = depth_range {
                let frustum = tile_frustum(camera.projection_matrix(), self.rasterizer.resolution(), rect, min_z, max_z);
                tile_lights.extend(
                    self.lights
                        .points
                        .iter()
                        .enumerate()
                        .filter(|(_, light)| frustum.intersects_sphere(&light.bounding_sphere()))
                        .map(|(i, _)| i as u32),
                );
            }
            depth_range
        };
        if depth_range.is_none() {
            for y in rect.min.y..rect.max.y {
                for x in rect.min.x..rect.max.x {
                    frame.color.set(UVec2::new(x, y), Vec3::ZERO);
                }
            }
            return;
        }
        count_call!(FUNCTION_COUNTERS.tiles_shaded);
        count_add!(FUNCTION_COUNTERS.tile_light_candidates, tile_lights.len());
        log::trace!("tile {tile}: {} of {} point lights", tile_lights.len(), self.lights.points.len());

        // --- SHADING ---
        let _shade = frame.perf.scope(PerfTerm::TiledShading);
        for y in rect.min.y..rect.max.y {
            for x in rect.min.x..rect.max.x {
                let pixel = UVec2::new(x, y);
                let element = self.gbuffer.get(pixel);
                let Some(material) = element.material.and_then(|id| materials.get(id)) else {
                    frame.color.set(pixel, Vec3::ZERO);
                    continue;
                };
                let sample = SurfaceSample {
                    position: element.position,
                    normal: element.normal,
                    uv: element.uv,
                };
                let points = tile_lights.iter().map(|&i| &self.lights.points[i as usize]);
                frame.color.set(pixel, shade_surface(material, &sample, &self.lights, points));
            }
        }
    }
}

impl Pipeline for DeferredPipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Deferred
    }

    fn resolution(&self) -> UVec2 {
        self.rasterizer.resolution()
    }

    fn render_scene(&mut self, frame: &FrameContext<'_>) {
        {
            let _transform = frame.perf.scope(PerfTerm::DeferredLightTransform);
            self.lights.gather(frame.scene, frame.camera.view_matrix());
        }
        self.depth.clear(FAR_DEPTH);
        self.gbuffer.clear(GBufferElement::EMPTY);

        let entities = frame.scene.entities();
        let mut materials = MaterialTable::default();
        let first_material: Vec<u32> = entities
            .iter()
            .map(|entity| {
                let first = materials.len() as u32;
                for sub_mesh in entity.sub_meshes() {
                    materials.push(&sub_mesh.material);
                }
                first
            })
            .collect();

        // --- PHASE 1: GEOMETRY PASS ---
        {
            let _pass = frame.perf.scope(PerfTerm::DeferredGeometryPass);
            let stage = GeometryStage::new(frame, &self.rasterizer, &self.depth).with_terms(
                Some(PerfTerm::DeferredVertex),
                Some(PerfTerm::DeferredRasterizeAndPixel),
            );
            let gbuffer = &self.gbuffer;
            frame.pool.for_each_index(entities.len(), |i| {
                let first = first_material[i];
                let write = |sub_index: usize, _: &SubMesh, fragment: &ShadedVertex, pixel: UVec2| {
                    gbuffer.set(
                        pixel,
                        GBufferElement {
                            material: Some(MaterialId(first + sub_index as u32)),
                            position: fragment.vertex.position,
                            normal: fragment.vertex.normal,
                            uv: fragment.vertex.uv,
                        },
                    );
                };
                stage.draw_entity(&entities[i], &write);
            });
        }

        // --- PHASE 2: TILED SHADING ---
        {
            let _pass = frame.perf.scope(PerfTerm::DeferredShadingPass);
            let tile_count = (self.tiles.x * self.tiles.y) as usize;
            let this = &*self;
            frame.pool.for_each_index(tile_count, |index| this.shade_tile(index, frame, &materials));
        }
        log::trace!(
            "deferred frame: {} entities, {} materials, {} point lights",
            entities.len(),
            materials.len(),
            self.lights.points.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_tiles_cover_the_whole_screen() {
        let pipeline = DeferredPipeline::new(UVec2::new(40, 20));
        assert_eq!(pipeline.tile_count(), UVec2::new(3, 2));
        assert_eq!(
            pipeline.tile_rect(UVec2::new(2, 1)),
            TileRect {
                min: UVec2::new(32, 16),
                max: UVec2::new(40, 20),
            }
        );
    }

    #[test]
    fn zero_tile_size_is_rejected() {
        assert!(matches!(
            DeferredPipeline::with_tile_size(UVec2::new(8, 8), 0),
            Err(RenderError::InvalidTileSize)
        ));
    }

    #[test]
    fn full_screen_tile_frustum_matches_the_camera_sides() {
        let projection = Mat4::perspective_lh(90f32.to_radians(), 1.0, 0.5, 100.0);
        let resolution = UVec2::new(64, 64);
        let whole = TileRect {
            min: UVec2::ZERO,
            max: resolution,
        };
        let frustum = tile_frustum(&projection, resolution, whole, 1.0, 10.0);
        let camera = Frustum::from_perspective(90f32.to_radians(), 1.0, 0.5, 100.0);

        for side in [Frustum::RIGHT, Frustum::LEFT, Frustum::TOP, Frustum::BOTTOM] {
            let a = frustum.planes[side].normal;
            let b = camera.planes[side].normal;
            assert!((a - b).length() < 1e-5, "plane {side}: {a} vs {b}");
        }
    }

    #[test]
    fn top_left_tile_frustum_contains_points_projecting_into_it() {
        let projection = Mat4::perspective_lh(90f32.to_radians(), 1.0, 0.5, 100.0);
        let resolution = UVec2::new(64, 64);
        let tile = TileRect {
            min: UVec2::ZERO,
            max: UVec2::new(16, 16),
        };
        let frustum = tile_frustum(&projection, resolution, tile, 1.0, 10.0);

        // Pixel (4, 4) is up and to the left of the view axis.
        let ndc_x = 4.5 / 64.0 * 2.0 - 1.0;
        let ndc_y = 1.0 - 4.5 / 64.0 * 2.0;
        let inside = Vec3::new(ndc_x * 5.0, ndc_y * 5.0, 5.0);
        let other_quadrant = Vec3::new(-inside.x, -inside.y, 5.0);

        assert!(frustum.planes.iter().all(|p| p.signed_distance(inside) <= 0.0));
        assert!(frustum.planes.iter().any(|p| p.signed_distance(other_quadrant) > 0.0));
    }
}
