/// Forward pipeline: a depth-only pre-pass over all visible entities,
/// then a shaded pass that re-rasterizes them and lights each fragment
/// that survives the depth test. Entities are dispatched in parallel in
/// both passes.
use super::framebuffer::{DepthBuffer, FAR_DEPTH};
use super::pipeline::{FrameContext, GeometryStage, Pipeline};
use super::rasterizer::{Rasterizer, ShadedVertex};
use super::shading::{shade_surface, SceneLights, SurfaceSample};
use crate::config::PipelineKind;
use crate::perf::PerfTerm;
use crate::scene::SubMesh;
use glam::UVec2;

/// Which passes a forward frame runs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ForwardPasses {
    /// When false only the depth pre-pass runs and the color buffer keeps
    /// its clear value.
    pub shading: bool,
}

impl Default for ForwardPasses {
    fn default() -> Self {
        Self { shading: true }
    }
}

pub struct ForwardPipeline {
    rasterizer: Rasterizer,
    depth: DepthBuffer,
    lights: SceneLights,
    passes: ForwardPasses,
}

impl ForwardPipeline {
    pub fn new(resolution: UVec2) -> Self {
        Self {
            rasterizer: Rasterizer::new(resolution),
            depth: DepthBuffer::new_depth(resolution),
            lights: SceneLights::default(),
            passes: ForwardPasses::default(),
        }
    }

    pub fn with_passes(mut self, passes: ForwardPasses) -> Self {
        self.passes = passes;
        self
    }

    pub fn depth_buffer(&self) -> &DepthBuffer {
        &self.depth
    }

    pub fn rasterizer_mut(&mut self) -> &mut Rasterizer {
        &mut self.rasterizer
    }
}

impl Pipeline for ForwardPipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Forward
    }

    fn resolution(&self) -> UVec2 {
        self.rasterizer.resolution()
    }

    fn render_scene(&mut self, frame: &FrameContext<'_>) {
        self.lights.gather(frame.scene, frame.camera.view_matrix());
        self.depth.clear(FAR_DEPTH);

        let entities = frame.scene.entities();
        let stage = GeometryStage::new(frame, &self.rasterizer, &self.depth)
            .with_terms(None, Some(PerfTerm::ForwardTotalRasterize));

        // --- PHASE 1: DEPTH PRE-PASS ---
        {
            let _pass = frame.perf.scope(PerfTerm::ForwardPreZPass);
            let depth_only = |_: usize, _: &SubMesh, _: &ShadedVertex, _: UVec2| {};
            frame.pool.for_each(entities, |entity| {
                stage.draw_entity(entity, &depth_only);
            });
        }

        if !self.passes.shading {
            return;
        }

        // --- PHASE 2: SHADED PASS ---
        // Depth-equal fragments pass, so the surface PreZ kept is the one
        // shaded here.
        let lights = &self.lights;
        let color = frame.color;
        let shade = |_: usize, sub_mesh: &SubMesh, fragment: &ShadedVertex, pixel: UVec2| {
            let sample = SurfaceSample {
                position: fragment.vertex.position,
                normal: fragment.vertex.normal,
                uv: fragment.vertex.uv,
            };
            color.set(pixel, shade_surface(&sub_mesh.material, &sample, lights, &lights.points));
        };
        {
            let _pass = frame.perf.scope(PerfTerm::ForwardRenderPass);
            frame.pool.for_each(entities, |entity| {
                stage.draw_entity(entity, &shade);
            });
        }
        log::trace!("forward frame: {} entities, {} point lights", entities.len(), lights.points.len());
    }
}
