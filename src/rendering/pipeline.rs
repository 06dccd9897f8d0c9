/// Plumbing shared by the forward and deferred pipelines: the per-frame
/// context a pipeline renders with, and the per-entity geometry stage
/// (frustum test, vertex transform, triangle submission).
use super::framebuffer::{ColorBuffer, DepthBuffer};
use super::rasterizer::{Rasterizer, ShadedVertex, Triangle};
use crate::camera::Camera;
use crate::config::PipelineKind;
use crate::count_call;
use crate::geometry::Frustum;
use crate::parallel::WorkerPool;
use crate::perf::{PerfCounters, PerfTerm, FUNCTION_COUNTERS};
use crate::scene::{Entity, Scene, SubMesh};
use glam::{Mat3, Mat4, UVec2};

/// A frame orchestration strategy.
pub trait Pipeline: Send {
    fn kind(&self) -> PipelineKind;

    fn resolution(&self) -> UVec2;

    /// Renders one frame into `frame.color`. The color buffer has already
    /// been cleared by the caller.
    fn render_scene(&mut self, frame: &FrameContext<'_>);
}

/// Everything a pipeline reads or writes during one frame.
pub struct FrameContext<'a> {
    pub scene: &'a Scene,
    pub camera: &'a Camera,
    pub color: &'a ColorBuffer,
    pub pool: &'a WorkerPool,
    pub perf: &'a PerfCounters,
}

/// Per-entity front end of both pipelines.
pub(crate) struct GeometryStage<'a> {
    pub rasterizer: &'a Rasterizer,
    pub depth: &'a DepthBuffer,
    pub view: Mat4,
    pub projection: Mat4,
    pub frustum: &'a Frustum,
    pub perf: &'a PerfCounters,
    pub vertex_term: Option<PerfTerm>,
    pub raster_term: Option<PerfTerm>,
}

impl<'a> GeometryStage<'a> {
    pub fn new(frame: &FrameContext<'a>, rasterizer: &'a Rasterizer, depth: &'a DepthBuffer) -> Self {
        Self {
            rasterizer,
            depth,
            view: *frame.camera.view_matrix(),
            projection: *frame.camera.projection_matrix(),
            frustum: frame.camera.frustum(),
            perf: frame.perf,
            vertex_term: None,
            raster_term: None,
        }
    }

    pub fn with_terms(mut self, vertex: Option<PerfTerm>, raster: Option<PerfTerm>) -> Self {
        self.vertex_term = vertex;
        self.raster_term = raster;
        self
    }

    /// World-view matrix of an active entity whose bounds touch the view
    /// frustum.
    pub fn visible_transform(&self, entity: &Entity) -> Option<Mat4> {
        if !entity.active {
            return None;
        }
        let world_view = self.view * *entity.transform();
        let bounds = entity.bounds().transformed(&world_view);
        if self.frustum.intersects_box(&bounds) {
            Some(world_view)
        } else {
            count_call!(FUNCTION_COUNTERS.entities_culled);
            None
        }
    }

    /// Rasterizes every sub-mesh of a visible entity. `on_pixel` receives
    /// the sub-mesh index and sub-mesh along with each accepted fragment.
    /// Returns false when the entity was culled.
    pub fn draw_entity<G>(&self, entity: &Entity, on_pixel: &G) -> bool
    where
        G: Fn(usize, &SubMesh, &ShadedVertex, UVec2),
    {
        let Some(world_view) = self.visible_transform(entity) else {
            return false;
        };
        let normal_matrix = Mat3::from_mat4(world_view).inverse().transpose();
        let mut vertices = Vec::new();

        for (index, sub_mesh) in entity.sub_meshes().iter().enumerate() {
            self.timed(self.vertex_term, || {
                transform_vertices(sub_mesh, &world_view, &normal_matrix, &self.projection, &mut vertices)
            });

            let mode = sub_mesh.material.rasterize_mode;
            let per_pixel = |fragment: &ShadedVertex, pixel: UVec2| on_pixel(index, sub_mesh, fragment, pixel);
            self.timed(self.raster_term, || {
                for tri in sub_mesh.indices().chunks_exact(3) {
                    let triangle = Triangle::new(
                        &vertices[usize::from(tri[0])],
                        &vertices[usize::from(tri[1])],
                        &vertices[usize::from(tri[2])],
                    );
                    self.rasterizer.rasterize(mode, self.depth, triangle, &per_pixel);
                }
            });
        }
        true
    }

    #[inline]
    fn timed<R>(&self, term: Option<PerfTerm>, f: impl FnOnce() -> R) -> R {
        match term {
            Some(term) => {
                let _scope = self.perf.scope(term);
                f()
            }
            None => f(),
        }
    }
}

/// View-space vertices with clip-space positions, written into `out`.
pub(crate) fn transform_vertices(
    sub_mesh: &SubMesh,
    world_view: &Mat4,
    normal_matrix: &Mat3,
    projection: &Mat4,
    out: &mut Vec<ShadedVertex>,
) {
    out.clear();
    out.extend(sub_mesh.vertices().iter().map(|vertex| {
        let mut view = *vertex;
        view.position = world_view.transform_point3(vertex.position);
        view.normal = (*normal_matrix * vertex.normal).normalize_or_zero();
        ShadedVertex::from_view(view, projection)
    }));
}
