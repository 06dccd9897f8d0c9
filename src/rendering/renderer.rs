/// Frame driver: owns the color buffer, worker pool, timing counters and
/// the active pipeline, and runs one frame per `render_frame` call.
use super::deferred::DeferredPipeline;
use super::forward::ForwardPipeline;
use super::framebuffer::ColorBuffer;
use super::pipeline::{FrameContext, Pipeline};
use crate::camera::Camera;
use crate::config::{PipelineKind, RendererConfig};
use crate::error::{RenderError, Result};
use crate::parallel::WorkerPool;
use crate::perf::{PerfCounters, PerfSnapshot, PerfTerm};
use crate::scene::Scene;
use glam::{UVec2, Vec3};
use std::time::Duration;

/// Frames slower than this are logged as warnings.
const SLOW_FRAME: Duration = Duration::from_millis(250);

pub struct Renderer {
    config: RendererConfig,
    color: ColorBuffer,
    pool: WorkerPool,
    perf: PerfCounters,
    pipeline: Option<Box<dyn Pipeline>>,
    frame_index: u64,
}

impl Renderer {
    /// Validates the config, starts the worker pool and installs the
    /// configured pipeline.
    pub fn new(config: RendererConfig) -> Result<Self> {
        config.validate()?;
        let mut renderer = Self {
            color: ColorBuffer::new(config.resolution, config.clear_color),
            pool: WorkerPool::new(config.thread_count)?,
            perf: PerfCounters::new(),
            pipeline: None,
            frame_index: 0,
            config,
        };
        renderer.switch_pipeline(config.pipeline)?;
        log::info!(
            "renderer {}x{}, {} thread(s), {:?} pipeline",
            config.resolution.x,
            config.resolution.y,
            renderer.pool.thread_count(),
            config.pipeline
        );
        Ok(renderer)
    }

    /// Installs a fresh pipeline of the given kind.
    pub fn switch_pipeline(&mut self, kind: PipelineKind) -> Result<Option<Box<dyn Pipeline>>> {
        let pipeline: Box<dyn Pipeline> = match kind {
            PipelineKind::Forward => Box::new(ForwardPipeline::new(self.config.resolution)),
            PipelineKind::Deferred => Box::new(DeferredPipeline::with_tile_size(
                self.config.resolution,
                self.config.tile_size,
            )?),
        };
        self.set_pipeline(pipeline)
    }

    /// Replaces the active pipeline and returns the previous one.
    pub fn set_pipeline(&mut self, pipeline: Box<dyn Pipeline>) -> Result<Option<Box<dyn Pipeline>>> {
        if pipeline.resolution() != self.config.resolution {
            return Err(RenderError::ResolutionMismatch {
                pipeline: pipeline.resolution(),
                renderer: self.config.resolution,
            });
        }
        self.config.pipeline = pipeline.kind();
        Ok(self.pipeline.replace(pipeline))
    }

    /// Removes the active pipeline; rendering fails until a new one is set.
    pub fn take_pipeline(&mut self) -> Option<Box<dyn Pipeline>> {
        self.pipeline.take()
    }

    pub fn pipeline(&self) -> Option<&dyn Pipeline> {
        self.pipeline.as_deref()
    }

    /// Re-creates the worker pool with a new thread count.
    pub fn set_thread_count(&mut self, thread_count: usize) -> Result<()> {
        let pool = WorkerPool::new(thread_count)?;
        log::debug!("worker pool resized to {} thread(s)", pool.thread_count());
        self.pool = pool;
        self.config.thread_count = thread_count;
        Ok(())
    }

    pub fn thread_count(&self) -> usize {
        self.pool.thread_count()
    }

    pub fn set_clear_color(&mut self, clear_color: Vec3) {
        self.config.clear_color = clear_color;
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn resolution(&self) -> UVec2 {
        self.config.resolution
    }

    /// Renders one frame of `scene` as seen by `camera`.
    pub fn render_frame(&mut self, scene: &Scene, camera: &Camera) -> Result<()> {
        let pipeline = self.pipeline.as_mut().ok_or(RenderError::NoActivePipeline)?;

        self.perf.clear_all();
        self.perf.begin(PerfTerm::All);
        self.color.clear(self.config.clear_color);

        let frame = FrameContext {
            scene,
            camera,
            color: &self.color,
            pool: &self.pool,
            perf: &self.perf,
        };
        self.perf.begin(PerfTerm::Render);
        pipeline.render_scene(&frame);
        self.perf.end(PerfTerm::Render);
        self.perf.end(PerfTerm::All);

        let elapsed = self.perf.elapsed(PerfTerm::All);
        if elapsed > SLOW_FRAME {
            log::warn!("frame {} took {:.2}ms", self.frame_index, elapsed.as_secs_f64() * 1000.0);
        } else {
            log::debug!("frame {} took {:.2}ms", self.frame_index, elapsed.as_secs_f64() * 1000.0);
        }
        self.frame_index += 1;
        Ok(())
    }

    pub fn color_buffer(&self) -> &ColorBuffer {
        &self.color
    }

    /// Normalized RGB, row-major from the top row.
    pub fn to_rgb(&self) -> Vec<Vec3> {
        self.color.to_vec()
    }

    pub fn to_argb32(&self) -> Vec<u32> {
        self.color.to_argb32()
    }

    pub fn perf(&self) -> &PerfCounters {
        &self.perf
    }

    pub fn perf_snapshot(&self) -> PerfSnapshot {
        self.perf.snapshot()
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> RendererConfig {
        RendererConfig::default().with_resolution(32, 32).with_thread_count(1)
    }

    #[test]
    fn set_pipeline_returns_the_previous_one() {
        let mut renderer = Renderer::new(small_config()).unwrap();
        let previous = renderer
            .set_pipeline(Box::new(ForwardPipeline::new(UVec2::new(32, 32))))
            .unwrap();

        assert_eq!(previous.map(|p| p.kind()), Some(PipelineKind::Deferred));
        assert_eq!(renderer.pipeline().map(|p| p.kind()), Some(PipelineKind::Forward));
    }

    #[test]
    fn pipeline_with_other_resolution_is_rejected() {
        let mut renderer = Renderer::new(small_config()).unwrap();
        let result = renderer.set_pipeline(Box::new(ForwardPipeline::new(UVec2::new(16, 16))));
        assert!(matches!(result, Err(RenderError::ResolutionMismatch { .. })));
    }

    #[test]
    fn rendering_without_a_pipeline_fails() {
        let mut renderer = Renderer::new(small_config()).unwrap();
        renderer.take_pipeline();
        let result = renderer.render_frame(&Scene::new(), &Camera::new(Vec3::ZERO, 1.0));
        assert!(matches!(result, Err(RenderError::NoActivePipeline)));
    }

    #[test]
    fn empty_scene_leaves_the_clear_color_and_times_the_frame() {
        let mut config = small_config().with_pipeline(PipelineKind::Forward);
        config.clear_color = Vec3::new(0.1, 0.2, 0.3);
        let mut renderer = Renderer::new(config).unwrap();
        let camera = Camera::new(Vec3::ZERO, 1.0);

        renderer.render_frame(&Scene::new(), &camera).unwrap();

        assert!(renderer.to_rgb().iter().all(|&c| c == Vec3::new(0.1, 0.2, 0.3)));
        let snapshot = renderer.perf_snapshot();
        assert!(snapshot.get(PerfTerm::All) >= snapshot.get(PerfTerm::Render));
        assert!(renderer.perf().start_time(PerfTerm::Render).is_some());
        assert_eq!(renderer.frame_index(), 1);
    }

    #[test]
    fn deferred_shading_writes_black_where_there_is_no_geometry() {
        let mut renderer = Renderer::new(small_config()).unwrap();
        renderer.set_clear_color(Vec3::new(0.1, 0.2, 0.3));
        assert_eq!(renderer.config().clear_color, Vec3::new(0.1, 0.2, 0.3));

        renderer.render_frame(&Scene::new(), &Camera::new(Vec3::ZERO, 1.0)).unwrap();

        assert!(renderer.to_rgb().iter().all(|&c| c == Vec3::ZERO));
    }
}
