/// Renderer configuration.
use crate::error::{RenderError, Result};
use glam::{UVec2, Vec3};

/// Default edge length of a deferred shading tile, in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 16;

/// Which frame orchestration strategy the renderer runs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum PipelineKind {
    Forward,
    #[default]
    Deferred,
}

#[derive(Copy, Clone, Debug)]
pub struct RendererConfig {
    pub resolution: UVec2,
    /// Worker threads; 0 means hardware concurrency, 1 runs everything inline.
    pub thread_count: usize,
    /// Deferred shading tile edge length.
    pub tile_size: u32,
    pub clear_color: Vec3,
    pub pipeline: PipelineKind,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            resolution: UVec2::new(640, 480),
            thread_count: 0,
            tile_size: DEFAULT_TILE_SIZE,
            clear_color: Vec3::ZERO,
            pipeline: PipelineKind::Deferred,
        }
    }
}

impl RendererConfig {
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = UVec2::new(width, height);
        self
    }

    pub fn with_thread_count(mut self, thread_count: usize) -> Self {
        self.thread_count = thread_count;
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineKind) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.resolution.x as f32 / self.resolution.y as f32
    }

    pub fn validate(&self) -> Result<()> {
        validate_resolution(self.resolution)?;
        if self.tile_size == 0 {
            return Err(RenderError::InvalidTileSize);
        }
        Ok(())
    }
}

pub(crate) fn validate_resolution(resolution: UVec2) -> Result<()> {
    if resolution.x == 0 || resolution.y == 0 {
        return Err(RenderError::InvalidResolution(resolution));
    }
    Ok(())
}
