/// Soft Renderer - CPU-only 3D rendering core
/// Clipping rasterizer, forward and tiled deferred pipelines, worker pool
/// and per-stage timing.
pub mod camera;
pub mod config;
pub mod error;
pub mod geometry;
pub mod material;
pub mod parallel;
pub mod perf;
pub mod rendering;
pub mod scene;

pub use camera::Camera;
pub use config::{PipelineKind, RendererConfig, DEFAULT_TILE_SIZE};
pub use error::{RenderError, Result};
pub use geometry::{BoundingBox, Frustum, Plane, Sphere};
pub use material::{BlinnPhong, Lambert, Material, RasterizeMode, SurfaceShader, Texture2D};
pub use parallel::{WorkerPool, WorkerState};
pub use perf::{CounterSnapshot, FrameStatistics, PerfCounters, PerfSnapshot, PerfTerm, FUNCTION_COUNTERS};
pub use rendering::{DeferredPipeline, ForwardPipeline, Pipeline, Rasterizer, Renderer};
pub use scene::{Entity, Light, LightKind, Scene, SubMesh, Vertex};
