/// Software rendering pipelines
/// Clipping rasterizer shared by a forward and a tiled deferred pipeline.
pub mod deferred;
pub mod forward;
pub mod framebuffer;
pub mod pipeline;
pub mod rasterizer;
pub mod renderer;
pub mod shading;

pub use deferred::{tile_frustum, DeferredPipeline, MaterialTable, TileRect};
pub use forward::{ForwardPasses, ForwardPipeline};
pub use framebuffer::{
    pack_argb32, ColorBuffer, DepthBuffer, GBufferElement, GeometryBuffer, MaterialId, PixelBuffer, FAR_DEPTH,
};
pub use pipeline::{FrameContext, Pipeline};
pub use rasterizer::{classify, clip_near, Classification, ClipCode, Rasterizer, ShadedVertex, Triangle};
pub use renderer::Renderer;
pub use shading::{shade_surface, DirectionalLightView, PointLightView, SceneLights, SurfaceSample};
