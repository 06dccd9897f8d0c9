/// Error type for construction-time validation.
/// Hot-path contract violations (pixel out of bounds) stay assertions.
use glam::UVec2;

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("invalid resolution {0}: both dimensions must be non-zero")]
    InvalidResolution(UVec2),

    #[error("tile size must be non-zero")]
    InvalidTileSize,

    #[error("index count {0} is not a multiple of 3")]
    IndexCountNotTriangles(usize),

    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u16, vertex_count: usize },

    #[error("{0} vertices cannot be addressed by 16-bit indices")]
    TooManyVertices(usize),

    #[error("texture {width}x{height} expects {expected} texels, got {actual}")]
    TexelCountMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("transform of entity '{0}' is not invertible")]
    SingularTransform(String),

    #[error("pipeline resolution {pipeline} does not match renderer resolution {renderer}")]
    ResolutionMismatch { pipeline: UVec2, renderer: UVec2 },

    #[error("no active pipeline")]
    NoActivePipeline,

    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;
