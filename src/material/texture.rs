/// Textures and point sampling.
use crate::error::{RenderError, Result};
use glam::{UVec2, Vec2};

/// Keeps sampled coordinates strictly below 1.0 so `u * width` never
/// lands on `width`.
const EDGE_EPSILON: f32 = 1e-5;

/// Row-major 2D texel grid.
#[derive(Clone, Debug)]
pub struct Texture2D<T> {
    size: UVec2,
    texels: Vec<T>,
}

impl<T: Copy> Texture2D<T> {
    /// Texture of the given size filled with one value.
    pub fn filled(width: u32, height: u32, value: T) -> Result<Self> {
        Self::from_texels(width, height, vec![value; width as usize * height as usize])
    }

    pub fn from_texels(width: u32, height: u32, texels: Vec<T>) -> Result<Self> {
        let size = UVec2::new(width, height);
        crate::config::validate_resolution(size)?;
        let expected = width as usize * height as usize;
        if texels.len() != expected {
            return Err(RenderError::TexelCountMismatch {
                width,
                height,
                expected,
                actual: texels.len(),
            });
        }
        Ok(Self { size, texels })
    }

    /// Builds a texture by evaluating `f(x, y)` for every texel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> T) -> Result<Self> {
        let mut texels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                texels.push(f(x, y));
            }
        }
        Self::from_texels(width, height, texels)
    }

    #[inline]
    pub fn size(&self) -> UVec2 {
        self.size
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> T {
        assert!(x < self.size.x && y < self.size.y, "texel ({x}, {y}) outside {}", self.size);
        self.texels[(y * self.size.x + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: T) {
        assert!(x < self.size.x && y < self.size.y, "texel ({x}, {y}) outside {}", self.size);
        self.texels[(y * self.size.x + x) as usize] = value;
    }
}

/// How texture coordinates outside [0, 1) are resolved.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum AddressMode {
    #[default]
    Repeat,
    ClampToEdge,
}

impl AddressMode {
    #[inline]
    fn resolve(self, coord: f32) -> f32 {
        match self {
            AddressMode::Repeat => (coord - coord.floor()) * (1.0 - EDGE_EPSILON),
            AddressMode::ClampToEdge => coord.clamp(0.0, 1.0 - EDGE_EPSILON),
        }
    }
}

/// Nearest-texel sampler.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PointSampler {
    pub address_mode: AddressMode,
}

impl PointSampler {
    pub const fn new(address_mode: AddressMode) -> Self {
        Self { address_mode }
    }

    pub fn sample<T: Copy>(&self, texture: &Texture2D<T>, uv: Vec2) -> T {
        let u = self.address_mode.resolve(uv.x);
        let v = self.address_mode.resolve(uv.y);
        let size = texture.size();
        let x = ((u * size.x as f32) as u32).min(size.x - 1);
        let y = ((v * size.y as f32) as u32).min(size.y - 1);
        texture.get(x, y)
    }
}
