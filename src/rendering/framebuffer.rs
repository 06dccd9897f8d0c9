/// Frame buffers for software rendering: depth, color and the deferred
/// geometry buffer.
///
/// Every pixel is its own small lock so entity tasks can write into one
/// shared buffer concurrently. Depth-tested writes hold the depth cell
/// while the fragment payload is stored, which keeps the compare-and-write
/// and the payload store atomic with respect to other writers of the same
/// pixel. Lock order is always depth, then payload.
use crate::count_call;
use crate::perf::FUNCTION_COUNTERS;
use glam::{UVec2, Vec2, Vec3};
use parking_lot::{Mutex, MutexGuard};

/// Stored depth of a cleared depth buffer (the far plane).
pub const FAR_DEPTH: f32 = 1.0;

pub struct PixelBuffer<T> {
    size: UVec2,
    cells: Vec<Mutex<T>>,
}

pub type DepthBuffer = PixelBuffer<f32>;
pub type ColorBuffer = PixelBuffer<Vec3>;
pub type GeometryBuffer = PixelBuffer<GBufferElement>;

impl<T: Copy> PixelBuffer<T> {
    pub fn new(size: UVec2, value: T) -> Self {
        let len = size.x as usize * size.y as usize;
        Self {
            size,
            cells: (0..len).map(|_| Mutex::new(value)).collect(),
        }
    }

    #[inline]
    pub fn size(&self) -> UVec2 {
        self.size
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.size.x
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.size.y
    }

    #[inline]
    fn index(&self, pixel: UVec2) -> usize {
        assert!(
            pixel.x < self.size.x && pixel.y < self.size.y,
            "pixel {pixel} outside buffer of size {}",
            self.size
        );
        (pixel.y * self.size.x + pixel.x) as usize
    }

    #[inline]
    pub fn get(&self, pixel: UVec2) -> T {
        *self.cells[self.index(pixel)].lock()
    }

    #[inline]
    pub fn set(&self, pixel: UVec2, value: T) {
        *self.cells[self.index(pixel)].lock() = value;
    }

    #[inline]
    pub fn lock(&self, pixel: UVec2) -> MutexGuard<'_, T> {
        self.cells[self.index(pixel)].lock()
    }

    /// Exclusive access makes the clear lock-free.
    pub fn clear(&mut self, value: T) {
        count_call!(FUNCTION_COUNTERS.framebuffer_clears);
        for cell in &mut self.cells {
            *cell.get_mut() = value;
        }
    }

    /// Row-major copy, top row first.
    pub fn to_vec(&self) -> Vec<T> {
        self.cells.iter().map(|cell| *cell.lock()).collect()
    }
}

impl DepthBuffer {
    pub fn new_depth(size: UVec2) -> Self {
        Self::new(size, FAR_DEPTH)
    }

    /// Depth test with the `<=` policy: a fragment at equal depth passes.
    /// On success the stored depth is replaced and `on_pass` runs while the
    /// pixel is still held.
    #[inline]
    pub fn test_and_write<F: FnOnce()>(&self, pixel: UVec2, depth: f32, on_pass: F) -> bool {
        count_call!(FUNCTION_COUNTERS.fragments_tested);
        let mut stored = self.lock(pixel);
        if depth <= *stored {
            *stored = depth;
            on_pass();
            count_call!(FUNCTION_COUNTERS.fragments_passed);
            true
        } else {
            count_call!(FUNCTION_COUNTERS.fragments_failed);
            false
        }
    }
}

impl ColorBuffer {
    /// Packed 0xAARRGGBB, channels clamped to [0, 1].
    pub fn to_argb32(&self) -> Vec<u32> {
        self.cells.iter().map(|cell| pack_argb32(*cell.lock())).collect()
    }
}

#[inline]
pub fn pack_argb32(color: Vec3) -> u32 {
    let c = (color.clamp(Vec3::ZERO, Vec3::ONE) * 255.0 + 0.5).as_uvec3();
    0xFF00_0000 | (c.x << 16) | (c.y << 8) | c.z
}

/// Index into the per-frame material table the deferred geometry pass
/// builds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(pub u32);

/// Un-lit surface sample written by the deferred geometry pass.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GBufferElement {
    /// `None` marks a pixel no geometry was written to.
    pub material: Option<MaterialId>,
    /// View-space position.
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl GBufferElement {
    /// No material, and a view depth beyond any far plane.
    pub const EMPTY: GBufferElement = GBufferElement {
        material: None,
        position: Vec3::new(0.0, 0.0, f32::INFINITY),
        normal: Vec3::ZERO,
        uv: Vec2::ZERO,
    };

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.material.is_none()
    }
}

impl Default for GBufferElement {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl GeometryBuffer {
    pub fn new_geometry(size: UVec2) -> Self {
        Self::new(size, GBufferElement::EMPTY)
    }
}
