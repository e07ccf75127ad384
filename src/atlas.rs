//! Tiled 3D noise atlas layout.
//!
//! A noise atlas stores a 3D noise volume as a flat 2D texture: the volume
//! is cut into `cells_x * cells_y` depth slices, each `cell_size` texels
//! square, tiled row-major into a `cell_size*cells_x` by `cell_size*cells_y`
//! texture. Slice `s` lives at grid cell `(s % cells_x, s / cells_x)`.
//!
//! Both the bake compute kernel and the raymarch shader agree on this
//! layout; the CPU mapping here is the reference the tests pin down.

use glam::Vec2;

/// Layout of one tiled noise atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasLayout {
    /// Resolution of one slice (and of the volume in x/y), in texels.
    pub cell_size: u32,
    /// Number of tile columns.
    pub cells_x: u32,
    /// Number of tile rows.
    pub cells_y: u32,
}

impl AtlasLayout {
    /// Create a layout.
    ///
    /// # Panics
    ///
    /// Panics if any dimension is zero.
    pub fn new(cell_size: u32, cells_x: u32, cells_y: u32) -> Self {
        assert!(cell_size > 0, "cell_size must be non-zero");
        assert!(cells_x > 0 && cells_y > 0, "cell counts must be non-zero");
        Self {
            cell_size,
            cells_x,
            cells_y,
        }
    }

    /// Total number of depth slices in the volume.
    pub fn slices(&self) -> u32 {
        self.cells_x * self.cells_y
    }

    /// Width of the flattened atlas texture, in texels.
    pub fn width(&self) -> u32 {
        self.cell_size * self.cells_x
    }

    /// Height of the flattened atlas texture, in texels.
    pub fn height(&self) -> u32 {
        self.cell_size * self.cells_y
    }

    /// Total texel count of the flattened texture.
    pub fn texel_count(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Map a flattened texel index to `(slice, local_x, local_y)`.
    pub fn decode(&self, index: u64) -> (u32, u32, u32) {
        let x = (index % self.width() as u64) as u32;
        let y = (index / self.width() as u64) as u32;
        let col = x / self.cell_size;
        let row = y / self.cell_size;
        let slice = row * self.cells_x + col;
        (slice, x - col * self.cell_size, y - row * self.cell_size)
    }

    /// Map `(slice, local_x, local_y)` back to a flattened texel index.
    pub fn encode(&self, slice: u32, local_x: u32, local_y: u32) -> u64 {
        let col = slice % self.cells_x;
        let row = slice / self.cells_x;
        let x = col * self.cell_size + local_x;
        let y = row * self.cell_size + local_y;
        y as u64 * self.width() as u64 + x as u64
    }

    /// Atlas UV of a point `(u, v)` inside slice `slice`.
    ///
    /// `u`/`v` are the in-slice coordinates in [0, 1]; the result addresses
    /// the flattened texture in [0, 1] on both axes.
    pub fn tile_uv(&self, slice: u32, uv: Vec2) -> Vec2 {
        let col = (slice % self.cells_x) as f32;
        let row = (slice / self.cells_x) as f32;
        Vec2::new(
            (col + uv.x) / self.cells_x as f32,
            (row + uv.y) / self.cells_y as f32,
        )
    }

    /// Slice pair and blend factor for a normalized depth `w` in [0, 1].
    ///
    /// Sampling trilinearly across slices means bilinear lookups in two
    /// adjacent tiles mixed by the returned fraction.
    pub fn slice_blend(&self, w: f32) -> (u32, u32, f32) {
        let slices = self.slices();
        let sf = w.clamp(0.0, 1.0) * slices as f32;
        let s0 = (sf as u32).min(slices - 1);
        let s1 = (s0 + 1).min(slices - 1);
        (s0, s1, sf - s0 as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions() {
        let layout = AtlasLayout::new(128, 16, 16);
        assert_eq!(layout.width(), 2048);
        assert_eq!(layout.height(), 2048);
        assert_eq!(layout.slices(), 256);
        assert_eq!(layout.texel_count(), 2048 * 2048);
    }

    #[test]
    fn test_decode_ranges() {
        let layout = AtlasLayout::new(128, 16, 16);
        for index in [0u64, 1, 127, 128, 2047, 2048, 2048 * 2048 - 1] {
            let (slice, lx, ly) = layout.decode(index);
            assert!(slice < 256);
            assert!(lx < 128);
            assert!(ly < 128);
        }
    }

    /// Every flattened index maps to exactly one (slice, local) triple and
    /// the inverse mapping round-trips. Exhaustive over the full atlas.
    #[test]
    fn test_mapping_is_bijective() {
        let layout = AtlasLayout::new(128, 16, 16);
        // Count texels per slice while round-tripping every index.
        let mut per_slice = vec![0u64; layout.slices() as usize];
        for index in 0..layout.texel_count() {
            let (slice, lx, ly) = layout.decode(index);
            per_slice[slice as usize] += 1;
            assert_eq!(layout.encode(slice, lx, ly), index);
        }
        for count in per_slice {
            assert_eq!(count, 128 * 128);
        }
    }

    #[test]
    fn test_tile_uv_corners() {
        let layout = AtlasLayout::new(128, 16, 16);
        // Slice 0 occupies the top-left tile.
        let uv = layout.tile_uv(0, Vec2::ZERO);
        assert_eq!(uv, Vec2::ZERO);
        // Slice 17 sits at column 1, row 1.
        let uv = layout.tile_uv(17, Vec2::ZERO);
        assert!((uv.x - 1.0 / 16.0).abs() < 1e-6);
        assert!((uv.y - 1.0 / 16.0).abs() < 1e-6);
        // In-slice coordinates span exactly one tile.
        let uv = layout.tile_uv(0, Vec2::ONE);
        assert!((uv.x - 1.0 / 16.0).abs() < 1e-6);
    }

    #[test]
    fn test_slice_blend() {
        let layout = AtlasLayout::new(16, 16, 16);
        let (s0, s1, f) = layout.slice_blend(0.0);
        assert_eq!((s0, s1), (0, 1));
        assert!(f.abs() < 1e-6);

        // Last slice clamps rather than wrapping.
        let (s0, s1, _) = layout.slice_blend(1.0);
        assert_eq!((s0, s1), (255, 255));

        let (s0, s1, f) = layout.slice_blend(0.5);
        assert_eq!(s0, 128);
        assert_eq!(s1, 129);
        assert!(f.abs() < 1e-6);
    }
}
