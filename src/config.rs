//! Cloud volume configuration.
//!
//! [`CloudConfig`] holds every tunable of the cloud pipeline: coverage and
//! density controls, scattering lobe shapes, the bounding box, weather-map
//! noise scales, and the detail-noise frequencies for the two baked atlases.
//!
//! The render loop takes a snapshot (`Clone`) of the config once per frame
//! and passes it explicitly into the sampling and marching code; the core
//! math never reads shared mutable state.
//!
//! # Example
//!
//! ```ignore
//! let config = CloudConfig::new()
//!     .with_coverage(0.8)
//!     .with_density(1.0)
//!     .with_box_size(Vec3::new(120.0, 50.0, 120.0));
//! ```

use glam::Vec3;

/// Frequency scalars for the detail-noise atlas bake.
///
/// The R channel mixes a perlin and a worley octave; G/B/A are worley
/// octaves at progressively higher frequencies, combined downstream with
/// fixed fractal weights (0.625 / 0.25 / 0.125).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseFrequencies {
    /// Perlin frequency for the structural R channel.
    pub freq1_perlin: f32,
    /// Worley frequency for the structural R channel.
    pub freq1_worley: f32,
    /// Perlin share of the R channel mix, in [0, 1].
    pub perlin_ratio: f32,
    /// Worley frequency for the G detail channel.
    pub freq2: f32,
    /// Worley frequency for the B detail channel.
    pub freq3: f32,
    /// Worley frequency for the A detail channel.
    pub freq4: f32,
}

impl Default for NoiseFrequencies {
    fn default() -> Self {
        Self {
            freq1_perlin: 8.0,
            freq1_worley: 2.0,
            perlin_ratio: 0.15,
            freq2: 10.0,
            freq3: 20.0,
            freq4: 30.0,
        }
    }
}

/// All tunables of the volumetric cloud pipeline.
///
/// Field names follow the usual shorthand of single-scattering cloud
/// shaders: `gc` is global coverage, `gd` global density, `aa` the
/// alpha-erosion strength, `b` the Beer extinction coefficient.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudConfig {
    /// Global cloud coverage probability, in [0, 1].
    pub gc: f32,
    /// Global density multiplier.
    pub gd: f32,
    /// Alpha-erosion strength, in [0, 1]. Thins cloud tops and edges.
    pub aa: f32,
    /// Beer-law extinction coefficient for the light march.
    pub b: f32,
    /// In-scatter boost intensity.
    pub csi: f32,
    /// In-scatter boost exponent.
    pub cse: f32,
    /// Forward (in-scatter) Henyey-Greenstein lobe shape, in (-1, 1).
    pub ins: f32,
    /// Backward (out-scatter) Henyey-Greenstein lobe shape, in (-1, 1).
    pub outs: f32,
    /// Blend factor between the in-scatter and out-scatter lobes, in [0, 1].
    pub ivo: f32,
    /// Ambient extinction floor term.
    pub ac: f32,
    /// Minimum per-sample attenuation, scaled by density.
    pub amin: f32,
    /// Ambient darkening strength, in [0, 1].
    pub osa: f32,
    /// Full extents of the bounding box, in world units.
    pub box_size: Vec3,
    /// World-space direction toward the sun (normalized on use).
    pub light_dir: Vec3,
    /// Weather map texture size, in texels per side.
    pub weather_size: u32,
    /// Perlin scale for the weather coverage0 channel.
    pub weather_scale_high: f32,
    /// Worley scale for the weather coverage1 channel.
    pub weather_scale_low: f32,
    /// Atlas tile grid, cells per axis (cells_x, cells_y).
    pub atlas_cells: (u32, u32),
    /// Slice resolution of the high-frequency noise atlas.
    pub atlas_cell_high: u32,
    /// Slice resolution of the low-frequency noise atlas.
    pub atlas_cell_low: u32,
    /// Detail-noise frequencies for both atlas bakes.
    pub frequencies: NoiseFrequencies,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            gc: 0.7,
            gd: 0.9,
            aa: 0.0,
            b: 0.4,
            csi: 0.5,
            cse: 10.0,
            ins: 0.5,
            outs: -0.5,
            ivo: 0.3,
            ac: 0.3,
            amin: 0.2,
            osa: 0.9,
            box_size: Vec3::new(100.0, 60.0, 100.0),
            light_dir: Vec3::new(0.3, 1.0, 0.2),
            weather_size: 512,
            weather_scale_high: 5.0,
            weather_scale_low: 6.0,
            atlas_cells: (16, 16),
            atlas_cell_high: 128,
            atlas_cell_low: 16,
            frequencies: NoiseFrequencies::default(),
        }
    }
}

impl CloudConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the global coverage probability (clamped to [0, 1]).
    pub fn with_coverage(mut self, gc: f32) -> Self {
        self.gc = gc.clamp(0.0, 1.0);
        self
    }

    /// Set the global density multiplier (clamped to >= 0).
    pub fn with_density(mut self, gd: f32) -> Self {
        self.gd = gd.max(0.0);
        self
    }

    /// Set the alpha-erosion strength (clamped to [0, 1]).
    pub fn with_erosion(mut self, aa: f32) -> Self {
        self.aa = aa.clamp(0.0, 1.0);
        self
    }

    /// Set the light-extinction coefficient (clamped to >= 0).
    pub fn with_extinction(mut self, b: f32) -> Self {
        self.b = b.max(0.0);
        self
    }

    /// Set the in/out scattering lobe shapes (each clamped inside (-1, 1)).
    pub fn with_scatter_lobes(mut self, ins: f32, outs: f32, ivo: f32) -> Self {
        self.ins = ins.clamp(-0.999, 0.999);
        self.outs = outs.clamp(-0.999, 0.999);
        self.ivo = ivo.clamp(0.0, 1.0);
        self
    }

    /// Set the ambient darkening strength (clamped to [0, 1]).
    pub fn with_ambient(mut self, osa: f32) -> Self {
        self.osa = osa.clamp(0.0, 1.0);
        self
    }

    /// Set the bounding box extents (each axis clamped to >= 1).
    pub fn with_box_size(mut self, size: Vec3) -> Self {
        self.box_size = size.max(Vec3::ONE);
        self
    }

    /// Set the weather map noise scales.
    pub fn with_weather_scales(mut self, high: f32, low: f32) -> Self {
        self.weather_scale_high = high.max(0.0);
        self.weather_scale_low = low.max(0.0);
        self
    }

    /// Set the detail-noise frequencies.
    pub fn with_frequencies(mut self, frequencies: NoiseFrequencies) -> Self {
        self.frequencies = frequencies;
        self
    }

    /// Minimum corner of the bounding box, centered on the origin.
    pub fn box_min(&self) -> Vec3 {
        self.box_size * -0.5
    }

    /// Maximum corner of the bounding box, centered on the origin.
    pub fn box_max(&self) -> Vec3 {
        self.box_size * 0.5
    }
}
