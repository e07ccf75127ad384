//! # cumulus
//!
//! Raymarched volumetric cloud rendering on the GPU.
//!
//! cumulus bakes its cloud fields with compute shaders (a 2D weather map
//! plus two tiled 3D noise atlases) and renders them with a per-pixel
//! two-pass raymarch: 32 fixed steps through the bounding box, and an
//! 8-step secondary march toward the sun wherever density is found, with
//! Beer-law extinction and a blended Henyey-Greenstein phase function.
//!
//! ## Quick Start
//!
//! ```ignore
//! use cumulus::prelude::*;
//!
//! fn main() -> Result<(), CloudError> {
//!     env_logger::init();
//!     let config = CloudConfig::new()
//!         .with_coverage(0.7)
//!         .with_density(0.9)
//!         .with_box_size(Vec3::new(100.0, 60.0, 100.0));
//!     App::new(config, None).run()
//! }
//! ```
//!
//! ## Architecture
//!
//! | Layer | Modules |
//! |-------|---------|
//! | Field baking | [`gpu::bake`], [`atlas`], [`shader_utils`] |
//! | Cloud math (CPU reference) | [`density`], [`lighting`], [`raymarch`] |
//! | Rendering | [`gpu::program`], [`volume`], [`environment`] |
//! | Viewer | [`camera`], [`window`] |
//!
//! The CPU modules are the reference implementation of the shader math;
//! every formula in the WGSL sources has a matching, unit-tested Rust
//! function here.
//!
//! ## Parameter tiers
//!
//! Changing a [`CloudConfig`] field costs one of three things:
//! - marching/lighting tunables: a uniform upload, effective next frame;
//! - weather scales: a weather-map rebake plus a bind-group refresh;
//! - noise frequencies: both atlases rebaked and the program rebuilt.
//!
//! [`CloudVolume`](volume::CloudVolume) routes edits to the right tier and
//! coalesces rebake requests per kind, so a dragged slider bakes once at
//! its final value while weather and noise edits queue independently.

pub mod atlas;
pub mod camera;
pub mod config;
pub mod density;
pub mod environment;
pub mod error;
pub mod gpu;
pub mod lighting;
pub mod raymarch;
pub mod shader_utils;
pub mod volume;
pub mod window;

pub use atlas::AtlasLayout;
pub use config::{CloudConfig, NoiseFrequencies};
pub use error::{AssetError, BakeError, CloudError, GpuError};
pub use volume::{CloudVolume, RebakeKind, RebakeQueue};
pub use window::App;

/// Everything needed to configure and run the viewer.
pub mod prelude {
    pub use crate::camera::{OrbitCamera, Projection};
    pub use crate::config::{CloudConfig, NoiseFrequencies};
    pub use crate::error::CloudError;
    pub use crate::volume::CloudVolume;
    pub use crate::window::App;
    pub use glam::{Mat4, Vec2, Vec3, Vec4};
}
