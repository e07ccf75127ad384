//! Cloud volume orchestration: owns the baked fields, the render program
//! and the rebake queue.
//!
//! Parameter changes fall into three tiers. Marching and lighting tunables
//! only touch the uniform buffer and cost nothing. Weather changes rebake
//! the weather map and refresh the field bind group, keeping the pipeline.
//! Noise-frequency changes rebake both atlases and rebuild the program.
//!
//! Rebake requests are coalesced per kind: repeated edits of the same
//! kind collapse into one pending bake (which reads the latest
//! parameters), so a slider being dragged settles on its final value
//! instead of queueing every intermediate step. Weather and noise
//! requests queue independently — they regenerate different resources,
//! and one must never swallow the other.

use glam::{Mat4, Vec3};
use log::{debug, error, info};

use crate::atlas::AtlasLayout;
use crate::config::CloudConfig;
use crate::error::BakeError;
use crate::gpu::bake::{
    bake_noise_atlas, bake_weather_map, NoiseAtlasTexture, WeatherMapTexture,
};
use crate::gpu::program::{CloudProgram, CloudUniforms};
use crate::gpu::GpuContext;

/// What a rebake request has to regenerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebakeKind {
    /// Weather map only; the program keeps its pipeline and just rebinds.
    Weather,
    /// Both noise atlases; the program is rebuilt against the new textures.
    Noise,
}

/// Per-kind rebake coalescing.
///
/// One pending slot per kind: a request issued while the same kind is
/// already pending collapses into it (the bake snapshots the latest
/// parameters when it runs), while a weather and a noise request both
/// stay queued. [`take`](Self::take) drains one request at a time.
#[derive(Debug, Default)]
pub struct RebakeQueue {
    weather: bool,
    noise: bool,
}

impl RebakeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request; a same-kind request already pending is coalesced.
    pub fn request(&mut self, kind: RebakeKind) {
        let slot = match kind {
            RebakeKind::Weather => &mut self.weather,
            RebakeKind::Noise => &mut self.noise,
        };
        if *slot {
            debug!("Coalesced pending {:?} rebake", kind);
        }
        *slot = true;
    }

    /// Take the next pending request, weather before noise.
    pub fn take(&mut self) -> Option<RebakeKind> {
        if self.weather {
            self.weather = false;
            return Some(RebakeKind::Weather);
        }
        if self.noise {
            self.noise = false;
            return Some(RebakeKind::Noise);
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        !self.weather && !self.noise
    }
}

/// The fully assembled cloud volume.
pub struct CloudVolume {
    config: CloudConfig,
    weather: WeatherMapTexture,
    atlas_hi: NoiseAtlasTexture,
    atlas_lo: NoiseAtlasTexture,
    program: CloudProgram,
    rebakes: RebakeQueue,
    surface_format: wgpu::TextureFormat,
}

impl CloudVolume {
    /// Bake all three fields and build the render program.
    ///
    /// This is the only constructor; a [`CloudVolume`] is always renderable
    /// once it exists.
    pub async fn new(
        ctx: &GpuContext,
        surface_format: wgpu::TextureFormat,
        config: CloudConfig,
    ) -> Result<Self, BakeError> {
        info!(
            "Baking cloud fields: weather {}x{}, atlases {}x{} cells",
            config.weather_size, config.weather_size, config.atlas_cells.0, config.atlas_cells.1
        );

        let weather = bake_weather_map(
            ctx,
            config.weather_size,
            config.weather_scale_high,
            config.weather_scale_low,
        )
        .await?;
        let hi_layout = AtlasLayout::new(config.atlas_cell_high, config.atlas_cells.0, config.atlas_cells.1);
        let lo_layout = AtlasLayout::new(config.atlas_cell_low, config.atlas_cells.0, config.atlas_cells.1);
        let atlas_hi = bake_noise_atlas(ctx, hi_layout, &config.frequencies).await?;
        let atlas_lo = bake_noise_atlas(ctx, lo_layout, &config.frequencies).await?;

        let program = CloudProgram::new(&ctx.device, surface_format, &weather, &atlas_hi, &atlas_lo);

        Ok(Self {
            config,
            weather,
            atlas_hi,
            atlas_lo,
            program,
            rebakes: RebakeQueue::new(),
            surface_format,
        })
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    /// Replace the marching and lighting tunables.
    ///
    /// Takes effect on the next frame's uniform upload; never triggers a
    /// rebake even if the baked-field parameters in `config` differ.
    pub fn set_render_params(&mut self, config: CloudConfig) {
        self.config = config;
    }

    /// Change the weather-map noise scales and queue a weather rebake.
    pub fn update_weather_params(&mut self, scale_high: f32, scale_low: f32) {
        self.config.weather_scale_high = scale_high.max(0.0);
        self.config.weather_scale_low = scale_low.max(0.0);
        self.rebakes.request(RebakeKind::Weather);
    }

    /// Change the detail-noise frequencies and queue a full noise rebake.
    pub fn update_texture_params(&mut self, frequencies: crate::config::NoiseFrequencies) {
        self.config.frequencies = frequencies;
        self.rebakes.request(RebakeKind::Noise);
    }

    /// Run every pending rebake.
    ///
    /// Called once per frame by the render loop; drains both kinds when
    /// both are pending. A failed rebake is logged and returned, but the
    /// previous fields and program stay in place; the volume keeps
    /// rendering its last good state.
    pub async fn process_rebakes(&mut self, ctx: &GpuContext) -> Result<(), BakeError> {
        while let Some(kind) = self.rebakes.take() {
            let result = match kind {
                RebakeKind::Weather => self.rebake_weather(ctx).await,
                RebakeKind::Noise => self.rebake_noise(ctx).await,
            };
            if let Err(e) = result {
                error!("{:?} rebake failed, keeping previous fields: {}", kind, e);
                return Err(e);
            }
        }
        Ok(())
    }

    async fn rebake_weather(&mut self, ctx: &GpuContext) -> Result<(), BakeError> {
        let weather = bake_weather_map(
            ctx,
            self.config.weather_size,
            self.config.weather_scale_high,
            self.config.weather_scale_low,
        )
        .await?;
        self.weather = weather;
        self.program
            .refresh_fields(&ctx.device, &self.weather, &self.atlas_hi, &self.atlas_lo);
        info!("Weather map rebaked");
        Ok(())
    }

    async fn rebake_noise(&mut self, ctx: &GpuContext) -> Result<(), BakeError> {
        let atlas_hi =
            bake_noise_atlas(ctx, self.atlas_hi.layout, &self.config.frequencies).await?;
        let atlas_lo =
            bake_noise_atlas(ctx, self.atlas_lo.layout, &self.config.frequencies).await?;
        let program = CloudProgram::new(
            &ctx.device,
            self.surface_format,
            &self.weather,
            &atlas_hi,
            &atlas_lo,
        );
        // Swap only after every bake and the rebuild succeeded.
        self.atlas_hi = atlas_hi;
        self.atlas_lo = atlas_lo;
        self.program = program;
        info!("Noise atlases rebaked");
        Ok(())
    }

    /// Upload this frame's uniforms.
    pub fn prepare(&self, queue: &wgpu::Queue, view_proj: Mat4, camera_pos: Vec3) {
        let uniforms = CloudUniforms::new(
            view_proj,
            camera_pos,
            &self.config,
            self.atlas_hi.layout,
            self.atlas_lo.layout,
        );
        self.program.write_uniforms(queue, &uniforms);
    }

    /// Record the cloud draw into an open render pass.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        self.program.draw(pass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_starts_empty() {
        let mut queue = RebakeQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.take(), None);
    }

    #[test]
    fn test_queue_holds_one_request() {
        let mut queue = RebakeQueue::new();
        queue.request(RebakeKind::Weather);
        assert!(!queue.is_empty());
        assert_eq!(queue.take(), Some(RebakeKind::Weather));
        assert_eq!(queue.take(), None);
    }

    /// A burst of same-kind requests collapses to one pending bake;
    /// intermediate slider positions never run.
    #[test]
    fn test_same_kind_requests_coalesce() {
        let mut queue = RebakeQueue::new();
        queue.request(RebakeKind::Weather);
        queue.request(RebakeKind::Weather);
        queue.request(RebakeKind::Weather);
        assert_eq!(queue.take(), Some(RebakeKind::Weather));
        assert_eq!(queue.take(), None);
    }

    /// A weather and a noise request regenerate different resources;
    /// neither may swallow the other, whatever the arrival order.
    #[test]
    fn test_cross_kind_requests_both_survive() {
        let mut queue = RebakeQueue::new();
        queue.request(RebakeKind::Weather);
        queue.request(RebakeKind::Noise);
        let drained = [queue.take(), queue.take()];
        assert!(drained.contains(&Some(RebakeKind::Weather)));
        assert!(drained.contains(&Some(RebakeKind::Noise)));
        assert_eq!(queue.take(), None);

        // Interleaved same-kind repeats still collapse per kind.
        queue.request(RebakeKind::Weather);
        queue.request(RebakeKind::Noise);
        queue.request(RebakeKind::Weather);
        assert_eq!(queue.take(), Some(RebakeKind::Weather));
        assert_eq!(queue.take(), Some(RebakeKind::Noise));
        assert_eq!(queue.take(), None);
    }

    #[test]
    fn test_queue_refills_after_take() {
        let mut queue = RebakeQueue::new();
        queue.request(RebakeKind::Noise);
        assert_eq!(queue.take(), Some(RebakeKind::Noise));
        queue.request(RebakeKind::Weather);
        assert_eq!(queue.take(), Some(RebakeKind::Weather));
    }
}
