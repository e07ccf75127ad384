//! Compute kernels that bake the procedural cloud fields.
//!
//! Two kernels, both one logical thread per output texel: the 2D weather
//! map and the tiled 3D noise atlas. A bake submits the dispatch, waits
//! for the queue to drain, and only then hands the texture back — callers
//! never observe a partially written field.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::{GpuContext, BAKE_WORKGROUP_SIZE, FIELD_FORMAT};
use crate::atlas::AtlasLayout;
use crate::config::NoiseFrequencies;
use crate::error::BakeError;
use crate::shader_utils::NOISE_WGSL;

/// Baked weather map: one texel per world column, RGBA =
/// (coverage0, coverage1, top height factor, density factor).
pub struct WeatherMapTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    /// Side length in texels.
    pub size: u32,
}

/// Baked tiled 3D noise atlas. RGBA = structural channel plus three
/// progressively finer worley octaves.
pub struct NoiseAtlasTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub layout: AtlasLayout,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct WeatherBakeParams {
    size: u32,
    _pad: u32,
    scale_high: f32,
    scale_low: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct AtlasBakeParams {
    cell_size: u32,
    cells_x: u32,
    cells_y: u32,
    _pad: u32,
    freq1_perlin: f32,
    freq1_worley: f32,
    perlin_ratio: f32,
    freq2: f32,
    freq3: f32,
    freq4: f32,
    _pad2: [f32; 2],
}

/// Bake the weather map.
///
/// Per texel: `coverage0 = 1 - perlin(uv * scale_high)`,
/// `coverage1 = 1 - worley(uv * scale_low)`, height and density factors
/// fixed at 1. All channels land in [0, 1].
pub async fn bake_weather_map(
    ctx: &GpuContext,
    size: u32,
    scale_high: f32,
    scale_low: f32,
) -> Result<WeatherMapTexture, BakeError> {
    let params = WeatherBakeParams {
        size,
        _pad: 0,
        scale_high,
        scale_low,
    };
    let (texture, view) = run_bake_dispatch(
        ctx,
        "Weather Map",
        &weather_bake_source(),
        bytemuck::bytes_of(&params),
        size,
        size,
    )
    .await?;
    Ok(WeatherMapTexture {
        texture,
        view,
        size,
    })
}

/// Bake one tiled 3D noise atlas.
///
/// Per texel the flattened index is decoded back to a volume coordinate,
/// then R mixes a perlin and a worley octave while G/B/A are worley
/// octaves at the caller's detail frequencies.
pub async fn bake_noise_atlas(
    ctx: &GpuContext,
    layout: AtlasLayout,
    frequencies: &NoiseFrequencies,
) -> Result<NoiseAtlasTexture, BakeError> {
    let params = AtlasBakeParams {
        cell_size: layout.cell_size,
        cells_x: layout.cells_x,
        cells_y: layout.cells_y,
        _pad: 0,
        freq1_perlin: frequencies.freq1_perlin,
        freq1_worley: frequencies.freq1_worley,
        perlin_ratio: frequencies.perlin_ratio,
        freq2: frequencies.freq2,
        freq3: frequencies.freq3,
        freq4: frequencies.freq4,
        _pad2: [0.0; 2],
    };
    let (texture, view) = run_bake_dispatch(
        ctx,
        "Noise Atlas",
        &atlas_bake_source(),
        bytemuck::bytes_of(&params),
        layout.width(),
        layout.height(),
    )
    .await?;
    Ok(NoiseAtlasTexture {
        texture,
        view,
        layout,
    })
}

/// Create the output texture, run one texel-per-thread dispatch over it,
/// and block until the queue has drained.
async fn run_bake_dispatch(
    ctx: &GpuContext,
    label: &str,
    shader_source: &str,
    params_bytes: &[u8],
    width: u32,
    height: u32,
) -> Result<(wgpu::Texture, wgpu::TextureView), BakeError> {
    let device = &ctx.device;

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FIELD_FORMAT,
        usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(shader_source.into()),
    });

    let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Bake Params"),
        contents: params_bytes,
        usage: wgpu::BufferUsages::UNIFORM,
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Bake Bind Group Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: FIELD_FORMAT,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            },
        ],
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Bake Bind Group"),
        layout: &bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: params_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&view),
            },
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Bake Pipeline Layout"),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        module: &shader,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    });

    // Any validation failure in the dispatch surfaces through this scope;
    // a failed bake is fatal to its consumer, never partially usable.
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Bake Encoder"),
    });
    {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Bake Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(
            width.div_ceil(BAKE_WORKGROUP_SIZE),
            height.div_ceil(BAKE_WORKGROUP_SIZE),
            1,
        );
    }
    ctx.queue.submit(Some(encoder.finish()));
    let _ = ctx.device.poll(wgpu::Maintain::Wait);

    if let Some(error) = device.pop_error_scope().await {
        return Err(BakeError::DispatchFailed(error.to_string()));
    }

    Ok((texture, view))
}

/// Assemble the full weather-map kernel source.
pub fn weather_bake_source() -> String {
    format!("{}\n{}", NOISE_WGSL, WEATHER_KERNEL_WGSL)
}

/// Assemble the full noise-atlas kernel source.
pub fn atlas_bake_source() -> String {
    format!("{}\n{}", NOISE_WGSL, ATLAS_KERNEL_WGSL)
}

/// Weather map kernel: one thread per texel.
const WEATHER_KERNEL_WGSL: &str = r#"
struct Params {
    size: u32,
    _pad: u32,
    scale_high: f32,
    scale_low: f32,
};

@group(0) @binding(0)
var<uniform> params: Params;

@group(0) @binding(1)
var out_tex: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size(16, 16)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if gid.x >= params.size || gid.y >= params.size {
        return;
    }
    let uv = vec2<f32>(f32(gid.x), f32(gid.y)) / f32(params.size);

    let wc0 = 1.0 - perlin01(vec3<f32>(uv * params.scale_high, 0.0));
    let wc1 = 1.0 - worley01(vec3<f32>(uv * params.scale_low, 0.0));

    textureStore(out_tex, vec2<i32>(gid.xy), vec4<f32>(wc0, wc1, 1.0, 1.0));
}
"#;

/// Noise atlas kernel: recover the volume coordinate from the flattened
/// tile index, then evaluate one structural and three detail octaves.
const ATLAS_KERNEL_WGSL: &str = r#"
struct Params {
    cell_size: u32,
    cells_x: u32,
    cells_y: u32,
    _pad: u32,
    freq1_perlin: f32,
    freq1_worley: f32,
    perlin_ratio: f32,
    freq2: f32,
    freq3: f32,
    freq4: f32,
    _pad2: vec2<f32>,
};

@group(0) @binding(0)
var<uniform> params: Params;

@group(0) @binding(1)
var out_tex: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size(16, 16)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let width = params.cell_size * params.cells_x;
    let height = params.cell_size * params.cells_y;
    if gid.x >= width || gid.y >= height {
        return;
    }

    let col = gid.x / params.cell_size;
    let row = gid.y / params.cell_size;
    let slice = row * params.cells_x + col;
    let slices = params.cells_x * params.cells_y;
    let local = gid.xy - vec2<u32>(col, row) * params.cell_size;

    let p = vec3<f32>(
        f32(local.x) / f32(params.cell_size),
        f32(local.y) / f32(params.cell_size),
        f32(slice) / f32(slices),
    );

    let structural = perlin01(p * params.freq1_perlin) * params.perlin_ratio
        + worley01(p * params.freq1_worley) * (1.0 - params.perlin_ratio);
    let r = 1.0 - structural;
    let g = worley01(p * params.freq2);
    let b = worley01(p * params.freq3);
    let a = worley01(p * params.freq4);

    textureStore(out_tex, vec2<i32>(gid.xy), vec4<f32>(r, g, b, a));
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_sources_assemble() {
        let weather = weather_bake_source();
        assert!(weather.contains("fn perlin01"));
        assert!(weather.contains("@compute"));

        let atlas = atlas_bake_source();
        assert!(atlas.contains("fn worley01"));
        assert!(atlas.contains("freq4"));
    }

    #[test]
    fn test_params_sizes_match_wgsl_layout() {
        assert_eq!(std::mem::size_of::<WeatherBakeParams>(), 16);
        assert_eq!(std::mem::size_of::<AtlasBakeParams>(), 48);
    }
}
