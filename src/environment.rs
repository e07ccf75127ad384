//! Background environment pass.
//!
//! Draws the sky behind the cloud volume: an equirectangular environment
//! image when one loads, a procedural horizon gradient otherwise. Asset
//! failures are logged and the gradient takes over; cloud rendering never
//! depends on this pass succeeding.

use std::path::Path;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use log::warn;
use wgpu::util::DeviceExt;

use crate::error::AssetError;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct EnvironmentUniforms {
    inv_view_proj: [[f32; 4]; 4],
    /// x: 1.0 when an environment image is bound, 0.0 for the gradient.
    params: [f32; 4],
}

/// The fullscreen background pass.
pub struct Environment {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    has_image: bool,
}

impl Environment {
    /// Build the pass, trying to load `path` as an equirectangular image.
    ///
    /// A missing or undecodable image is not fatal: it is logged and the
    /// pass falls back to the procedural gradient.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        path: Option<&Path>,
    ) -> Self {
        let image = match path {
            Some(path) => match load_equirect(path) {
                Ok(image) => Some(image),
                Err(e) => {
                    warn!(
                        "Environment image {:?} unavailable, using gradient sky: {}",
                        path, e
                    );
                    None
                }
            },
            None => None,
        };
        let has_image = image.is_some();

        // A 1x1 placeholder keeps the bind group layout uniform when no
        // image loaded; the shader never samples it then.
        let (width, height, pixels) = match image {
            Some(image) => {
                let (w, h) = image.dimensions();
                (w, h, image.into_raw())
            }
            None => (1, 1, vec![0u8; 4]),
        };

        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("Environment Map"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &pixels,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Environment Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Environment Uniforms"),
            size: std::mem::size_of::<EnvironmentUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Environment Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Environment Bind Group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Environment Shader"),
            source: wgpu::ShaderSource::Wgsl(ENVIRONMENT_WGSL.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Environment Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Environment Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            uniform_buffer,
            bind_group,
            has_image,
        }
    }

    /// Upload this frame's uniforms.
    pub fn prepare(&self, queue: &wgpu::Queue, view_proj: Mat4) {
        let uniforms = EnvironmentUniforms {
            inv_view_proj: view_proj.inverse().to_cols_array_2d(),
            params: [if self.has_image { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    /// Record the fullscreen background draw.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

/// Decode an equirectangular image to 8-bit RGBA.
///
/// HDR inputs are tonemapped by the decoder's clamp; good enough for a
/// backdrop.
fn load_equirect(path: &Path) -> Result<image::RgbaImage, AssetError> {
    let image = image::open(path)?;
    Ok(image.to_rgba8())
}

/// The background shader source.
pub const ENVIRONMENT_WGSL: &str = r#"
struct Uniforms {
    inv_view_proj: mat4x4<f32>,
    params: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> u: Uniforms;
@group(0) @binding(1)
var env_tex: texture_2d<f32>;
@group(0) @binding(2)
var env_sampler: sampler;

const PI: f32 = 3.14159265358979;

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) ndc: vec2<f32>,
};

// Fullscreen triangle from the vertex index alone.
@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VsOut {
    var out: VsOut;
    let x = f32(i32(index) / 2) * 4.0 - 1.0;
    let y = f32(i32(index) % 2) * 4.0 - 1.0;
    out.clip = vec4<f32>(x, y, 1.0, 1.0);
    out.ndc = vec2<f32>(x, y);
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    // Unproject two depths to recover the world-space view ray.
    let near = u.inv_view_proj * vec4<f32>(in.ndc, 0.1, 1.0);
    let far = u.inv_view_proj * vec4<f32>(in.ndc, 0.9, 1.0);
    let dir = normalize(far.xyz / far.w - near.xyz / near.w);

    if u.params.x > 0.5 {
        let uv = vec2<f32>(
            atan2(dir.z, dir.x) / (2.0 * PI) + 0.5,
            acos(clamp(dir.y, -1.0, 1.0)) / PI,
        );
        return vec4<f32>(textureSampleLevel(env_tex, env_sampler, uv, 0.0).rgb, 1.0);
    }

    // Horizon gradient fallback.
    let t = clamp(dir.y * 0.5 + 0.5, 0.0, 1.0);
    let horizon = vec3<f32>(0.82, 0.86, 0.92);
    let zenith = vec3<f32>(0.25, 0.45, 0.78);
    return vec4<f32>(mix(horizon, zenith, pow(t, 0.8)), 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_asset_is_an_error_not_a_panic() {
        let err = load_equirect(Path::new("/nonexistent/sky.png")).unwrap_err();
        assert!(matches!(err, AssetError::ImageLoad(_) | AssetError::Io(_)));
    }

    #[test]
    fn test_environment_shader_entry_points() {
        assert!(ENVIRONMENT_WGSL.contains("fn vs_main"));
        assert!(ENVIRONMENT_WGSL.contains("fn fs_main"));
    }

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<EnvironmentUniforms>(), 80);
    }
}
