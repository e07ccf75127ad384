//! The cloud render program: pipeline, uniforms and the raymarch shader.
//!
//! Draws the bounding box of the volume and raymarches through it in the
//! fragment stage, sampling the baked weather map and the two noise
//! atlases. The shader math is the GPU port of [`density`](crate::density),
//! [`lighting`](crate::lighting) and [`raymarch`](crate::raymarch).

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use crate::atlas::AtlasLayout;
use crate::config::CloudConfig;
use crate::shader_utils::CLOUD_MATH_WGSL;

use super::bake::{NoiseAtlasTexture, WeatherMapTexture};

/// Per-frame uniforms of the raymarch shader.
///
/// Layout matches the WGSL `Uniforms` struct; vec3 values carry a fourth
/// padding component.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct CloudUniforms {
    pub view_proj: [[f32; 4]; 4],
    /// Camera position, xyz.
    pub camera_pos: [f32; 4],
    /// Direction toward the sun, xyz (normalized).
    pub light_dir: [f32; 4],
    pub box_min: [f32; 4],
    pub box_max: [f32; 4],
    /// (gc, gd, aa, b)
    pub density_params: [f32; 4],
    /// (csi, cse, ins, outs)
    pub scatter_params: [f32; 4],
    /// (ivo, ac, amin, osa)
    pub ambient_params: [f32; 4],
    /// High-frequency atlas grid: (cells_x, cells_y, slices, 0)
    pub atlas_hi: [f32; 4],
    /// Low-frequency atlas grid: (cells_x, cells_y, slices, 0)
    pub atlas_lo: [f32; 4],
}

impl CloudUniforms {
    /// Assemble the frame uniforms from a config snapshot and the camera.
    pub fn new(
        view_proj: Mat4,
        camera_pos: Vec3,
        config: &CloudConfig,
        hi: AtlasLayout,
        lo: AtlasLayout,
    ) -> Self {
        let light = config.light_dir.normalize();
        let box_min = config.box_min();
        let box_max = config.box_max();
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            camera_pos: [camera_pos.x, camera_pos.y, camera_pos.z, 0.0],
            light_dir: [light.x, light.y, light.z, 0.0],
            box_min: [box_min.x, box_min.y, box_min.z, 0.0],
            box_max: [box_max.x, box_max.y, box_max.z, 0.0],
            density_params: [config.gc, config.gd, config.aa, config.b],
            scatter_params: [config.csi, config.cse, config.ins, config.outs],
            ambient_params: [config.ivo, config.ac, config.amin, config.osa],
            atlas_hi: [
                hi.cells_x as f32,
                hi.cells_y as f32,
                hi.slices() as f32,
                0.0,
            ],
            atlas_lo: [
                lo.cells_x as f32,
                lo.cells_y as f32,
                lo.slices() as f32,
                0.0,
            ],
        }
    }
}

/// Cube vertex; positions span [-0.5, 0.5] and are scaled to the box in
/// the vertex shader.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct BoxVertex {
    position: [f32; 3],
}

const BOX_VERTICES: [BoxVertex; 8] = [
    BoxVertex { position: [-0.5, -0.5, -0.5] },
    BoxVertex { position: [0.5, -0.5, -0.5] },
    BoxVertex { position: [0.5, 0.5, -0.5] },
    BoxVertex { position: [-0.5, 0.5, -0.5] },
    BoxVertex { position: [-0.5, -0.5, 0.5] },
    BoxVertex { position: [0.5, -0.5, 0.5] },
    BoxVertex { position: [0.5, 0.5, 0.5] },
    BoxVertex { position: [-0.5, 0.5, 0.5] },
];

// Outward CCW winding; front faces are culled at draw time so the far
// side of the box rasterizes, which keeps the march running when the
// camera is inside the volume.
#[rustfmt::skip]
const BOX_INDICES: [u16; 36] = [
    0, 3, 2, 2, 1, 0, // -z
    5, 6, 7, 7, 4, 5, // +z
    4, 7, 3, 3, 0, 4, // -x
    1, 2, 6, 6, 5, 1, // +x
    4, 0, 1, 1, 5, 4, // -y
    3, 7, 6, 6, 2, 3, // +y
];

/// The compiled cloud renderer: box geometry, uniforms and the baked
/// field textures bound to the raymarch pipeline.
pub struct CloudProgram {
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    field_layout: wgpu::BindGroupLayout,
    field_bind_group: wgpu::BindGroup,
    sampler: wgpu::Sampler,
}

impl CloudProgram {
    /// Build the render pipeline against the surface `format` and bind
    /// the three baked field textures.
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        weather: &WeatherMapTexture,
        atlas_hi: &NoiseAtlasTexture,
        atlas_lo: &NoiseAtlasTexture,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Cloud Raymarch"),
            source: wgpu::ShaderSource::Wgsl(raymarch_source().into()),
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Cloud Box Vertices"),
            contents: bytemuck::cast_slice(&BOX_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Cloud Box Indices"),
            contents: bytemuck::cast_slice(&BOX_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cloud Uniforms"),
            size: std::mem::size_of::<CloudUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Cloud Uniform Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Cloud Uniform Bind Group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let field_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Cloud Field Layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                texture_entry(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        // Repeat addressing makes the atlas uvw wrap seamless in x/y.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Cloud Field Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let field_bind_group =
            create_field_bind_group(device, &field_layout, &sampler, weather, atlas_hi, atlas_lo);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Cloud Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout, &field_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Cloud Raymarch Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<BoxVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x3],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // Draw the back faces so the march still runs when the
                // camera sits inside the box.
                cull_mode: Some(wgpu::Face::Front),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            vertex_buffer,
            index_buffer,
            uniform_buffer,
            uniform_bind_group,
            field_layout,
            field_bind_group,
            sampler,
        }
    }

    /// Swap in freshly baked field textures without touching the pipeline.
    ///
    /// This is the weather-only rebake path: only the bind group is
    /// recreated.
    pub fn refresh_fields(
        &mut self,
        device: &wgpu::Device,
        weather: &WeatherMapTexture,
        atlas_hi: &NoiseAtlasTexture,
        atlas_lo: &NoiseAtlasTexture,
    ) {
        self.field_bind_group = create_field_bind_group(
            device,
            &self.field_layout,
            &self.sampler,
            weather,
            atlas_hi,
            atlas_lo,
        );
    }

    /// Upload this frame's uniforms.
    pub fn write_uniforms(&self, queue: &wgpu::Queue, uniforms: &CloudUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    /// Record the cloud draw into an open render pass.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        pass.set_bind_group(1, &self.field_bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        pass.draw_indexed(0..BOX_INDICES.len() as u32, 0, 0..1);
    }
}

fn create_field_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    weather: &WeatherMapTexture,
    atlas_hi: &NoiseAtlasTexture,
    atlas_lo: &NoiseAtlasTexture,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Cloud Field Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&weather.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&atlas_hi.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&atlas_lo.view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

/// Assemble the full raymarch shader source.
pub fn raymarch_source() -> String {
    format!("{}\n{}", CLOUD_MATH_WGSL, RAYMARCH_WGSL)
}

const RAYMARCH_WGSL: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    camera_pos: vec4<f32>,
    light_dir: vec4<f32>,
    box_min: vec4<f32>,
    box_max: vec4<f32>,
    density_params: vec4<f32>,  // gc, gd, aa, b
    scatter_params: vec4<f32>,  // csi, cse, ins, outs
    ambient_params: vec4<f32>,  // ivo, ac, amin, osa
    atlas_hi: vec4<f32>,        // cells_x, cells_y, slices
    atlas_lo: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> u: Uniforms;

@group(1) @binding(0)
var weather_tex: texture_2d<f32>;
@group(1) @binding(1)
var atlas_hi_tex: texture_2d<f32>;
@group(1) @binding(2)
var atlas_lo_tex: texture_2d<f32>;
@group(1) @binding(3)
var field_sampler: sampler;

const PRIMARY_STEPS: i32 = 32;
const LIGHT_STEPS: i32 = 8;
const COS_THRESHOLD: f32 = 0.9;

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
};

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> VsOut {
    var out: VsOut;
    let world = position * (u.box_max.xyz - u.box_min.xyz);
    out.clip = u.view_proj * vec4<f32>(world, 1.0);
    out.world_pos = world;
    return out;
}

// Atlas UV of an in-slice uv for tile `slice` of a cells.x by cells.y grid.
fn tile_uv(slice: f32, uv: vec2<f32>, cells: vec4<f32>) -> vec2<f32> {
    let col = slice - floor(slice / cells.x) * cells.x;
    let row = floor(slice / cells.x);
    return vec2<f32>((col + uv.x) / cells.x, (row + uv.y) / cells.y);
}

// Trilinear lookup into a tiled 3D atlas: bilinear in two adjacent slice
// tiles, mixed by the fractional slice coordinate.
fn sample_volume(tex: texture_2d<f32>, uvw: vec3<f32>, cells: vec4<f32>) -> vec4<f32> {
    let slices = cells.z;
    let sf = clamp(uvw.z, 0.0, 1.0) * slices;
    let s0 = min(floor(sf), slices - 1.0);
    let s1 = min(s0 + 1.0, slices - 1.0);
    let near = textureSampleLevel(tex, field_sampler, tile_uv(s0, fract(uvw.xy), cells), 0.0);
    let far = textureSampleLevel(tex, field_sampler, tile_uv(s1, fract(uvw.xy), cells), 0.0);
    return mix(near, far, sf - s0);
}

fn sample_cloud(p: vec3<f32>) -> vec2<f32> {
    let extent = u.box_max.xyz - u.box_min.xyz;
    let uvw = fract((p - u.box_min.xyz) / extent);
    let ph = clamp((p.y - u.box_min.y) / extent.y, 0.0, 1.0);

    let weather = textureSampleLevel(weather_tex, field_sampler, uvw.xz, 0.0);
    let shape = sample_volume(atlas_hi_tex, uvw, u.atlas_hi);
    let detail = sample_volume(atlas_lo_tex, uvw, u.atlas_lo);

    let d = density_from_samples(
        ph, weather, shape, detail,
        u.density_params.x, u.density_params.y, u.density_params.z,
    );
    return vec2<f32>(d, ph);
}

fn light_march(p: vec3<f32>, light: vec3<f32>) -> f32 {
    let hit = intersect_box(u.box_min.xyz, u.box_max.xyz, p, light);
    let step_size = hit.w / f32(LIGHT_STEPS);
    var traveled = 0.0;
    var total = 0.0;
    for (var i = 0; i < LIGHT_STEPS; i++) {
        total += sample_cloud(p + light * traveled).x;
        traveled += step_size;
    }
    return total;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let origin = u.camera_pos.xyz;
    let dir = normalize(in.world_pos - origin);
    let hit = intersect_box(u.box_min.xyz, u.box_max.xyz, origin, dir);
    if hit.x >= hit.y {
        return vec4<f32>(0.0);
    }

    let light = normalize(u.light_dir.xyz);
    let cos_theta = max(abs(dot(light, -dir)), COS_THRESHOLD);
    let iso = scatter_blend(
        cos_theta,
        u.scatter_params.x, u.scatter_params.y,
        u.scatter_params.z, u.scatter_params.w,
        u.ambient_params.x,
    );

    let b = u.density_params.w;
    let ac = u.ambient_params.y;
    let amin = u.ambient_params.z;
    let osa = u.ambient_params.w;

    let step_size = hit.w / f32(PRIMARY_STEPS);
    var traveled = 0.0;
    var total_density = 0.0;
    var accumulated = 0.0;

    for (var i = 0; i < PRIMARY_STEPS; i++) {
        let p = origin + dir * (hit.z + traveled);
        let cloud = sample_cloud(p);
        total_density += cloud.x;
        traveled += step_size;

        if cloud.x > 0.0 {
            let sun_density = light_march(p, light);
            let e = max(exp(-b * sun_density), 0.8);
            let e_clamp = max(e, exp(-b * ac));
            let e_alter = max(cloud.x * amin, e_clamp);
            let ambient = ambient_attenuation(cloud.x, cloud.y, osa);
            accumulated += e_alter * cloud.x * iso * ambient;
        }
    }

    let opacity = 1.0 - exp(-total_density);
    return vec4<f32>(vec3<f32>(1.0 - accumulated), opacity);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4Swizzles;

    #[test]
    fn test_uniform_layout() {
        // mat4 + 9 vec4s, matching the WGSL struct.
        assert_eq!(std::mem::size_of::<CloudUniforms>(), 64 + 9 * 16);
    }

    #[test]
    fn test_uniforms_from_config() {
        let config = CloudConfig::new();
        let hi = AtlasLayout::new(128, 16, 16);
        let lo = AtlasLayout::new(16, 16, 16);
        let u = CloudUniforms::new(Mat4::IDENTITY, Vec3::new(0.0, 0.0, 200.0), &config, hi, lo);

        assert_eq!(u.box_min[0], -50.0);
        assert_eq!(u.box_max[1], 30.0);
        assert_eq!(u.density_params, [0.7, 0.9, 0.0, 0.4]);
        assert_eq!(u.atlas_hi[2], 256.0);

        // Light direction is normalized on upload.
        let light = glam::Vec4::from_array(u.light_dir).xyz();
        assert!((light.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_box_indices_reference_all_vertices() {
        let mut seen = [false; 8];
        for &i in &BOX_INDICES {
            seen[i as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(BOX_INDICES.len(), 36);
    }

    #[test]
    fn test_raymarch_source_assembles() {
        let src = raymarch_source();
        assert!(src.contains("fn vs_main"));
        assert!(src.contains("fn fs_main"));
        assert!(src.contains("fn density_from_samples"));
        assert!(src.contains("fn sample_volume"));
    }
}
