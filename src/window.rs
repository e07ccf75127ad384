//! Interactive cloud viewer: winit event loop, surface management and the
//! per-frame render path.
//!
//! Controls: drag to orbit, wheel to zoom. Arrow keys tune coverage and
//! density (uniform-only, instant). `[`/`]` change the weather scale and
//! queue a weather rebake; `N`/`M` change the detail frequencies and queue
//! a full noise rebake.

use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::camera::OrbitCamera;
use crate::config::CloudConfig;
use crate::environment::Environment;
use crate::error::{CloudError, GpuError};
use crate::gpu::GpuContext;
use crate::volume::CloudVolume;

pub struct ViewerState {
    surface: wgpu::Surface<'static>,
    ctx: GpuContext,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: OrbitCamera,
    environment: Environment,
    volume: CloudVolume,
}

impl ViewerState {
    pub async fn new(
        window: Arc<Window>,
        cloud_config: CloudConfig,
        environment_path: Option<PathBuf>,
    ) -> Result<Self, CloudError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(GpuError::SurfaceCreation)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Cloud Viewer Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(GpuError::DeviceCreation)?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let ctx = GpuContext::from_parts(device, queue);

        let environment = Environment::new(
            &ctx.device,
            &ctx.queue,
            surface_format,
            environment_path.as_deref(),
        );

        // The initial bake must succeed before the first frame.
        let volume = CloudVolume::new(&ctx, surface_format, cloud_config).await?;

        let aspect = config.width as f32 / config.height as f32;
        let camera = OrbitCamera::new(glam::Vec3::ZERO, 300.0, aspect);

        Ok(Self {
            surface,
            ctx,
            config,
            camera,
            environment,
            volume,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.ctx.device, &self.config);
            self.camera
                .set_aspect(new_size.width as f32 / new_size.height as f32);
        }
    }

    fn adjust_coverage(&mut self, delta: f32) {
        let config = self.volume.config().clone();
        let gc = config.gc + delta;
        self.volume.set_render_params(config.with_coverage(gc));
        info!("Coverage: {:.2}", self.volume.config().gc);
    }

    fn adjust_density(&mut self, delta: f32) {
        let config = self.volume.config().clone();
        let gd = config.gd + delta;
        self.volume.set_render_params(config.with_density(gd));
        info!("Density: {:.2}", self.volume.config().gd);
    }

    fn adjust_weather_scale(&mut self, delta: f32) {
        let high = self.volume.config().weather_scale_high + delta;
        let low = self.volume.config().weather_scale_low + delta;
        self.volume.update_weather_params(high, low);
        info!("Weather scales: {:.1}/{:.1}, rebake queued", high, low);
    }

    fn adjust_detail_frequency(&mut self, delta: f32) {
        let mut frequencies = self.volume.config().frequencies;
        frequencies.freq2 = (frequencies.freq2 + delta).max(1.0);
        frequencies.freq3 = (frequencies.freq3 + delta * 2.0).max(1.0);
        frequencies.freq4 = (frequencies.freq4 + delta * 3.0).max(1.0);
        self.volume.update_texture_params(frequencies);
        info!("Detail frequencies: {:?}, rebake queued", frequencies);
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        // Rebakes run between frames; a failure keeps the last good fields.
        if let Err(e) = pollster::block_on(self.volume.process_rebakes(&self.ctx)) {
            error!("Rebake failed: {}", e);
        }

        self.camera.update_projection();
        let view_proj = self.camera.view_proj();
        self.environment.prepare(&self.ctx.queue, view_proj);
        self.volume
            .prepare(&self.ctx.queue, view_proj, self.camera.position());

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Viewer Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Cloud Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            // Background first, clouds composited over it.
            self.environment.draw(&mut pass);
            self.volume.draw(&mut pass);
        }

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

pub struct App {
    window: Option<Arc<Window>>,
    state: Option<ViewerState>,
    cloud_config: CloudConfig,
    environment_path: Option<PathBuf>,
    mouse_pressed: bool,
    last_mouse_pos: Option<(f64, f64)>,
}

impl App {
    pub fn new(cloud_config: CloudConfig, environment_path: Option<PathBuf>) -> Self {
        Self {
            window: None,
            state: None,
            cloud_config,
            environment_path,
            mouse_pressed: false,
            last_mouse_pos: None,
        }
    }

    /// Create the event loop and run the viewer until the window closes.
    pub fn run(mut self) -> Result<(), CloudError> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop.run_app(&mut self)?;
        Ok(())
    }

    fn handle_key(&mut self, event: KeyEvent) {
        if event.state != ElementState::Pressed {
            return;
        }
        let Some(state) = &mut self.state else {
            return;
        };
        match event.logical_key {
            Key::Named(NamedKey::ArrowUp) => state.adjust_coverage(0.05),
            Key::Named(NamedKey::ArrowDown) => state.adjust_coverage(-0.05),
            Key::Named(NamedKey::ArrowRight) => state.adjust_density(0.05),
            Key::Named(NamedKey::ArrowLeft) => state.adjust_density(-0.05),
            Key::Character(ref c) => match c.as_str() {
                "[" => state.adjust_weather_scale(-0.5),
                "]" => state.adjust_weather_scale(0.5),
                "n" => state.adjust_detail_frequency(-2.0),
                "m" => state.adjust_detail_frequency(2.0),
                _ => {}
            },
            _ => {}
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            let window_attrs = Window::default_attributes()
                .with_title("cumulus - volumetric clouds")
                .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

            let window = match event_loop.create_window(window_attrs) {
                Ok(window) => Arc::new(window),
                Err(e) => {
                    error!("Failed to create window: {}", e);
                    event_loop.exit();
                    return;
                }
            };
            self.window = Some(window.clone());

            match pollster::block_on(ViewerState::new(
                window,
                self.cloud_config.clone(),
                self.environment_path.clone(),
            )) {
                Ok(state) => self.state = Some(state),
                Err(e) => {
                    // Initial bake or device failure blocks the first frame.
                    error!("Viewer initialization failed: {}", e);
                    event_loop.exit();
                }
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(state) = &mut self.state {
                    state.resize(physical_size);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.handle_key(event);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Left {
                    self.mouse_pressed = state == ElementState::Pressed;
                    if !self.mouse_pressed {
                        self.last_mouse_pos = None;
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if self.mouse_pressed {
                    if let Some((last_x, last_y)) = self.last_mouse_pos {
                        let dx = (position.x - last_x) as f32 * 0.005;
                        let dy = (position.y - last_y) as f32 * 0.005;
                        if let Some(state) = &mut self.state {
                            state.camera.orbit(dx, dy);
                        }
                    }
                    self.last_mouse_pos = Some((position.x, position.y));
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.1,
                };
                if let Some(state) = &mut self.state {
                    state.camera.zoom(1.0 - scroll * 0.1);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Some(state) = &mut self.state {
                    match state.render() {
                        Ok(_) => {}
                        Err(wgpu::SurfaceError::Lost) => {
                            state.resize(winit::dpi::PhysicalSize {
                                width: state.config.width,
                                height: state.config.height,
                            })
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => event_loop.exit(),
                        Err(e) => error!("Render error: {:?}", e),
                    }
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}
