//! Error types for cumulus.
//!
//! This module provides error types for GPU initialization, field baking,
//! and asset loading.

use std::fmt;

/// Errors that can occur during GPU initialization.
#[derive(Debug)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    NoAdapter,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::SurfaceCreation(e) => write!(f, "Failed to create GPU surface: {}", e),
            GpuError::NoAdapter => write!(f, "No compatible GPU adapter found. Ensure your system has a GPU with WebGPU/Vulkan/Metal/DX12 support."),
            GpuError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::SurfaceCreation(e) => Some(e),
            GpuError::DeviceCreation(e) => Some(e),
            GpuError::NoAdapter => None,
        }
    }
}

impl From<wgpu::CreateSurfaceError> for GpuError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        GpuError::SurfaceCreation(e)
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// Errors that can occur while baking the procedural cloud fields.
///
/// A bake either completes for every texel or fails as a whole; there is
/// no partially usable result.
#[derive(Debug)]
pub enum BakeError {
    /// The compute backend rejected or lost the dispatch.
    DispatchFailed(String),
    /// The GPU device was lost while the bake was in flight.
    DeviceLost(String),
}

impl fmt::Display for BakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BakeError::DispatchFailed(msg) => write!(f, "Field bake dispatch failed: {}", msg),
            BakeError::DeviceLost(msg) => write!(f, "GPU device lost during bake: {}", msg),
        }
    }
}

impl std::error::Error for BakeError {}

/// Errors that can occur while loading external assets.
///
/// Asset failures are never fatal to cloud rendering; callers log them
/// and continue without the asset.
#[derive(Debug)]
pub enum AssetError {
    /// Failed to decode an image file.
    ImageLoad(image::ImageError),
    /// Failed to read a file from disk.
    Io(std::io::Error),
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::ImageLoad(e) => write!(f, "Failed to load image: {}", e),
            AssetError::Io(e) => write!(f, "Failed to read asset file: {}", e),
        }
    }
}

impl std::error::Error for AssetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AssetError::ImageLoad(e) => Some(e),
            AssetError::Io(e) => Some(e),
        }
    }
}

impl From<image::ImageError> for AssetError {
    fn from(e: image::ImageError) -> Self {
        AssetError::ImageLoad(e)
    }
}

impl From<std::io::Error> for AssetError {
    fn from(e: std::io::Error) -> Self {
        AssetError::Io(e)
    }
}

/// Top-level errors for running the cloud viewer.
#[derive(Debug)]
pub enum CloudError {
    /// Failed to create event loop.
    EventLoop(winit::error::EventLoopError),
    /// Failed to create window.
    Window(winit::error::OsError),
    /// GPU initialization failed.
    Gpu(GpuError),
    /// Initial field bake failed; nothing can be rendered.
    Bake(BakeError),
}

impl fmt::Display for CloudError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudError::EventLoop(e) => write!(f, "Failed to create event loop: {}", e),
            CloudError::Window(e) => write!(f, "Failed to create window: {}", e),
            CloudError::Gpu(e) => write!(f, "GPU error: {}", e),
            CloudError::Bake(e) => write!(f, "Cloud field bake error: {}", e),
        }
    }
}

impl std::error::Error for CloudError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CloudError::EventLoop(e) => Some(e),
            CloudError::Window(e) => Some(e),
            CloudError::Gpu(e) => Some(e),
            CloudError::Bake(e) => Some(e),
        }
    }
}

impl From<winit::error::EventLoopError> for CloudError {
    fn from(e: winit::error::EventLoopError) -> Self {
        CloudError::EventLoop(e)
    }
}

impl From<winit::error::OsError> for CloudError {
    fn from(e: winit::error::OsError) -> Self {
        CloudError::Window(e)
    }
}

impl From<GpuError> for CloudError {
    fn from(e: GpuError) -> Self {
        CloudError::Gpu(e)
    }
}

impl From<BakeError> for CloudError {
    fn from(e: BakeError) -> Self {
        CloudError::Bake(e)
    }
}
