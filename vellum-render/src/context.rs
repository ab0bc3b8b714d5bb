//! GPU context: owns `wgpu::Device`, `Queue`, and optional `Surface`.
//!
//! Two construction paths:
//!
//! 1. **Headless** (`GpuContext::new_headless`): no window, no surface.
//!    Used for tests and benchmarks.
//!
//! 2. **Windowed** (`GpuContext::new_with_surface`): requires a
//!    `raw_window_handle`-compatible window.  Used by `vellum-desktop`.
//!
//! Both install a device-lost callback.  Once the device is lost every
//! buffer and texture created from it is gone; the viewer abandons its
//! handles and the host builds a fresh context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};
use thiserror::Error;
use wgpu::{
    Adapter, Device, DeviceDescriptor, Instance, InstanceDescriptor, Queue,
    RequestAdapterOptions, Surface, SurfaceConfiguration, TextureFormat,
    TextureUsages,
};

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,
    #[error("Failed to request device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("Surface error: {0}")]
    Surface(String),
}

/// Core GPU state shared by the backend and the host.
pub struct GpuContext {
    pub device: Device,
    pub queue: Queue,
    pub adapter: Adapter,
    /// Present only when rendering to a window.
    pub surface: Option<Surface<'static>>,
    pub surface_config: Option<SurfaceConfiguration>,
    pub surface_format: TextureFormat,
    lost: Arc<AtomicBool>,
}

impl GpuContext {
    /// Create a headless context (no window, no surface).
    pub async fn new_headless() -> Result<Self, ContextError> {
        let instance = Instance::new(&InstanceDescriptor::default());
        let (adapter, device, queue) = open_device(&instance, None, "vellum-headless").await?;
        let lost = watch_device(&device);
        Ok(Self {
            device,
            queue,
            adapter,
            surface: None,
            surface_config: None,
            surface_format: TextureFormat::Bgra8UnormSrgb,
            lost,
        })
    }

    /// Create a context presenting to `window`.
    pub async fn new_with_surface<W>(window: W, width: u32, height: u32) -> Result<Self, ContextError>
    where
        W: wgpu::WasmNotSendSync + Into<wgpu::SurfaceTarget<'static>>,
    {
        let instance = Instance::new(&InstanceDescriptor::default());
        let surface = instance
            .create_surface(window)
            .map_err(|e| ContextError::Surface(e.to_string()))?;
        let (adapter, device, queue) =
            open_device(&instance, Some(&surface), "vellum-windowed").await?;

        let caps = surface.get_capabilities(&adapter);
        // Page rasters are sRGB; prefer a matching target.
        let Some(format) = caps
            .formats
            .iter()
            .copied()
            .find(TextureFormat::is_srgb)
            .or_else(|| caps.formats.first().copied())
        else {
            return Err(ContextError::Surface("surface reports no formats".into()));
        };
        let config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: Vec::new(),
        };
        surface.configure(&device, &config);
        info!("surface {}x{} {format:?}", config.width, config.height);

        let lost = watch_device(&device);
        Ok(Self {
            device,
            queue,
            adapter,
            surface: Some(surface),
            surface_config: Some(config),
            surface_format: format,
            lost,
        })
    }

    /// Resize the surface.  No-op if headless.
    pub fn resize(&mut self, width: u32, height: u32) {
        if let Some(config) = &mut self.surface_config {
            if width == 0 || height == 0 {
                return;
            }
            config.width = width;
            config.height = height;
            if let Some(surface) = &self.surface {
                surface.configure(&self.device, config);
            }
        }
    }

    /// Reconfigure the surface with its current size (after `Lost` or
    /// `Outdated`).
    pub fn reconfigure(&mut self) {
        if let (Some(surface), Some(config)) = (&self.surface, &self.surface_config) {
            surface.configure(&self.device, config);
        }
    }

    /// Current surface dimensions, or `(0, 0)` if headless.
    pub fn surface_size(&self) -> (u32, u32) {
        self.surface_config
            .as_ref()
            .map(|c| (c.width, c.height))
            .unwrap_or((0, 0))
    }

    /// Whether the device reported itself lost.
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    /// Largest texture side the device accepts.
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}

/// Pick an adapter (able to present to `surface` when given) and open
/// its device with default limits.
async fn open_device(
    instance: &Instance,
    surface: Option<&Surface<'static>>,
    label: &'static str,
) -> Result<(Adapter, Device, Queue), ContextError> {
    let adapter = instance
        .request_adapter(&RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: surface,
            force_fallback_adapter: false,
        })
        .await
        .ok_or(ContextError::NoAdapter)?;
    let info = adapter.get_info();
    info!("adapter: {} ({:?})", info.name, info.backend);
    let descriptor = DeviceDescriptor {
        label: Some(label),
        ..Default::default()
    };
    let (device, queue) = adapter.request_device(&descriptor, None).await?;
    Ok((adapter, device, queue))
}

fn watch_device(device: &Device) -> Arc<AtomicBool> {
    let lost = Arc::new(AtomicBool::new(false));
    let flag = lost.clone();
    device.set_device_lost_callback(move |reason, message| {
        warn!("GPU device lost ({reason:?}): {message}");
        flag.store(true, Ordering::Release);
    });
    lost
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_size_headless() {
        let ctx = pollster::block_on(GpuContext::new_headless());
        // May fail in CI without GPU: skip gracefully.
        if let Ok(ctx) = ctx {
            assert_eq!(ctx.surface_size(), (0, 0));
            assert!(ctx.surface.is_none());
            assert!(!ctx.is_lost());
            assert!(ctx.max_texture_dimension() >= 2048);
        }
    }

    #[test]
    fn test_resize_headless_is_noop() {
        if let Ok(mut ctx) = pollster::block_on(GpuContext::new_headless()) {
            ctx.resize(800, 600);
            ctx.reconfigure();
            assert_eq!(ctx.surface_size(), (0, 0));
        }
    }
}
